use serde::Serialize;

use crate::model::ModelConfig;

/// Horizontal padding kept clear on both sides of every band.
pub const PADDING: f64 = 10.0;
/// Radius of a drawn neuron.
pub const NODE_RADIUS: f64 = 15.0;

/// Drawing surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Canvas { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BandRole {
    Hidden,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One horizontal row of neurons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Band {
    pub role: BandRole,
    pub y: f64,
    pub nodes: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub from: Point,
    pub to: Point,
}

/// Node/edge layout of a network, computed from scratch for every frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramLayout {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub node_radius: f64,
    pub bands: Vec<Band>,
    pub edges: Vec<Edge>,
}

impl DiagramLayout {
    /// Projects `config` onto `canvas`.
    ///
    /// Dropout layers are not drawn. The vertical space is split into
    /// `dense + 2` bands: the (implicit, undrawn) input, one per dense layer,
    /// and the output layer sized by `output_classes` (1 when unknown).
    /// Adjacent drawn bands are fully connected.
    pub fn compute(config: &ModelConfig, output_classes: Option<usize>, canvas: Canvas) -> Self {
        let hidden: Vec<usize> = config
            .dense_layers()
            .filter(|l| !l.is_output())
            .map(|l| l.settings.nodes.unwrap_or(1).max(1))
            .collect();

        // A built config already carries its output layer; prefer the live count.
        let output = output_classes
            .or_else(|| config.layers.iter().find(|l| l.is_output()).and_then(|l| l.settings.nodes))
            .unwrap_or(1)
            .max(1);

        let band_height = canvas.height / (hidden.len() + 2) as f64;

        let mut bands: Vec<Band> = hidden
            .iter()
            .enumerate()
            .map(|(i, &n)| band(BandRole::Hidden, n, band_height * (i + 1) as f64, canvas.width))
            .collect();
        bands.push(band(BandRole::Output, output, canvas.height - band_height, canvas.width));

        let edges = bands
            .windows(2)
            .flat_map(|pair| {
                let (upper, lower) = (&pair[0], &pair[1]);
                upper.nodes.iter().flat_map(move |&from| {
                    lower.nodes.iter().map(move |&to| Edge { from, to })
                })
            })
            .collect();

        DiagramLayout {
            canvas_width: canvas.width,
            canvas_height: canvas.height,
            node_radius: NODE_RADIUS,
            bands,
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.bands.iter().map(|b| b.nodes.len()).sum()
    }
}

fn band(role: BandRole, nodes: usize, y: f64, width: f64) -> Band {
    let spacing = (width - 2.0 * PADDING) / (nodes + 1) as f64;
    let nodes = (0..nodes)
        .map(|k| Point { x: PADDING + spacing * (k + 1) as f64, y })
        .collect();
    Band { role, y, nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerKind, ModelStore};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_config_draws_only_the_output_band() {
        let layout = DiagramLayout::compute(&ModelConfig::new(), None, Canvas::new(220.0, 600.0));
        assert_eq!(layout.bands.len(), 1);
        assert_eq!(layout.bands[0].role, BandRole::Output);
        assert_eq!(layout.bands[0].nodes.len(), 1);
        assert!(approx(layout.bands[0].y, 300.0));
        assert!(layout.edges.is_empty());
    }

    #[test]
    fn dropout_is_skipped_and_bands_are_fully_connected() {
        let store = ModelStore::new();
        let a = store.add_layer(LayerKind::Dense).unwrap();
        store.add_layer(LayerKind::Dropout).unwrap();
        let b = store.add_layer(LayerKind::Dense).unwrap();
        store.update_layer(&a.id, crate::model::LayerPatch::nodes(3)).unwrap();
        store.update_layer(&b.id, crate::model::LayerPatch::nodes(2)).unwrap();

        let layout = DiagramLayout::compute(&store.snapshot(), Some(4), Canvas::new(400.0, 400.0));
        let counts: Vec<usize> = layout.bands.iter().map(|b| b.nodes.len()).collect();
        assert_eq!(counts, vec![3, 2, 4]);
        assert_eq!(layout.edges.len(), 3 * 2 + 2 * 4);

        // 2 dense layers -> 4 bands of 100px; output sits one band above the bottom.
        assert!(approx(layout.bands[0].y, 100.0));
        assert!(approx(layout.bands[1].y, 200.0));
        assert!(approx(layout.bands[2].y, 300.0));
    }

    #[test]
    fn nodes_are_spread_evenly_inside_the_padding() {
        let store = ModelStore::new();
        let a = store.add_layer(LayerKind::Dense).unwrap();
        store.update_layer(&a.id, crate::model::LayerPatch::nodes(4)).unwrap();
        let layout = DiagramLayout::compute(&store.snapshot(), Some(1), Canvas::new(120.0, 300.0));
        let xs: Vec<f64> = layout.bands[0].nodes.iter().map(|p| p.x).collect();
        for (x, want) in xs.iter().zip([30.0, 50.0, 70.0, 90.0]) {
            assert!(approx(*x, want), "{x} != {want}");
        }
    }

    #[test]
    fn built_config_uses_its_own_output_layer() {
        let store = ModelStore::new();
        store.add_layer(LayerKind::Dense).unwrap();
        let built = store.finalize_for_build(3, 5).unwrap();
        let layout = DiagramLayout::compute(&built, None, Canvas::new(300.0, 300.0));
        assert_eq!(layout.bands.len(), 2);
        assert_eq!(layout.bands[1].nodes.len(), 3);
    }

    #[test]
    fn recomputing_is_idempotent() {
        let store = ModelStore::new();
        store.add_layer(LayerKind::Dense).unwrap();
        let canvas = Canvas::new(500.0, 600.0);
        let first = DiagramLayout::compute(&store.snapshot(), Some(2), canvas);
        let second = DiagramLayout::compute(&store.snapshot(), Some(2), canvas);
        assert_eq!(first, second);
    }
}
