use std::fmt::Write;

use crate::diagram::layout::{BandRole, DiagramLayout};

const HIDDEN_FILL: &str = "steelblue";
const OUTPUT_FILL: &str = "lightgreen";
const EDGE_STROKE: &str = "#aaa";

/// Renders the layout as a standalone SVG document.
///
/// Edges are emitted first so neurons are painted on top of them.
pub fn render_svg(layout: &DiagramLayout) -> String {
    let mut out = String::with_capacity(128 + layout.edges.len() * 96 + layout.node_count() * 72);
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="network-diagram" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = layout.canvas_width,
        h = layout.canvas_height,
    );
    for edge in &layout.edges {
        let _ = write!(
            out,
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="1"/>"#,
            edge.from.x, edge.from.y, edge.to.x, edge.to.y, EDGE_STROKE
        );
    }
    for band in &layout.bands {
        let fill = match band.role {
            BandRole::Hidden => HIDDEN_FILL,
            BandRole::Output => OUTPUT_FILL,
        };
        for node in &band.nodes {
            let _ = write!(
                out,
                r#"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"/>"#,
                node.x, node.y, layout.node_radius, fill
            );
        }
    }
    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::layout::Canvas;
    use crate::model::{LayerKind, ModelStore};

    #[test]
    fn svg_contains_one_element_per_node_and_edge() {
        let store = ModelStore::new();
        store.add_layer(LayerKind::Dense).unwrap();
        let layout = DiagramLayout::compute(&store.snapshot(), Some(2), Canvas::new(800.0, 600.0));
        let svg = render_svg(&layout);
        assert_eq!(svg.matches("<circle").count(), 16 + 2);
        assert_eq!(svg.matches("<line").count(), 16 * 2);
        assert_eq!(svg.matches(OUTPUT_FILL).count(), 2);
        assert!(svg.starts_with("<svg") && svg.ends_with("</svg>"));
    }
}
