use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved id of the synthetic output layer appended at build time.
pub const OUTPUT_LAYER_ID: &str = "outputLayer";

/// Node count given to a freshly added dense layer.
pub const DEFAULT_DENSE_NODES: usize = 16;
/// Node count given to a layer retyped to dense in the layer editor.
pub const RETYPE_DENSE_NODES: usize = 32;
/// Upper bound on a dense layer's node count.
pub const MAX_DENSE_NODES: usize = 1024;
/// Rate given to a freshly added (or retyped) dropout layer.
pub const DEFAULT_DROPOUT_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Fully connected.
    Dense,
    /// Regularization; carries a rate and no nodes.
    Dropout,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Dense => "dense",
            LayerKind::Dropout => "dropout",
        }
    }

    pub fn parse(s: &str) -> Option<LayerKind> {
        match s {
            "dense" => Some(LayerKind::Dense),
            "dropout" => Some(LayerKind::Dropout),
            _ => None,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    pub const ALL: [Activation; 4] = [
        Activation::Relu,
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::Softmax,
    ];

    /// Output activation for a classifier with `classes` label values:
    /// sigmoid for binary problems, softmax otherwise.
    pub fn for_output(classes: usize) -> Activation {
        if classes <= 2 {
            Activation::Sigmoid
        } else {
            Activation::Softmax
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Activation::Relu => "ReLU",
            Activation::Sigmoid => "Sigmoid",
            Activation::Tanh => "Tanh",
            Activation::Softmax => "Softmax",
        }
    }

    pub fn parse(s: &str) -> Option<Activation> {
        Activation::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// Per-layer settings as they travel over the wire.
///
/// Which fields are present depends on the layer type: dense layers carry
/// `nodes` and `activation`, dropout layers carry `rate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<Activation>,
}

impl LayerSettings {
    pub fn dense(nodes: usize, activation: Activation) -> Self {
        LayerSettings { nodes: Some(nodes), rate: None, activation: Some(activation) }
    }

    pub fn dropout(rate: f64) -> Self {
        LayerSettings { nodes: None, rate: Some(rate), activation: None }
    }

    /// Settings a new layer of `kind` starts with.
    pub fn defaults_for(kind: LayerKind) -> Self {
        match kind {
            LayerKind::Dense => LayerSettings::dense(DEFAULT_DENSE_NODES, Activation::Relu),
            LayerKind::Dropout => LayerSettings::dropout(DEFAULT_DROPOUT_RATE),
        }
    }

    /// True when only the fields belonging to `kind` are set.
    pub fn fits(&self, kind: LayerKind) -> bool {
        match kind {
            LayerKind::Dense => self.rate.is_none(),
            LayerKind::Dropout => self.nodes.is_none() && self.activation.is_none(),
        }
    }
}

/// A partial settings update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerPatch {
    pub nodes: Option<usize>,
    pub rate: Option<f64>,
    pub activation: Option<Activation>,
}

impl LayerPatch {
    pub fn nodes(nodes: usize) -> Self {
        LayerPatch { nodes: Some(nodes), ..LayerPatch::default() }
    }

    pub fn rate(rate: f64) -> Self {
        LayerPatch { rate: Some(rate), ..LayerPatch::default() }
    }

    pub fn activation(activation: Activation) -> Self {
        LayerPatch { activation: Some(activation), ..LayerPatch::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_none() && self.rate.is_none() && self.activation.is_none()
    }
}

/// One stage of the feed-forward network being configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default)]
    pub settings: LayerSettings,
}

impl LayerConfig {
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        LayerConfig { id: id.into(), kind, settings: LayerSettings::defaults_for(kind) }
    }

    pub fn is_output(&self) -> bool {
        self.id == OUTPUT_LAYER_ID
    }

    pub fn is_dense(&self) -> bool {
        self.kind == LayerKind::Dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_layer_serializes_without_rate() {
        let layer = LayerConfig::new("layer-1", LayerKind::Dense);
        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "layer-1",
                "type": "dense",
                "settings": { "nodes": 16, "activation": "relu" }
            })
        );
    }

    #[test]
    fn dropout_layer_parses_from_backend_shape() {
        let layer: LayerConfig = serde_json::from_str(
            r#"{"id":"7","type":"dropout","settings":{"rate":0.25}}"#,
        )
        .unwrap();
        assert_eq!(layer.kind, LayerKind::Dropout);
        assert_eq!(layer.settings.rate, Some(0.25));
        assert!(layer.settings.fits(LayerKind::Dropout));
    }

    #[test]
    fn output_activation_switches_after_two_classes() {
        assert_eq!(Activation::for_output(1), Activation::Sigmoid);
        assert_eq!(Activation::for_output(2), Activation::Sigmoid);
        assert_eq!(Activation::for_output(3), Activation::Softmax);
    }
}
