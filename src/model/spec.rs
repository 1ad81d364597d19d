use serde::{Deserialize, Serialize};

use crate::model::layer::{LayerConfig, LayerKind};

/// The network definition shared between the layer editor, the diagram and
/// the build step.
///
/// `input_size` stays `None` while the user is editing; it is filled in from
/// the backend's feature count when the model is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_size: Option<usize>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl ModelConfig {
    pub fn new() -> Self {
        ModelConfig::default()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerConfig> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn last_layer(&self) -> Option<&LayerConfig> {
        self.layers.last()
    }

    /// Node count of the final layer, used to pick the training loss.
    pub fn output_nodes(&self) -> Option<usize> {
        self.layers.last().and_then(|l| l.settings.nodes)
    }

    /// Dense layers in order, skipping dropout.
    pub fn dense_layers(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.iter().filter(|l| l.kind == LayerKind::Dense)
    }

    pub fn has_output_layer(&self) -> bool {
        self.layers.iter().any(|l| l.is_output())
    }

    /// Serializes to pretty JSON (used by the studio's config download).
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_config_omits_input_size() {
        let json = serde_json::to_string(&ModelConfig::new()).unwrap();
        assert_eq!(json, r#"{"layers":[]}"#);
    }

    #[test]
    fn persisted_config_round_trips_output_nodes() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"input_size":4,"layers":[
                {"id":"a","type":"dense","settings":{"nodes":8,"activation":"tanh"}},
                {"id":"outputLayer","type":"dense","settings":{"nodes":3,"activation":"softmax"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(cfg.input_size, Some(4));
        assert_eq!(cfg.output_nodes(), Some(3));
        assert!(cfg.has_output_layer());
    }
}
