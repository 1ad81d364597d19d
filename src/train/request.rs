use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::model::ModelConfig;

pub const START_ACTION: &str = "startTraining";
pub const OPTIMIZER: &str = "rmsprop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    BinaryCrossentropy,
    CategoricalCrossentropy,
}

impl LossKind {
    /// Binary for one or two output nodes, categorical above that.
    pub fn for_output_nodes(nodes: usize) -> LossKind {
        if nodes < 3 {
            LossKind::BinaryCrossentropy
        } else {
            LossKind::CategoricalCrossentropy
        }
    }
}

/// Payload of the `startTraining` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    pub action: String,
    pub epochs: u32,
    pub optimizer: String,
    pub metrics: Vec<String>,
    pub loss: LossKind,
    pub input_size: usize,
}

impl TrainingRequest {
    /// Derives the request from the persisted model configuration.
    pub fn from_config(config: &ModelConfig, epochs: u32) -> Result<TrainingRequest, RequestError> {
        if epochs == 0 {
            return Err(RequestError::NoEpochs);
        }
        let last = config.last_layer().ok_or(RequestError::NoLayers)?;
        let nodes = last.settings.nodes.ok_or(RequestError::MissingOutputNodes)?;
        let input_size = config.input_size.ok_or(RequestError::MissingInputSize)?;
        Ok(TrainingRequest {
            action: START_ACTION.to_owned(),
            epochs,
            optimizer: OPTIMIZER.to_owned(),
            metrics: vec!["accuracy".to_owned()],
            loss: LossKind::for_output_nodes(nodes),
            input_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activation, LayerConfig, LayerKind, LayerSettings};
    use serde_json::json;

    fn config_with_output(nodes: usize) -> ModelConfig {
        let mut out = LayerConfig::new("outputLayer", LayerKind::Dense);
        out.settings = LayerSettings::dense(nodes, Activation::for_output(nodes));
        ModelConfig { input_size: Some(7), layers: vec![out] }
    }

    #[test]
    fn loss_switches_between_two_and_three_nodes() {
        let two = TrainingRequest::from_config(&config_with_output(2), 5).unwrap();
        let three = TrainingRequest::from_config(&config_with_output(3), 5).unwrap();
        assert_eq!(two.loss, LossKind::BinaryCrossentropy);
        assert_eq!(three.loss, LossKind::CategoricalCrossentropy);
    }

    #[test]
    fn wire_shape() {
        let req = TrainingRequest::from_config(&config_with_output(4), 12).unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "action": "startTraining",
                "epochs": 12,
                "optimizer": "rmsprop",
                "metrics": ["accuracy"],
                "loss": "categorical_crossentropy",
                "inputSize": 7
            })
        );
    }

    #[test]
    fn incomplete_configs_are_rejected() {
        assert_eq!(
            TrainingRequest::from_config(&ModelConfig::new(), 3),
            Err(RequestError::NoLayers)
        );
        let mut cfg = config_with_output(2);
        cfg.input_size = None;
        assert_eq!(TrainingRequest::from_config(&cfg, 3), Err(RequestError::MissingInputSize));
        assert_eq!(
            TrainingRequest::from_config(&config_with_output(2), 0),
            Err(RequestError::NoEpochs)
        );
    }
}
