use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ChannelError;

/// Event names used on the training channel.
pub const START_TRAINING: &str = "startTraining";
pub const TRAINING_PROGRESS: &str = "trainingProgress";
pub const TRAINING_COMPLETE: &str = "trainingComplete";
pub const TEST_METRICS: &str = "testMetrics";

/// Classification scores as fractions in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub precision: f64,
    #[serde(default)]
    pub recall: f64,
}

/// One `trainingProgress` message, sent by the backend after every epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub epoch: u32,
    /// Percentage of the run completed, 0–100.
    pub progress: f64,
    #[serde(rename = "estimatedTime", default, deserialize_with = "string_or_number")]
    pub estimated_time: String,
    #[serde(default)]
    pub metrics: MetricSet,
}

/// The `testMetrics` message carrying held-out evaluation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetricsEvent {
    #[serde(default)]
    pub confusion_matrix: Vec<Vec<u64>>,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub precision: f64,
    #[serde(default)]
    pub recall: f64,
}

impl TestMetricsEvent {
    pub fn scores(&self) -> MetricSet {
        MetricSet { accuracy: self.accuracy, precision: self.precision, recall: self.recall }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Progress,
    Complete,
    TestMetrics,
    Disconnected,
    Other,
}

/// Everything a subscriber can observe on the channel, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The namespace connection was acknowledged; the channel is usable.
    Connected,
    Progress(ProgressEvent),
    Complete,
    TestMetrics(TestMetricsEvent),
    /// The transport dropped or the server closed the namespace.
    Disconnected { reason: String },
    /// An event this client does not interpret.
    Other { name: String, payload: Value },
}

impl ServerEvent {
    /// Decodes a named server event and its first argument.
    pub fn from_named(name: &str, payload: Value) -> Result<ServerEvent, ChannelError> {
        let decode_err = |source| ChannelError::Payload { event: name.to_owned(), source };
        match name {
            TRAINING_PROGRESS => serde_json::from_value(payload)
                .map(ServerEvent::Progress)
                .map_err(decode_err),
            TRAINING_COMPLETE => Ok(ServerEvent::Complete),
            TEST_METRICS => serde_json::from_value(payload)
                .map(ServerEvent::TestMetrics)
                .map_err(decode_err),
            _ => Ok(ServerEvent::Other { name: name.to_owned(), payload }),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Connected => EventKind::Connected,
            ServerEvent::Progress(_) => EventKind::Progress,
            ServerEvent::Complete => EventKind::Complete,
            ServerEvent::TestMetrics(_) => EventKind::TestMetrics,
            ServerEvent::Disconnected { .. } => EventKind::Disconnected,
            ServerEvent::Other { .. } => EventKind::Other,
        }
    }
}

/// Accepts `"12s"` as well as a bare number of seconds.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_payload_decodes() {
        let ev = ServerEvent::from_named(
            TRAINING_PROGRESS,
            json!({
                "epoch": 3,
                "progress": 30.0,
                "estimatedTime": "00:12",
                "metrics": {"accuracy": 0.8, "precision": 0.75, "recall": 0.7}
            }),
        )
        .unwrap();
        match ev {
            ServerEvent::Progress(p) => {
                assert_eq!(p.epoch, 3);
                assert_eq!(p.estimated_time, "00:12");
                assert_eq!(p.metrics.precision, 0.75);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn numeric_estimated_time_is_kept_as_text() {
        let p: ProgressEvent = serde_json::from_value(json!({
            "epoch": 1, "progress": 10, "estimatedTime": 42
        }))
        .unwrap();
        assert_eq!(p.estimated_time, "42");
        assert_eq!(p.metrics, MetricSet::default());
    }

    #[test]
    fn completion_ignores_payload_and_unknown_events_pass_through() {
        assert_eq!(
            ServerEvent::from_named(TRAINING_COMPLETE, Value::Null).unwrap(),
            ServerEvent::Complete
        );
        let ev = ServerEvent::from_named("serverNotice", json!("hi")).unwrap();
        assert_eq!(ev.kind(), EventKind::Other);
    }

    #[test]
    fn malformed_test_metrics_is_an_error() {
        let err = ServerEvent::from_named(TEST_METRICS, json!({"confusion_matrix": "x"}));
        assert!(matches!(err, Err(ChannelError::Payload { .. })));
    }
}
