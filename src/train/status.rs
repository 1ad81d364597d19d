use serde::{Deserialize, Serialize};

use crate::channel::{MetricSet, ProgressEvent, TestMetricsEvent};

/// User-visible state of the current training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStatus {
    /// 0–100.
    pub progress: f64,
    #[serde(rename = "estimatedTime")]
    pub estimated_time: String,
    /// Latest per-epoch metrics, absent until the first progress event.
    pub metrics: Option<MetricSet>,
    #[serde(rename = "isTraining")]
    pub is_training: bool,
    pub confusion_matrix: Vec<Vec<u64>>,
    #[serde(rename = "testMetrics")]
    pub test_metrics: Option<MetricSet>,
}

impl TrainingStatus {
    /// Status at the moment a run is requested: everything from the previous
    /// run is cleared.
    pub fn starting() -> Self {
        TrainingStatus { is_training: true, ..Default::default() }
    }

    pub(crate) fn record_progress(&mut self, event: &ProgressEvent) {
        self.progress = event.progress;
        self.estimated_time = event.estimated_time.clone();
        self.metrics = Some(event.metrics);
    }

    pub(crate) fn record_complete(&mut self) {
        self.progress = 100.0;
        self.estimated_time.clear();
        self.is_training = false;
    }

    pub(crate) fn record_test_metrics(&mut self, event: &TestMetricsEvent) {
        self.confusion_matrix = event.confusion_matrix.clone();
        self.test_metrics = Some(event.scores());
        self.is_training = false;
    }

    pub fn status_message(&self) -> &'static str {
        status_message(self.progress)
    }
}

/// Caption shown under the progress bar.
pub fn status_message(progress: f64) -> &'static str {
    if progress < 25.0 {
        "Training Started..."
    } else if progress < 50.0 {
        "Making Progress..."
    } else if progress < 75.0 {
        "More Than Halfway There..."
    } else if progress < 100.0 {
        "Almost Done..."
    } else {
        "Training Complete!"
    }
}

/// Caption before the first progress event arrives.
pub const AWAITING_START: &str = "Awaiting Training Start...";

/// Progress bar colour: red below half, yellow below three quarters, then green.
pub fn progress_color(progress: f64) -> &'static str {
    if progress < 50.0 {
        "#f44336"
    } else if progress < 75.0 {
        "#ffeb3b"
    } else {
        "#4caf50"
    }
}
