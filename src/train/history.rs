use serde::{Deserialize, Serialize};

use crate::channel::{EventFilter, EventKind, ProgressEvent, ServerEvent, Subscription};

/// Per-epoch metrics as percentages rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: u32,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

impl EpochMetrics {
    pub fn from_progress(event: &ProgressEvent) -> Self {
        EpochMetrics {
            epoch: event.epoch,
            accuracy: percent(event.metrics.accuracy),
            precision: percent(event.metrics.precision),
            recall: percent(event.metrics.recall),
        }
    }
}

fn percent(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}

/// Append-only per-epoch series for one training run.
///
/// Holds its own progress-only subscription, independent of the session's.
/// Create a new accumulator for every run.
pub struct MetricsHistory {
    subscription: Option<Subscription>,
    points: Vec<EpochMetrics>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        MetricsHistory { subscription: None, points: Vec::new() }
    }

    /// The subscription filter a history expects.
    pub const FILTER: EventFilter = EventFilter::Only(EventKind::Progress);

    /// Starts accumulating from `subscription`, which should have been opened
    /// with [`MetricsHistory::FILTER`]. Other events are ignored.
    pub fn attach(subscription: Subscription) -> Self {
        MetricsHistory { subscription: Some(subscription), points: Vec::new() }
    }

    /// Folds every queued progress event; returns how many were added.
    pub fn pump(&mut self) -> usize {
        let Some(sub) = &self.subscription else {
            return 0;
        };
        let mut added = 0;
        for event in sub.drain() {
            if let ServerEvent::Progress(progress) = event {
                self.points.push(EpochMetrics::from_progress(&progress));
                added += 1;
            }
        }
        added
    }

    /// Stops listening; recorded points are kept.
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    pub fn points(&self) -> &[EpochMetrics] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        MetricsHistory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{EventHub, MetricSet};

    fn progress(epoch: u32, accuracy: f64) -> ServerEvent {
        ServerEvent::Progress(ProgressEvent {
            epoch,
            progress: epoch as f64 * 10.0,
            estimated_time: String::new(),
            metrics: MetricSet { accuracy, precision: 0.123456, recall: 1.0 },
        })
    }

    #[test]
    fn values_are_rounded_percentages() {
        let hub = EventHub::new();
        let mut history = MetricsHistory::attach(hub.subscribe(MetricsHistory::FILTER));
        hub.dispatch(progress(1, 0.81234));
        assert_eq!(history.pump(), 1);
        let p = history.points()[0];
        assert_eq!(p.accuracy, 81.23);
        assert_eq!(p.precision, 12.35);
        assert_eq!(p.recall, 100.0);
    }

    #[test]
    fn ignores_other_events_and_keeps_order() {
        let hub = EventHub::new();
        let mut history = MetricsHistory::attach(hub.subscribe(MetricsHistory::FILTER));
        hub.dispatch(ServerEvent::Connected);
        for epoch in 1..=4 {
            hub.dispatch(progress(epoch, 0.5));
        }
        hub.dispatch(ServerEvent::Complete);
        history.pump();
        let epochs: Vec<u32> = history.points().iter().map(|p| p.epoch).collect();
        assert_eq!(epochs, [1, 2, 3, 4]);
    }

    #[test]
    fn detached_history_stops_listening() {
        let hub = EventHub::new();
        let mut history = MetricsHistory::attach(hub.subscribe(MetricsHistory::FILTER));
        history.detach();
        assert_eq!(hub.listener_count(), 0);
        hub.dispatch(progress(1, 0.5));
        assert_eq!(history.pump(), 0);
        assert!(history.is_empty());
    }
}
