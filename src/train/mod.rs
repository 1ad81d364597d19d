//! Training run control: the start request, the session state machine and
//! the per-epoch metrics series.

pub mod history;
pub mod request;
pub mod session;
pub mod status;

pub use history::{EpochMetrics, MetricsHistory};
pub use request::{LossKind, TrainingRequest};
pub use session::{ConfigSource, Phase, TrainingSession};
pub use status::{progress_color, status_message, TrainingStatus, AWAITING_START};
