pub mod api;
pub mod channel;
pub mod config;
pub mod diagram;
pub mod error;
pub mod model;
pub mod train;

// Convenience re-exports
pub use api::BackendClient;
pub use channel::{Channel, Connector, EventFilter, ServerEvent, SocketIoConnector, Subscription};
pub use config::StudioConfig;
pub use diagram::{render_svg, Canvas, DiagramLayout};
pub use error::{ChannelError, ClientError, ConfigError, RequestError, SessionError, StoreError};
pub use model::{LayerConfig, LayerKind, ModelConfig, ModelStore};
pub use train::{MetricsHistory, Phase, TrainingRequest, TrainingSession, TrainingStatus};
