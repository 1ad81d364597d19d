use std::path::PathBuf;

use crate::model::LayerKind;

/// Errors raised by the layer editor when a mutation would break the
/// layer-list invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("no layer with id '{0}'")]
    LayerNotFound(String),
    #[error("the output layer is derived from the dataset and cannot be edited")]
    OutputLayerLocked,
    #[error("a {0} layer cannot be placed here")]
    KindNotOffered(LayerKind),
    #[error("'{field}' does not apply to a {kind} layer")]
    NotApplicable { field: &'static str, kind: LayerKind },
    #[error("a dense layer needs at least one node")]
    InvalidNodes,
    #[error("a dense layer can have at most {max} nodes, got {got}")]
    TooManyNodes { got: usize, max: usize },
    #[error("removing this layer would leave a dropout layer without a dense layer before it")]
    OrphansDropout,
    #[error("dropout rate must be between 0 and 1, got {0}")]
    InvalidRate(f64),
}

/// Errors from the request/response backend client.
///
/// `Display` yields the text shown to the user: for backend failures this is
/// the response body (or the fixed message the endpoint uses).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected before any network call.
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors from the bidirectional training channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("malformed packet: {0}")]
    Packet(String),
    #[error("invalid payload for '{event}': {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("channel is closed")]
    Closed,
}

/// Errors raised while deriving the start-training payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("epochs must be at least 1")]
    NoEpochs,
    #[error("the saved model has no layers")]
    NoLayers,
    #[error("the output layer has no node count")]
    MissingOutputNodes,
    #[error("the saved model has no input size; build the model first")]
    MissingInputSize,
}

/// Errors from driving a training session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a training session is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors from loading the studio configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
