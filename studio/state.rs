use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netforge::api::{
    ColumnHistogram, ComparisonSummary, DataSummary, NetworkParameters, SplitSizes,
};
use netforge::train::ConfigSource;
use netforge::{
    render_svg, BackendClient, Canvas, ClientError, DiagramLayout, MetricsHistory, ModelConfig,
    ModelStore, StudioConfig, TrainingSession,
};

// ---------------------------------------------------------------------------
// Training start
// ---------------------------------------------------------------------------

const CONFIG_NOT_FETCHED: &str = "Failed to fetch model configuration";

/// Saved model configuration, fetched from the backend by `POST /train/start`
/// before the state lock is taken. The session reads it when the channel
/// connects instead of calling the backend itself.
#[derive(Clone, Default)]
pub struct StartConfig {
    slot: Arc<Mutex<Option<ModelConfig>>>,
}

impl StartConfig {
    pub fn set(&self, config: ModelConfig) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(config);
    }
}

impl ConfigSource for StartConfig {
    fn model_config(&self) -> Result<ModelConfig, ClientError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ClientError::Validation(CONFIG_NOT_FETCHED.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Dataset workflow
// ---------------------------------------------------------------------------

/// What the Data page has learned from the backend so far.
#[derive(Debug, Clone, Default)]
pub struct DatasetState {
    /// Name of the last CSV uploaded through the studio.
    pub file_name: Option<String>,
    pub columns: Vec<String>,
    pub label_candidates: Vec<String>,
    pub label_column: Option<String>,
    pub summary: Option<DataSummary>,
    /// Column name and its value counts.
    pub histogram: Option<(String, ColumnHistogram)>,
    /// Columns removed by the last drop, for the status line.
    pub dropped: Vec<String>,
    pub comparison: Option<ComparisonSummary>,
    pub split: Option<SplitSizes>,
}

// ---------------------------------------------------------------------------
// Flash messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum FlashKind { Success, Error }

#[derive(Debug, Clone)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        FlashMessage { kind: FlashKind::Success, text: text.into() }
    }
    pub fn error(text: impl Into<String>) -> Self {
        FlashMessage { kind: FlashKind::Error, text: text.into() }
    }
}

// ---------------------------------------------------------------------------
// Main state struct
// ---------------------------------------------------------------------------

pub struct StudioState {
    pub config:     StudioConfig,
    pub client:     BackendClient,
    /// Layer list being edited on the Model page.
    pub store:      ModelStore,
    /// Fetched once, on first need.
    pub network_params: Option<NetworkParameters>,
    /// Last configuration saved with Build Model.
    pub built:      Option<ModelConfig>,
    pub dataset:    DatasetState,
    pub session:    TrainingSession<StartConfig>,
    /// Configuration the next run sends; shared with `session`.
    pub start_config: StartConfig,
    /// Per-epoch metrics of the current run.
    pub history:    MetricsHistory,
    /// True while a driver thread is pumping the session.
    pub driving:    bool,
    /// Bumped whenever the session or history changes, for the SSE stream.
    pub training_revision: u64,
    /// One-shot flash message for the next page render.
    pub flash:      Option<FlashMessage>,
    /// Store revision and output class count the cached SVG was drawn for.
    diagram_cache:  Option<(u64, Option<usize>, String)>,
}

impl StudioState {
    pub fn new(config: StudioConfig) -> Self {
        let client = BackendClient::new(&config.backend_url);
        let start_config = StartConfig::default();
        StudioState {
            session: TrainingSession::new(start_config.clone()),
            start_config,
            client,
            config,
            store: ModelStore::new(),
            network_params: None,
            built: None,
            dataset: DatasetState::default(),
            history: MetricsHistory::new(),
            driving: false,
            training_revision: 0,
            flash: None,
            diagram_cache: None,
        }
    }

    /// Takes and returns the current flash message, clearing it.
    pub fn take_flash(&mut self) -> Option<FlashMessage> {
        self.flash.take()
    }

    /// Diagram of the current layer list, re-rendered only when the store
    /// revision or the output class count has moved.
    pub fn diagram_svg(&mut self) -> String {
        let revision = self.store.revision();
        let classes = self.network_params.map(|p| p.num_label_classes);
        if let Some((cached, cached_classes, svg)) = &self.diagram_cache {
            if *cached == revision && *cached_classes == classes {
                return svg.clone();
            }
        }
        let canvas = Canvas::new(self.config.diagram_width, self.config.diagram_height);
        let svg = render_svg(&DiagramLayout::compute(&self.store.snapshot(), classes, canvas));
        self.diagram_cache = Some((revision, classes, svg.clone()));
        svg
    }

    /// Forgets data-dependent caches after the dataset changes shape.
    pub fn dataset_changed(&mut self) {
        self.network_params = None;
        self.diagram_cache = None;
        self.dataset.split = None;
        self.dataset.comparison = None;
    }
}

/// Shared state handle passed to every handler.
pub type SharedState = Arc<Mutex<StudioState>>;

/// Locks the shared state, recovering the guard if a handler thread panicked.
pub fn lock(state: &SharedState) -> MutexGuard<'_, StudioState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Network parameters from the backend, fetched on first use. The request
/// runs with the state lock released.
pub fn fetch_network_params(state: &SharedState) -> Result<NetworkParameters, ClientError> {
    let client = {
        let st = lock(state);
        if let Some(params) = st.network_params {
            return Ok(params);
        }
        st.client.clone()
    };
    let params = client.network_parameters()?;
    log::info!(
        "network parameters: {} label classes, {} input columns",
        params.num_label_classes,
        params.num_cols
    );
    lock(state).network_params = Some(params);
    Ok(params)
}
