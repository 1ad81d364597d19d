use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::model::layer::{
    Activation, LayerConfig, LayerKind, LayerPatch, LayerSettings, MAX_DENSE_NODES,
    OUTPUT_LAYER_ID, RETYPE_DENSE_NODES,
};
use crate::model::spec::ModelConfig;

const DENSE_ONLY: &[LayerKind] = &[LayerKind::Dense];
const DENSE_OR_DROPOUT: &[LayerKind] = &[LayerKind::Dense, LayerKind::Dropout];

struct StoreInner {
    config: Arc<ModelConfig>,
    revision: u64,
    next_id: u64,
}

/// Shared handle to the in-progress network definition.
///
/// Every view that edits or displays the layer list holds a clone of the same
/// `ModelStore`. Mutations never touch the current snapshot: they build a new
/// `ModelConfig`, swap it in whole and bump `revision`, so readers holding an
/// older `Arc<ModelConfig>` keep a consistent view.
#[derive(Clone)]
pub struct ModelStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for ModelStore {
    fn default() -> Self {
        ModelStore::new()
    }
}

impl ModelStore {
    /// Creates an empty store (no layers, no input size).
    pub fn new() -> Self {
        ModelStore {
            inner: Arc::new(Mutex::new(StoreInner {
                config: Arc::new(ModelConfig::new()),
                revision: 0,
                next_id: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Arc<ModelConfig> {
        self.lock().config.clone()
    }

    /// Incremented on every successful mutation; consumers redraw when it changes.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Layer types the editor may offer for the next `add_layer`.
    ///
    /// Dropout is only offered directly after a dense layer, so the first
    /// layer is always dense and two dropouts are never adjacent.
    pub fn offered_kinds(&self) -> &'static [LayerKind] {
        offered_after(self.lock().config.last_layer())
    }

    /// Appends a layer of `kind` with default settings and returns it.
    pub fn add_layer(&self, kind: LayerKind) -> Result<LayerConfig, StoreError> {
        let mut inner = self.lock();
        if !offered_after(inner.config.last_layer()).contains(&kind) {
            return Err(StoreError::KindNotOffered(kind));
        }
        let layer = LayerConfig::new(format!("layer-{}", inner.next_id), kind);
        inner.next_id += 1;

        let mut next = (*inner.config).clone();
        next.layers.push(layer.clone());
        commit(&mut inner, next);
        log::debug!("added {} layer {}", kind, layer.id);
        Ok(layer)
    }

    /// Merges `patch` into the settings of layer `id`.
    pub fn update_layer(&self, id: &str, patch: LayerPatch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let idx = editable_index(&inner.config, id)?;
        let kind = inner.config.layers[idx].kind;

        match kind {
            LayerKind::Dense if patch.rate.is_some() => {
                return Err(StoreError::NotApplicable { field: "rate", kind });
            }
            LayerKind::Dropout if patch.nodes.is_some() => {
                return Err(StoreError::NotApplicable { field: "nodes", kind });
            }
            LayerKind::Dropout if patch.activation.is_some() => {
                return Err(StoreError::NotApplicable { field: "activation", kind });
            }
            _ => {}
        }
        match patch.nodes {
            Some(0) => return Err(StoreError::InvalidNodes),
            Some(got) if got > MAX_DENSE_NODES => {
                return Err(StoreError::TooManyNodes { got, max: MAX_DENSE_NODES });
            }
            _ => {}
        }
        if let Some(rate) = patch.rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(StoreError::InvalidRate(rate));
            }
        }
        if patch.is_empty() {
            return Ok(());
        }

        let mut next = (*inner.config).clone();
        let settings = &mut next.layers[idx].settings;
        if let Some(nodes) = patch.nodes {
            settings.nodes = Some(nodes);
        }
        if let Some(rate) = patch.rate {
            settings.rate = Some(rate);
        }
        if let Some(activation) = patch.activation {
            settings.activation = Some(activation);
        }
        commit(&mut inner, next);
        Ok(())
    }

    /// Changes the type of layer `id`, resetting its settings to the editor
    /// defaults for the new type.
    pub fn retype_layer(&self, id: &str, kind: LayerKind) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let idx = editable_index(&inner.config, id)?;
        let layers = &inner.config.layers;
        if layers[idx].kind == kind {
            return Ok(());
        }
        if kind == LayerKind::Dropout {
            let prev_dense = idx > 0 && layers[idx - 1].is_dense();
            let next_dropout = layers.get(idx + 1).is_some_and(|l| !l.is_dense());
            if !prev_dense || next_dropout {
                return Err(StoreError::KindNotOffered(kind));
            }
        }

        let mut next = (*inner.config).clone();
        let layer = &mut next.layers[idx];
        layer.kind = kind;
        layer.settings = match kind {
            LayerKind::Dense => LayerSettings::dense(RETYPE_DENSE_NODES, Activation::Relu),
            LayerKind::Dropout => LayerSettings::defaults_for(LayerKind::Dropout),
        };
        commit(&mut inner, next);
        Ok(())
    }

    /// Deletes layer `id`. Remaining layers keep their ids and order.
    ///
    /// A dense layer directly followed by a dropout cannot be removed when
    /// that dropout would end up first or next to another dropout; remove
    /// the dropout first.
    pub fn remove_layer(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let idx = editable_index(&inner.config, id)?;
        let layers = &inner.config.layers;
        if layers.get(idx + 1).is_some_and(|l| !l.is_dense()) {
            let prev_dropout = idx > 0 && !layers[idx - 1].is_dense();
            if idx == 0 || prev_dropout {
                return Err(StoreError::OrphansDropout);
            }
        }
        let mut next = (*inner.config).clone();
        next.layers.remove(idx);
        commit(&mut inner, next);
        Ok(())
    }

    /// Returns the configuration to persist: the current layers followed by a
    /// dense output layer sized to `output_nodes`, with `input_size` set.
    ///
    /// The store itself is left untouched. A previously appended output layer
    /// is replaced rather than duplicated.
    pub fn finalize_for_build(
        &self,
        output_nodes: usize,
        input_size: usize,
    ) -> Result<ModelConfig, StoreError> {
        if output_nodes == 0 {
            return Err(StoreError::InvalidNodes);
        }
        let current = self.snapshot();
        let mut layers: Vec<LayerConfig> =
            current.layers.iter().filter(|l| !l.is_output()).cloned().collect();
        layers.push(LayerConfig {
            id: OUTPUT_LAYER_ID.to_owned(),
            kind: LayerKind::Dense,
            settings: LayerSettings::dense(output_nodes, Activation::for_output(output_nodes)),
        });
        Ok(ModelConfig { input_size: Some(input_size), layers })
    }

    /// Replaces the whole configuration, e.g. with a copy restored from the backend.
    pub fn replace(&self, config: ModelConfig) {
        let mut inner = self.lock();
        commit(&mut inner, config);
    }

    /// Clears all layers and the input size.
    pub fn reset(&self) {
        self.replace(ModelConfig::new());
    }
}

fn offered_after(last: Option<&LayerConfig>) -> &'static [LayerKind] {
    match last {
        Some(layer) if layer.is_dense() && !layer.is_output() => DENSE_OR_DROPOUT,
        _ => DENSE_ONLY,
    }
}

fn editable_index(config: &ModelConfig, id: &str) -> Result<usize, StoreError> {
    if id == OUTPUT_LAYER_ID {
        return Err(StoreError::OutputLayerLocked);
    }
    config
        .layers
        .iter()
        .position(|l| l.id == id)
        .ok_or_else(|| StoreError::LayerNotFound(id.to_owned()))
}

fn commit(inner: &mut StoreInner, next: ModelConfig) {
    inner.config = Arc::new(next);
    inner.revision += 1;
}
