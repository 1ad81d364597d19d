pub mod layer;
pub mod spec;
pub mod store;

pub use layer::{
    Activation, LayerConfig, LayerKind, LayerPatch, LayerSettings, MAX_DENSE_NODES,
    OUTPUT_LAYER_ID,
};
pub use spec::ModelConfig;
pub use store::ModelStore;
