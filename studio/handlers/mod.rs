pub mod builder;
pub mod data;
pub mod train;
pub mod train_sse;
