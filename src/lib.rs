pub mod config;
pub mod loaders;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod settings;
pub mod translate;
