// src/pipeline/mod.rs

pub mod frame_context;
pub mod metrics;
pub mod orchestrator;

pub use frame_context::FramePair;
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use orchestrator::{PipelineConfig, PipelineOrchestrator};
