// src/lib.rs
//
// Route deviation analysis: compares a forward route video with the
// reverse-direction recording of the same route and emits per-sample
// flight correction recommendations.

pub mod config;
pub mod correction;
pub mod embedding;
pub mod environment;
pub mod error;
pub mod horizon;
pub mod motion;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod smoother;
pub mod types;
pub mod video_processor;

pub use correction::{CorrectionReport, DeviationStatus};
pub use error::PipelineError;
pub use pipeline::{PipelineConfig, PipelineOrchestrator};
pub use types::{Config, Frame, ReportLocale};
