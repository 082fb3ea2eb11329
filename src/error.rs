// src/error.rs
//
// Failure taxonomy of a pipeline run. Horizon detection failures never
// appear here: the horizon estimator absorbs them as a 0.0 angle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// One of the two input videos could not be opened. Fatal to the run.
    #[error("failed to open video stream '{path}': {reason}")]
    StreamOpen { path: String, reason: String },

    /// A sampled index could not be processed. The index is skipped.
    #[error("failed to process frame {index}: {source:#}")]
    FrameProcessing {
        index: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The report file could not be created. Fatal to the run.
    #[error("failed to write report '{path}': {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn stream_open(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::StreamOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn frame(index: u64, source: anyhow::Error) -> Self {
        Self::FrameProcessing { index, source }
    }

    pub fn report_write(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::ReportWrite {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_mentions_index_and_cause() {
        let err = PipelineError::frame(42, anyhow::anyhow!("embedding backend exploded"));
        let text = err.to_string();
        assert!(text.contains("frame 42"));
        assert!(text.contains("embedding backend exploded"));
    }

    #[test]
    fn test_report_write_names_path() {
        let err = PipelineError::report_write(
            std::path::Path::new("out/report.jsonl"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        );
        assert_eq!(
            err.to_string(),
            "failed to write report 'out/report.jsonl': no such directory"
        );
    }

    #[test]
    fn test_stream_open_message() {
        let err = PipelineError::stream_open("a2b.mp4", "no such file");
        assert_eq!(
            err.to_string(),
            "failed to open video stream 'a2b.mp4': no such file"
        );
    }
}
