// src/pipeline/metrics.rs
//
// Per-run counters and timings. Summarised in the log at the end of a run
// and kept on the orchestrator for callers.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub reports_written: u64,
    pub frames_failed: u64,
    similarity_sum: f64,
    processing_time: Duration,
    started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_read: 0,
            frames_sampled: 0,
            reports_written: 0,
            frames_failed: 0,
            similarity_sum: 0.0,
            processing_time: Duration::ZERO,
            started_at: Instant::now(),
        }
    }

    pub fn record_read(&mut self) {
        self.frames_read += 1;
    }

    pub fn record_sampled(&mut self) {
        self.frames_sampled += 1;
    }

    pub fn record_success(&mut self, similarity: f64, took: Duration) {
        self.reports_written += 1;
        self.similarity_sum += similarity;
        self.processing_time += took;
    }

    pub fn record_failure(&mut self, took: Duration) {
        self.frames_failed += 1;
        self.processing_time += took;
    }

    pub fn mean_similarity(&self) -> Option<f64> {
        if self.reports_written == 0 {
            None
        } else {
            Some(self.similarity_sum / self.reports_written as f64)
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let processed = self.reports_written + self.frames_failed;
        let avg_sample_ms = if processed > 0 {
            self.processing_time.as_secs_f64() * 1000.0 / processed as f64
        } else {
            0.0
        };

        MetricsSummary {
            frames_read: self.frames_read,
            frames_sampled: self.frames_sampled,
            reports_written: self.reports_written,
            frames_failed: self.frames_failed,
            mean_similarity: self.mean_similarity(),
            avg_sample_ms,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub reports_written: u64,
    pub frames_failed: u64,
    pub mean_similarity: Option<f64>,
    pub avg_sample_ms: f64,
    pub elapsed_secs: f64,
}
