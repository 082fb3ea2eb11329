// src/pipeline/orchestrator.rs
//
// Drives one comparison run: reads the forward and reverse streams in
// lockstep, samples every N-th index, runs the analyzers on the pair and
// appends one report block per successful sample.
//
// Each sample is transactional. The smoothing filters and the previous
// forward frame only move once the block has been written, so a failed
// sample leaves the run exactly as it was before it.

use crate::correction::{synthesize, CorrectionReport};
use crate::embedding::{Embedder, SimilarityScorer};
use crate::environment::EnvironmentSnapshot;
use crate::error::PipelineError;
use crate::horizon::{HorizonEstimator, LineSegmentDetector};
use crate::motion::{estimate_motion, MotionEstimator};
use crate::pipeline::frame_context::FramePair;
use crate::pipeline::metrics::{MetricsSummary, PipelineMetrics};
use crate::report::ReportWriter;
use crate::smoother::ScalarKalman;
use crate::types::{Config, Frame, HorizonConfig, ReportLocale, SmoothingConfig};
use crate::video_processor::{sampling_interval, FrameSource, StreamOpener};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Samples analysed per second of video
    pub target_fps: f64,
    pub smoothing: SmoothingConfig,
    pub horizon: HorizonConfig,
    pub locale: ReportLocale,
    pub jsonl_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_fps: 1.0,
            smoothing: SmoothingConfig::default(),
            horizon: HorizonConfig::default(),
            locale: ReportLocale::default(),
            jsonl_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_fps: config.video.target_fps,
            smoothing: config.smoothing,
            horizon: config.horizon.clone(),
            locale: config.output.locale,
            jsonl_path: config.output.jsonl_path.as_ref().map(PathBuf::from),
        }
    }
}

pub struct PipelineOrchestrator {
    opener: Box<dyn StreamOpener>,
    scorer: SimilarityScorer,
    motion: Box<dyn MotionEstimator>,
    horizon: HorizonEstimator,
    config: PipelineConfig,

    // Per-run state
    angle_filter: ScalarKalman,
    magnitude_filter: ScalarKalman,
    previous_frame_a: Option<Frame>,
    last_metrics: Option<MetricsSummary>,
}

impl PipelineOrchestrator {
    pub fn new(
        opener: Box<dyn StreamOpener>,
        embedder: Box<dyn Embedder>,
        motion: Box<dyn MotionEstimator>,
        detector: Box<dyn LineSegmentDetector>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            opener,
            scorer: SimilarityScorer::new(embedder),
            motion,
            horizon: HorizonEstimator::new(detector, &config.horizon),
            angle_filter: ScalarKalman::from_config(&config.smoothing),
            magnitude_filter: ScalarKalman::from_config(&config.smoothing),
            previous_frame_a: None,
            last_metrics: None,
            config,
        }
    }

    /// Compare `forward` against `reverse` and write the report to `output`.
    ///
    /// Returns the reports that made it into the file, in order. Fatal
    /// problems (a stream that will not open, an unwritable report) are
    /// logged and produce an empty result.
    pub fn run(&mut self, forward: &Path, reverse: &Path, output: &Path) -> Vec<CorrectionReport> {
        self.angle_filter.reset();
        self.magnitude_filter.reset();
        self.previous_frame_a = None;
        self.last_metrics = None;

        let mut metrics = PipelineMetrics::new();

        let (mut source_a, mut source_b) = match self.open_streams(forward, reverse) {
            Ok(sources) => sources,
            Err(e) => {
                error!("{}", e);
                return Vec::new();
            }
        };

        let native_fps = source_a.fps();
        let interval = sampling_interval(native_fps, self.config.target_fps);
        info!(
            "Sampling every {} frame(s) ({:.2} FPS native, {:.2} FPS target)",
            interval, native_fps, self.config.target_fps
        );

        let mut writer = match ReportWriter::create(
            output,
            self.config.jsonl_path.as_deref(),
            self.config.locale,
        ) {
            Ok(writer) => writer,
            Err(e) => {
                error!("{}", e);
                return Vec::new();
            }
        };

        let mut reports = Vec::new();
        let mut index: u64 = 0;

        loop {
            let Some(frame_a) = next_frame(source_a.as_mut(), "forward", index) else {
                break;
            };
            let Some(frame_b) = next_frame(source_b.as_mut(), "reverse", index) else {
                break;
            };
            metrics.record_read();

            if index % interval == 0 {
                metrics.record_sampled();
                let pair = FramePair::new(index, native_fps, frame_a, &frame_b);
                let started = Instant::now();

                match self.process_pair(pair, &mut writer) {
                    Ok(report) => {
                        let took = started.elapsed();
                        info!(
                            "Processed t={:.1}s: similarity={:.2}% ({:.0} ms)",
                            report.timestamp,
                            report.similarity,
                            took.as_secs_f64() * 1000.0
                        );
                        metrics.record_success(report.similarity, took);
                        reports.push(report);
                    }
                    Err(source) => {
                        metrics.record_failure(started.elapsed());
                        error!("{}", PipelineError::frame(index, source));
                    }
                }
            }

            index += 1;
        }

        let summary = metrics.summary();
        info!(
            "✓ Run complete: {} frame(s) read, {} sampled, {} report(s) written, {} failed",
            summary.frames_read,
            summary.frames_sampled,
            summary.reports_written,
            summary.frames_failed
        );
        if let Some(mean) = summary.mean_similarity {
            info!("  Mean similarity: {:.2}%", mean);
        }
        info!(
            "  Avg sample time: {:.1} ms, elapsed {:.1}s",
            summary.avg_sample_ms, summary.elapsed_secs
        );
        self.last_metrics = Some(summary);

        reports
    }

    /// Metrics of the most recent completed run
    pub fn last_metrics(&self) -> Option<&MetricsSummary> {
        self.last_metrics.as_ref()
    }

    fn open_streams(
        &self,
        forward: &Path,
        reverse: &Path,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn FrameSource>), PipelineError> {
        let open = |path: &Path| {
            self.opener.open(path).map_err(|e| {
                PipelineError::stream_open(path.display().to_string(), format!("{:#}", e))
            })
        };

        let source_a = open(forward)?;
        let fps = source_a.fps();
        if !(fps.is_finite() && fps > 0.0) {
            return Err(PipelineError::stream_open(
                forward.display().to_string(),
                format!("invalid frame rate {}", fps),
            ));
        }
        let source_b = open(reverse)?;

        Ok((source_a, source_b))
    }

    fn process_pair(&mut self, pair: FramePair, writer: &mut ReportWriter) -> Result<CorrectionReport> {
        let similarity = self.scorer.score(&pair.frame_a, &pair.frame_b)?;

        let raw = estimate_motion(
            self.motion.as_mut(),
            self.previous_frame_a.as_ref(),
            &pair.frame_a,
        )?;

        // No smoothing until there is a real flow measurement
        let (motion, filter_states) = if self.previous_frame_a.is_some() {
            let (angle, angle_state) = self.angle_filter.preview(raw.angle);
            let (magnitude, magnitude_state) = self.magnitude_filter.preview(raw.magnitude);
            (
                raw.with_smoothed(angle, magnitude),
                Some((angle_state, magnitude_state)),
            )
        } else {
            (raw, None)
        };
        debug!(
            "Flow at frame {}: raw {:.2}°/{:.4}, smoothed {:.2}°/{:.4}",
            pair.index, raw.angle, raw.magnitude, motion.angle, motion.magnitude
        );

        let environment = EnvironmentSnapshot::at(pair.timestamp);
        let horizon_angle = self.horizon.estimate(&pair.frame_a);
        let report = synthesize(
            similarity,
            &motion,
            &environment,
            pair.timestamp,
            horizon_angle,
        );

        writer.append(&report)?;

        if let Some((angle_state, magnitude_state)) = filter_states {
            self.angle_filter.commit(angle_state);
            self.magnitude_filter.commit(magnitude_state);
        }
        self.previous_frame_a = Some(pair.frame_a);

        Ok(report)
    }
}

/// Next frame from `source`; end of stream and read errors both stop the run.
fn next_frame(source: &mut dyn FrameSource, label: &str, index: u64) -> Option<Frame> {
    match source.read_frame() {
        Ok(Some(frame)) => Some(frame),
        Ok(None) => {
            debug!("End of {} stream at frame {}", label, index);
            None
        }
        Err(e) => {
            warn!("Read error on {} stream at frame {}: {:#}", label, index, e);
            None
        }
    }
}
