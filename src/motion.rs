// src/motion.rs
//
// Inter-frame motion. A dense displacement field comes from the motion
// estimator collaborator (Farneback under the `opencv` feature) and is
// reduced here to a handful of summary statistics: per-axis mean and
// population standard deviation, plus the mean vector in polar form.

use crate::types::Frame;
use anyhow::{bail, Result};
use serde::Serialize;

/// Dense per-pixel displacement between two frames, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub width: usize,
    pub height: usize,
    pub dx: Vec<f32>,
    pub dy: Vec<f32>,
}

impl FlowField {
    pub fn new(width: usize, height: usize, dx: Vec<f32>, dy: Vec<f32>) -> Self {
        Self {
            width,
            height,
            dx,
            dy,
        }
    }

    /// Every pixel displaced by the same vector
    pub fn uniform(width: usize, height: usize, dx: f32, dy: f32) -> Self {
        let n = width * height;
        Self::new(width, height, vec![dx; n], vec![dy; n])
    }

    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MotionSummary {
    /// Length of the mean displacement vector (px)
    pub magnitude: f64,
    /// Direction of the mean displacement vector, degrees in (-180, 180]
    pub angle: f64,
    pub mean_x: f64,
    pub mean_y: f64,
    pub std_x: f64,
    pub std_y: f64,
    /// False for the all-zero summary used when there is nothing to
    /// compare against; its zeros are exact, never negative zero.
    #[serde(skip)]
    pub measured: bool,
}

impl MotionSummary {
    pub fn from_flow(field: &FlowField) -> Result<Self> {
        if field.is_empty() {
            bail!("empty displacement field");
        }
        if field.dx.len() != field.dy.len() || field.dx.len() != field.width * field.height {
            bail!(
                "inconsistent displacement field: {}x{} with {} / {} components",
                field.width,
                field.height,
                field.dx.len(),
                field.dy.len()
            );
        }

        let (mean_x, std_x) = mean_std(&field.dx);
        let (mean_y, std_y) = mean_std(&field.dy);

        if !(mean_x.is_finite() && mean_y.is_finite()) {
            bail!("non-finite displacement field");
        }

        Ok(Self {
            magnitude: mean_x.hypot(mean_y),
            angle: mean_y.atan2(mean_x).to_degrees(),
            mean_x,
            mean_y,
            std_x,
            std_y,
            measured: true,
        })
    }

    /// Replace angle and magnitude with their filtered values
    pub fn with_smoothed(self, angle: f64, magnitude: f64) -> Self {
        Self {
            angle,
            magnitude,
            ..self
        }
    }
}

fn mean_std(values: &[f32]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Dense optical flow between two consecutive frames
pub trait MotionEstimator {
    fn flow(&mut self, prev: &Frame, curr: &Frame) -> Result<FlowField>;
}

/// Summarise motion from `prev` to `curr`; all zeros without a previous frame.
pub fn estimate_motion(
    estimator: &mut dyn MotionEstimator,
    prev: Option<&Frame>,
    curr: &Frame,
) -> Result<MotionSummary> {
    let Some(prev) = prev else {
        return Ok(MotionSummary::default());
    };
    if prev.is_empty() || curr.is_empty() {
        return Ok(MotionSummary::default());
    }
    if prev.width != curr.width || prev.height != curr.height {
        bail!(
            "frame size changed between samples: {}x{} -> {}x{}",
            prev.width,
            prev.height,
            curr.width,
            curr.height
        );
    }

    let field = estimator.flow(prev, curr)?;
    MotionSummary::from_flow(&field)
}

#[cfg(feature = "opencv")]
pub use farneback::FarnebackEstimator;

#[cfg(feature = "opencv")]
mod farneback {
    use super::{FlowField, MotionEstimator};
    use crate::types::{FlowConfig, Frame};
    use crate::video_processor::frame_to_mat;
    use anyhow::{Context, Result};
    use opencv::{
        core::{self, Mat},
        imgproc,
        prelude::*,
        video,
    };

    /// Farneback dense optical flow on grayscale frames
    pub struct FarnebackEstimator {
        config: FlowConfig,
    }

    impl FarnebackEstimator {
        pub fn new(config: FlowConfig) -> Self {
            Self { config }
        }

        fn to_gray(frame: &Frame) -> Result<Mat> {
            let bgr = frame_to_mat(frame)?;
            let mut gray = Mat::default();
            imgproc::cvt_color(&bgr, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
            Ok(gray)
        }
    }

    impl MotionEstimator for FarnebackEstimator {
        fn flow(&mut self, prev: &Frame, curr: &Frame) -> Result<FlowField> {
            let prev_gray = Self::to_gray(prev).context("previous frame")?;
            let curr_gray = Self::to_gray(curr).context("current frame")?;

            let flags = if self.config.gaussian_window {
                video::OPTFLOW_FARNEBACK_GAUSSIAN
            } else {
                0
            };

            let mut flow = Mat::default();
            video::calc_optical_flow_farneback(
                &prev_gray,
                &curr_gray,
                &mut flow,
                self.config.pyr_scale,
                self.config.levels,
                self.config.winsize,
                self.config.iterations,
                self.config.poly_n,
                self.config.poly_sigma,
                flags,
            )
            .context("Farneback optical flow failed")?;

            let rows = flow.rows() as usize;
            let cols = flow.cols() as usize;
            let vectors = flow.data_typed::<core::Vec2f>()?;

            let mut dx = Vec::with_capacity(vectors.len());
            let mut dy = Vec::with_capacity(vectors.len());
            for v in vectors {
                dx.push(v[0]);
                dy.push(v[1]);
            }

            Ok(FlowField::new(cols, rows, dx, dy))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct FixedFlow(FlowField);

    impl MotionEstimator for FixedFlow {
        fn flow(&mut self, _prev: &Frame, _curr: &Frame) -> Result<FlowField> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_uniform_field_summary() {
        let summary = MotionSummary::from_flow(&FlowField::uniform(8, 4, 3.0, 4.0)).unwrap();
        assert_abs_diff_eq!(summary.magnitude, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.angle, 4.0f64.atan2(3.0).to_degrees(), epsilon = 1e-12);
        assert_eq!(summary.std_x, 0.0);
        assert_eq!(summary.std_y, 0.0);
        assert!(summary.measured);
    }

    #[test]
    fn test_population_std() {
        let field = FlowField::new(2, 2, vec![1.0, 3.0, 1.0, 3.0], vec![0.0, 0.0, 0.0, 0.0]);
        let summary = MotionSummary::from_flow(&field).unwrap();
        assert_abs_diff_eq!(summary.mean_x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.std_x, 1.0, epsilon = 1e-12);
        assert_eq!(summary.angle, 0.0);
    }

    #[test]
    fn test_angle_range() {
        let left = MotionSummary::from_flow(&FlowField::uniform(2, 2, -1.0, 0.0)).unwrap();
        assert_abs_diff_eq!(left.angle, 180.0, epsilon = 1e-12);

        let up = MotionSummary::from_flow(&FlowField::uniform(2, 2, 0.0, -2.0)).unwrap();
        assert_abs_diff_eq!(up.angle, -90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_field_is_error() {
        assert!(MotionSummary::from_flow(&FlowField::new(0, 0, vec![], vec![])).is_err());
        let broken = FlowField::new(2, 2, vec![0.0; 4], vec![0.0; 3]);
        assert!(MotionSummary::from_flow(&broken).is_err());
    }

    #[test]
    fn test_no_previous_frame_gives_zeros() {
        let mut estimator = FixedFlow(FlowField::uniform(4, 4, 5.0, 5.0));
        let frame = Frame::filled(4, 4, [10, 20, 30]);
        let summary = estimate_motion(&mut estimator, None, &frame).unwrap();
        assert_eq!(summary, MotionSummary::default());
        assert!(!summary.measured);
    }

    #[test]
    fn test_size_change_is_error() {
        let mut estimator = FixedFlow(FlowField::uniform(4, 4, 1.0, 0.0));
        let prev = Frame::filled(4, 4, [0, 0, 0]);
        let curr = Frame::filled(8, 4, [0, 0, 0]);
        assert!(estimate_motion(&mut estimator, Some(&prev), &curr).is_err());
    }

    #[test]
    fn test_with_smoothed_keeps_statistics() {
        let field = FlowField::new(2, 1, vec![1.0, 3.0], vec![2.0, 2.0]);
        let raw = MotionSummary::from_flow(&field).unwrap();
        let smoothed = raw.with_smoothed(12.0, 0.5);
        assert_eq!(smoothed.angle, 12.0);
        assert_eq!(smoothed.magnitude, 0.5);
        assert_eq!(smoothed.std_x, raw.std_x);
        assert_eq!(smoothed.mean_y, raw.mean_y);
    }
}
