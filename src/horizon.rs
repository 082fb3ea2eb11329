// src/horizon.rs
//
// Horizon tilt estimation, used as the roll signal.
//
// Line candidates come from a segment detector (Canny + probabilistic
// Hough under the `opencv` feature). Only near-horizontal segments are
// horizon-like: segments narrower than `min_dx` are treated as vertical and
// segments steeper than `max_abs_angle` are dropped. The tilt is the median
// angle of what survives.
//
// The estimator never fails: an empty frame, no surviving candidates, or a
// detector error all produce 0.0.

use crate::types::{Frame, HorizonConfig};
use anyhow::Result;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn dx(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn dy(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Image-space angle in degrees (y grows downwards)
    pub fn angle_degrees(&self) -> f64 {
        (self.dy() as f64).atan2(self.dx() as f64).to_degrees()
    }
}

/// Edge/line extraction on a single frame
pub trait LineSegmentDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<LineSegment>>;
}

/// Median angle of the horizon-like segments, `None` when nothing qualifies
pub fn horizon_angle(segments: &[LineSegment], min_dx: f64, max_abs_angle: f64) -> Option<f64> {
    let mut angles: Vec<f64> = segments
        .iter()
        .filter(|s| (s.dx().abs() as f64) >= min_dx)
        .map(|s| s.angle_degrees())
        .filter(|a| a.abs() < max_abs_angle)
        .collect();

    if angles.is_empty() {
        return None;
    }
    Some(median(&mut angles))
}

/// Median; the mean of the two middle values for even counts
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

pub struct HorizonEstimator {
    detector: Box<dyn LineSegmentDetector>,
    min_dx: f64,
    max_abs_angle: f64,
}

impl HorizonEstimator {
    pub fn new(detector: Box<dyn LineSegmentDetector>, config: &HorizonConfig) -> Self {
        Self {
            detector,
            min_dx: config.min_dx,
            max_abs_angle: config.max_abs_angle,
        }
    }

    /// Horizon tilt in degrees, 0.0 when undetectable
    pub fn estimate(&mut self, frame: &Frame) -> f64 {
        if frame.is_empty() {
            return 0.0;
        }

        let segments = match self.detector.detect(frame) {
            Ok(segments) => segments,
            Err(e) => {
                warn!("Horizon detection failed: {:#}", e);
                return 0.0;
            }
        };

        match horizon_angle(&segments, self.min_dx, self.max_abs_angle) {
            Some(angle) => {
                debug!(
                    "Horizon tilt {:.2}° from {} segment(s)",
                    angle,
                    segments.len()
                );
                angle
            }
            None => 0.0,
        }
    }
}

#[cfg(feature = "opencv")]
pub use hough::HoughHorizonDetector;

#[cfg(feature = "opencv")]
mod hough {
    use super::{LineSegment, LineSegmentDetector};
    use crate::types::{Frame, HorizonConfig};
    use crate::video_processor::frame_to_mat;
    use anyhow::Result;
    use opencv::{
        core::{self, Mat, Vector},
        imgproc,
        prelude::*,
    };

    /// Canny edges + probabilistic Hough transform on a downscaled frame
    pub struct HoughHorizonDetector {
        config: HorizonConfig,
    }

    impl HoughHorizonDetector {
        pub fn new(config: HorizonConfig) -> Self {
            Self { config }
        }
    }

    impl LineSegmentDetector for HoughHorizonDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<LineSegment>> {
            let bgr = frame_to_mat(frame)?;

            let mut small = Mat::default();
            imgproc::resize(
                &bgr,
                &mut small,
                core::Size::new(self.config.working_width, self.config.working_height),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;

            let mut gray = Mat::default();
            imgproc::cvt_color(&small, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

            let k = self.config.blur_kernel;
            let mut blurred = Mat::default();
            imgproc::gaussian_blur(
                &gray,
                &mut blurred,
                core::Size::new(k, k),
                0.0,
                0.0,
                core::BORDER_DEFAULT,
            )?;

            let mut edges = Mat::default();
            imgproc::canny(
                &blurred,
                &mut edges,
                self.config.canny_low,
                self.config.canny_high,
                3,
                false,
            )?;

            let mut lines = Vector::<core::Vec4i>::new();
            imgproc::hough_lines_p(
                &edges,
                &mut lines,
                1.0,
                std::f64::consts::PI / 180.0,
                self.config.hough_threshold,
                self.config.min_line_length,
                self.config.max_line_gap,
            )?;

            Ok(lines
                .iter()
                .map(|l| LineSegment::new(l[0], l[1], l[2], l[3]))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use approx::assert_abs_diff_eq;

    struct FixedSegments(Vec<LineSegment>);

    impl LineSegmentDetector for FixedSegments {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<LineSegment>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl LineSegmentDetector for Broken {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<LineSegment>> {
            Err(anyhow!("detector crashed"))
        }
    }

    fn estimator(segments: Vec<LineSegment>) -> HorizonEstimator {
        HorizonEstimator::new(
            Box::new(FixedSegments(segments)),
            &HorizonConfig::default(),
        )
    }

    fn frame() -> Frame {
        Frame::filled(64, 48, [90, 90, 90])
    }

    #[test]
    fn test_empty_frame_is_zero() {
        let mut est = estimator(vec![LineSegment::new(0, 0, 200, 20)]);
        assert_eq!(est.estimate(&Frame::default()), 0.0);
    }

    #[test]
    fn test_no_segments_is_zero() {
        let mut est = estimator(vec![]);
        assert_eq!(est.estimate(&frame()), 0.0);
    }

    #[test]
    fn test_only_vertical_or_steep_is_zero() {
        let mut est = estimator(vec![
            LineSegment::new(100, 0, 110, 300), // |dx| < 20
            LineSegment::new(0, 0, 100, 100),   // 45°
            LineSegment::new(0, 0, 100, -80),   // about -38.7°
            LineSegment::new(200, 0, 0, 10),    // pointing left, about 177°
        ]);
        assert_eq!(est.estimate(&frame()), 0.0);
    }

    #[test]
    fn test_detector_failure_is_zero() {
        let mut est = HorizonEstimator::new(Box::new(Broken), &HorizonConfig::default());
        assert_eq!(est.estimate(&frame()), 0.0);
    }

    #[test]
    fn test_median_of_surviving_candidates() {
        let tilted = LineSegment::new(0, 0, 100, 10);
        let mut est = estimator(vec![
            LineSegment::new(0, 0, 100, 0),
            tilted,
            LineSegment::new(0, 0, 100, 20),
            LineSegment::new(50, 0, 55, 200), // vertical, dropped
        ]);
        assert_abs_diff_eq!(est.estimate(&frame()), tilted.angle_degrees(), epsilon = 1e-12);
    }

    #[test]
    fn test_even_count_median_averages_middle() {
        let angle = horizon_angle(
            &[
                LineSegment::new(0, 0, 100, 0),
                LineSegment::new(0, 0, 100, 10),
            ],
            20.0,
            30.0,
        )
        .unwrap();
        let expected = (0.0 + LineSegment::new(0, 0, 100, 10).angle_degrees()) / 2.0;
        assert_abs_diff_eq!(angle, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_thirty_degrees_excluded() {
        // tan(30°) * 100 ≈ 57.735: 58 is just above, 57 just below
        assert!(horizon_angle(&[LineSegment::new(0, 0, 100, 58)], 20.0, 30.0).is_none());
        assert!(horizon_angle(&[LineSegment::new(0, 0, 100, 57)], 20.0, 30.0).is_some());
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_blank_frame_has_no_horizon() {
        let mut est = HorizonEstimator::new(
            Box::new(HoughHorizonDetector::new(HorizonConfig::default())),
            &HorizonConfig::default(),
        );
        assert_eq!(est.estimate(&Frame::filled(320, 240, [128, 128, 128])), 0.0);
    }
}
