// src/types.rs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub video: VideoConfig,
    pub smoothing: SmoothingConfig,
    pub flow: FlowConfig,
    pub horizon: HorizonConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of VGG16 truncated at `block5_pool`
    pub path: String,
    pub input_name: String,
    pub input_width: usize,
    pub input_height: usize,
    pub layout: TensorLayout,
    pub num_threads: usize,
    pub use_cuda: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/vgg16_block5_pool.onnx".to_string(),
            input_name: "input_1".to_string(),
            input_width: 224,
            input_height: 224,
            layout: TensorLayout::Nhwc,
            num_threads: 4,
            use_cuda: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Route flown A→B
    pub forward_path: String,
    /// Same route flown B→A
    pub reverse_path: String,
    /// Analysis rate; the sampling interval is round(native_fps / target_fps)
    pub target_fps: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            forward_path: "a2b.mp4".to_string(),
            reverse_path: "b2a.mp4".to_string(),
            target_fps: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub process_noise: f64,
    pub measurement_noise: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
            measurement_noise: 0.1,
        }
    }
}

/// Farneback dense optical flow parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub pyr_scale: f64,
    pub levels: i32,
    pub winsize: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
    pub gaussian_window: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 5,
            winsize: 25,
            iterations: 10,
            poly_n: 7,
            poly_sigma: 1.5,
            gaussian_window: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub working_width: i32,
    pub working_height: i32,
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    pub hough_threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    /// Segments narrower than this (px) are treated as vertical
    pub min_dx: f64,
    /// Segments steeper than this (degrees) are not horizon candidates
    pub max_abs_angle: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            working_width: 640,
            working_height: 480,
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 100,
            min_line_length: 100.0,
            max_line_gap: 10.0,
            min_dx: 20.0,
            max_abs_angle: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub report_path: String,
    /// Optional JSON-lines mirror of the text report
    pub jsonl_path: Option<String>,
    pub locale: ReportLocale,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "trajectory_report.txt".to_string(),
            jsonl_path: None,
            locale: ReportLocale::En,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Language of the text report. `Ru` reproduces the layout of the
/// recorded field logs byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLocale {
    #[default]
    En,
    Ru,
}

impl ReportLocale {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLocale::En => "en",
            ReportLocale::Ru => "ru",
        }
    }
}

impl FromStr for ReportLocale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(ReportLocale::En),
            "ru" => Ok(ReportLocale::Ru),
            other => bail!("unknown report locale '{}' (expected 'en' or 'ru')", other),
        }
    }
}

impl fmt::Display for ReportLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FRAMES
// ============================================================================

/// Decoded video frame, packed 8-bit BGR, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Uniform frame, handy for synthetic streams
    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(width * height * Self::CHANNELS)
            .collect();
        Self::new(data, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Reject frames whose buffer does not match their geometry
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            bail!("empty frame ({}x{})", self.width, self.height);
        }
        let expected = self.width * self.height * Self::CHANNELS;
        if self.data.len() != expected {
            bail!(
                "malformed frame: {}x{} needs {} bytes, got {}",
                self.width,
                self.height,
                expected,
                self.data.len()
            );
        }
        Ok(())
    }

    /// Rotate by 180°: pixel (x, y) moves to (w-1-x, h-1-y).
    pub fn rotated_180(&self) -> Frame {
        let mut data = Vec::with_capacity(self.data.len());
        for pixel in self.data.chunks_exact(Self::CHANNELS).rev() {
            data.extend_from_slice(pixel);
        }
        Frame::new(data, self.width, self.height)
    }
}
