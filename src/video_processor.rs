// src/video_processor.rs
//
// Video stream boundary. The pipeline only sees `FrameSource`s handed out
// by a `StreamOpener`; the OpenCV-backed implementation lives behind the
// `opencv` feature.

use crate::types::Frame;
use anyhow::Result;
use std::path::Path;

/// Sequential reader over decoded frames
pub trait FrameSource {
    /// Native frame rate reported by the container
    fn fps(&self) -> f64;

    /// Next frame, or `None` once the stream is exhausted
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

pub trait StreamOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}

/// Process every `interval`-th native frame so that roughly
/// `target_fps` frames per second are analysed.
pub fn sampling_interval(native_fps: f64, target_fps: f64) -> u64 {
    let ratio = (native_fps / target_fps).round();
    if ratio.is_finite() && ratio >= 1.0 {
        ratio as u64
    } else {
        1
    }
}

#[cfg(feature = "opencv")]
pub use backend::{frame_to_mat, VideoProcessor, VideoReader};

#[cfg(feature = "opencv")]
mod backend {
    use super::{FrameSource, StreamOpener};
    use crate::types::Frame;
    use anyhow::{bail, Context, Result};
    use opencv::{
        core::Mat,
        prelude::*,
        videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
    };
    use std::path::Path;
    use tracing::{debug, info};

    /// Opens route videos with OpenCV's `VideoCapture`
    #[derive(Debug, Default, Clone, Copy)]
    pub struct VideoProcessor;

    impl VideoProcessor {
        pub fn new() -> Self {
            Self
        }

        pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
            info!("Opening video: {}", path.display());

            let path_str = path
                .to_str()
                .with_context(|| format!("Non UTF-8 video path: {}", path.display()))?;
            let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

            if !cap.is_opened()? {
                bail!("Failed to open video file");
            }

            let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
            let total_frames =
                VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i64;
            let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
            let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

            info!(
                "Video properties: {}x{} @ {:.1} FPS, {} frames",
                width, height, fps, total_frames
            );

            Ok(VideoReader {
                cap,
                fps,
                total_frames,
                current_frame: 0,
            })
        }
    }

    impl StreamOpener for VideoProcessor {
        fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(self.open_video(path)?))
        }
    }

    pub struct VideoReader {
        cap: VideoCapture,
        pub fps: f64,
        pub total_frames: i64,
        pub current_frame: i64,
    }

    impl VideoReader {
        pub fn progress(&self) -> f32 {
            if self.total_frames <= 0 {
                return 0.0;
            }
            (self.current_frame as f32 / self.total_frames as f32) * 100.0
        }
    }

    impl FrameSource for VideoReader {
        fn fps(&self) -> f64 {
            self.fps
        }

        fn read_frame(&mut self) -> Result<Option<Frame>> {
            let mut mat = Mat::default();

            if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
                return Ok(None);
            }
            self.current_frame += 1;
            if self.current_frame % 300 == 0 {
                debug!("Decoding progress: {:.1}%", self.progress());
            }

            // Decoded frames are BGR; keep that order throughout the pipeline
            let mat = if mat.is_continuous() {
                mat
            } else {
                mat.try_clone()?
            };
            let data = mat.data_bytes()?.to_vec();

            Ok(Some(Frame::new(data, mat.cols() as usize, mat.rows() as usize)))
        }
    }

    impl Drop for VideoReader {
        fn drop(&mut self) {
            let _ = VideoCaptureTrait::release(&mut self.cap);
        }
    }

    /// Owned 8UC3 `Mat` view of a BGR frame
    pub fn frame_to_mat(frame: &Frame) -> Result<Mat> {
        frame.validate()?;
        let flat = Mat::from_slice(&frame.data)?;
        let mat = flat.reshape(3, frame.height as i32)?;
        Ok(mat.try_clone()?)
    }
}
