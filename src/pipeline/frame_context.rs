// src/pipeline/frame_context.rs
//
// One sampled instant of the route: the forward frame and the reverse
// frame re-oriented to face the same way. Every analyzer in an iteration
// reads from the same pair.

use crate::types::Frame;

#[derive(Debug, Clone)]
pub struct FramePair {
    /// Native frame index on the forward stream
    pub index: u64,
    /// Seconds since the start of the forward stream
    pub timestamp: f64,
    pub frame_a: Frame,
    /// Reverse frame, already rotated 180°
    pub frame_b: Frame,
}

impl FramePair {
    /// Pair raw frames read at `index`; rotates the reverse frame.
    pub fn new(index: u64, native_fps: f64, frame_a: Frame, raw_b: &Frame) -> Self {
        Self {
            index,
            timestamp: index as f64 / native_fps,
            frame_a,
            frame_b: raw_b.rotated_180(),
        }
    }
}
