// src/preprocessing.rs

use crate::types::{Frame, TensorLayout};
use anyhow::Result;

/// ImageNet channel means of the caffe-style VGG weights (B, G, R)
const CAFFE_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Preprocess a BGR frame for the VGG16 embedding network.
///
/// Follows the Keras "caffe" contract: the channel order is reversed and
/// the per-channel ImageNet mean is subtracted, no scaling to [0, 1].
pub fn preprocess_caffe(
    frame: &Frame,
    dst_width: usize,
    dst_height: usize,
    layout: TensorLayout,
) -> Result<Vec<f32>> {
    frame.validate()?;

    let resized = resize_bilinear(
        &frame.data,
        frame.width,
        frame.height,
        dst_width,
        dst_height,
    );

    let plane = dst_width * dst_height;
    let mut output = vec![0.0f32; 3 * plane];

    for h in 0..dst_height {
        for w in 0..dst_width {
            let pixel = h * dst_width + w;
            for c in 0..3 {
                let value = resized[pixel * 3 + (2 - c)] as f32 - CAFFE_MEAN[c];
                let idx = match layout {
                    TensorLayout::Nhwc => pixel * 3 + c,
                    TensorLayout::Nchw => c * plane + pixel,
                };
                output[idx] = value;
            }
        }
    }

    Ok(output)
}

/// Bilinear resize of packed 3-channel pixels using pixel-center
/// alignment, the same sampling grid as OpenCV's `INTER_LINEAR`.
pub fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];

    if src_w == dst_w && src_h == dst_h {
        let n = dst.len();
        dst.copy_from_slice(&src[..n]);
        return dst;
    }

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        let sy = ((dy as f32 + 0.5) * y_ratio - 0.5).max(0.0);
        let sy0 = (sy.floor() as usize).min(src_h - 1);
        let sy1 = (sy0 + 1).min(src_h - 1);
        let fy = sy - sy0 as f32;

        for dx in 0..dst_w {
            let sx = ((dx as f32 + 0.5) * x_ratio - 0.5).max(0.0);
            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let fx = sx - sx0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}
