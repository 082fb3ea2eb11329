// src/embedding.rs
//
// Visual similarity between paired frames. A pretrained CNN turns each
// frame into a feature vector; the cosine of the two vectors, scaled to a
// percentage, is the similarity score fed to the correction synthesizer.

use crate::types::Frame;
use anyhow::{bail, Context, Result};
use tracing::debug;

/// Image → fixed-length feature vector
pub trait Embedder {
    fn embed(&mut self, frame: &Frame) -> Result<Vec<f32>>;
}

/// Cosine similarity of two feature vectors.
///
/// A zero-norm vector yields 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        bail!(
            "feature vectors differ in length: {} vs {}",
            a.len(),
            b.len()
        );
    }
    if a.is_empty() {
        bail!("empty feature vector");
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !similarity.is_finite() {
        bail!("non-finite cosine similarity");
    }
    Ok(similarity)
}

pub struct SimilarityScorer {
    embedder: Box<dyn Embedder>,
}

impl SimilarityScorer {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Similarity of two frames as a percentage.
    ///
    /// Not clamped: the value may sit slightly outside [0, 100].
    pub fn score(&mut self, frame_a: &Frame, frame_b: &Frame) -> Result<f64> {
        let features_a = self
            .embedder
            .embed(frame_a)
            .context("embedding forward frame")?;
        let features_b = self
            .embedder
            .embed(frame_b)
            .context("embedding reverse frame")?;

        let similarity = cosine_similarity(&features_a, &features_b)? * 100.0;
        debug!(
            "Similarity {:.2}% over {} features",
            similarity,
            features_a.len()
        );
        Ok(similarity)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

#[cfg(feature = "onnx")]
mod onnx {
    use super::Embedder;
    use crate::preprocessing::preprocess_caffe;
    use crate::types::{Frame, ModelConfig, TensorLayout};
    use anyhow::{Context, Result};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use tracing::info;

    /// VGG16 (`block5_pool`, flattened) on ONNX Runtime
    pub struct OnnxEmbedder {
        session: Session,
        config: ModelConfig,
    }

    impl OnnxEmbedder {
        pub fn new(config: ModelConfig) -> Result<Self> {
            info!("Loading embedding model: {}", config.path);

            #[allow(unused_mut)]
            let mut builder = Session::builder()?;

            #[cfg(feature = "cuda")]
            if config.use_cuda {
                use ort::execution_providers::CUDAExecutionProvider;
                info!("Enabling CUDA execution provider");
                builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()])?;
            }

            let session = builder
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(config.num_threads)?
                .with_inter_threads(1)?
                .commit_from_file(&config.path)
                .context("Failed to load embedding model")?;

            info!("✓ Embedding model ready");
            Ok(Self { session, config })
        }

        fn input_shape(&self) -> [usize; 4] {
            let (h, w) = (self.config.input_height, self.config.input_width);
            match self.config.layout {
                TensorLayout::Nhwc => [1, h, w, 3],
                TensorLayout::Nchw => [1, 3, h, w],
            }
        }
    }

    impl Embedder for OnnxEmbedder {
        fn embed(&mut self, frame: &Frame) -> Result<Vec<f32>> {
            let input = preprocess_caffe(
                frame,
                self.config.input_width,
                self.config.input_height,
                self.config.layout,
            )?;

            let shape = self.input_shape();
            let input_value =
                ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

            let outputs = self
                .session
                .run(ort::inputs![self.config.input_name.as_str() => input_value])?;

            let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
            Ok(data.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Mean colour per channel, enough to tell frames apart in tests
    struct ChannelMeans;

    impl Embedder for ChannelMeans {
        fn embed(&mut self, frame: &Frame) -> Result<Vec<f32>> {
            frame.validate()?;
            let mut sums = [0.0f32; 3];
            for px in frame.data.chunks_exact(3) {
                for c in 0..3 {
                    sums[c] += px[c] as f32;
                }
            }
            let n = (frame.width * frame.height) as f32;
            Ok(sums.iter().map(|s| s / n).collect())
        }
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert_abs_diff_eq!(
            cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap(),
            1.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            cosine_similarity(&[1.0, 0.0], &[0.0, 5.0]).unwrap(),
            0.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]).unwrap(),
            -1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
        assert!(cosine_similarity(&[], &[]).is_err());
    }

    #[test]
    fn test_scorer_percentage() {
        let mut scorer = SimilarityScorer::new(Box::new(ChannelMeans));
        let a = Frame::filled(8, 8, [10, 20, 30]);
        let b = Frame::filled(8, 8, [20, 40, 60]);
        assert_abs_diff_eq!(scorer.score(&a, &b).unwrap(), 100.0, epsilon = 1e-9);

        let c = Frame::filled(8, 8, [255, 0, 0]);
        let d = Frame::filled(8, 8, [0, 0, 255]);
        assert_abs_diff_eq!(scorer.score(&c, &d).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scorer_propagates_embedding_failure() {
        let mut scorer = SimilarityScorer::new(Box::new(ChannelMeans));
        let good = Frame::filled(4, 4, [1, 1, 1]);
        let bad = Frame::new(vec![1, 2], 4, 4);
        assert!(scorer.score(&good, &bad).is_err());
    }
}
