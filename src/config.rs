use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    /// Runs before logging is set up, so the caller reports the fallback.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.video.target_fps.is_finite() && self.video.target_fps > 0.0) {
            bail!("video.target_fps must be positive, got {}", self.video.target_fps);
        }
        if self.smoothing.process_noise < 0.0 {
            bail!(
                "smoothing.process_noise must be non-negative, got {}",
                self.smoothing.process_noise
            );
        }
        if self.smoothing.measurement_noise <= 0.0 {
            bail!(
                "smoothing.measurement_noise must be positive, got {}",
                self.smoothing.measurement_noise
            );
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            bail!("model input size must be non-zero");
        }
        if self.horizon.working_width <= 0 || self.horizon.working_height <= 0 {
            bail!("horizon working resolution must be positive");
        }
        if self.horizon.blur_kernel <= 0 || self.horizon.blur_kernel % 2 == 0 {
            bail!(
                "horizon.blur_kernel must be a positive odd number, got {}",
                self.horizon.blur_kernel
            );
        }
        if self.output.report_path.trim().is_empty() {
            bail!("output.report_path must not be empty");
        }
        Ok(())
    }
}
