//! Demo configuration.

use std::path::{Path, PathBuf};

use mechcam_core::{ClassLabels, PreprocessConfig, Result};
use mechcam_explain::{GradCamConfig, OverlayConfig};
use mechcam_models::ResNetConfig;
use serde::{Deserialize, Serialize};

/// Settings of the classification demo.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
///
/// # Example
///
/// ```rust
/// use mechcam::DemoConfig;
///
/// let config: DemoConfig = serde_json::from_str(r#"{"sample_dir": "parts"}"#).unwrap();
/// assert_eq!(config.sample_dir.to_str(), Some("parts"));
/// assert_eq!(config.grad_cam.target_layer, "layer4");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Checkpoint directory (`model.mpk` + `config.json`).
    pub checkpoint: PathBuf,
    /// Directory of JSON sample frames.
    pub sample_dir: PathBuf,
    /// Class names, index-aligned with the model outputs.
    pub class_names: ClassLabels,
    /// Architecture used when the checkpoint has no metadata.
    pub model: ResNetConfig,
    /// Input preprocessing.
    pub preprocess: PreprocessConfig,
    /// Explainer settings.
    pub grad_cam: GradCamConfig,
    /// Heatmap overlay settings.
    pub overlay: OverlayConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        let class_names = ClassLabels::mechanical_components();
        let model = ResNetConfig::resnet50(class_names.len());
        Self {
            checkpoint: PathBuf::from("checkpoints/resnet50_gradcam"),
            sample_dir: PathBuf::from("sample_dir"),
            preprocess: PreprocessConfig::new(model.image_size),
            class_names,
            model,
            grad_cam: GradCamConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl DemoConfig {
    /// Set the checkpoint directory.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: impl Into<PathBuf>) -> Self {
        self.checkpoint = checkpoint.into();
        self
    }

    /// Set the sample directory.
    #[must_use]
    pub fn with_sample_dir(mut self, sample_dir: impl Into<PathBuf>) -> Self {
        self.sample_dir = sample_dir.into();
        self
    }

    /// Set the fallback architecture; the input size follows it.
    #[must_use]
    pub fn with_model(mut self, model: ResNetConfig) -> Self {
        self.preprocess.image_size = model.image_size;
        self.model = model;
        self
    }

    /// Set the explained layer.
    #[must_use]
    pub fn with_target_layer(mut self, layer: impl Into<String>) -> Self {
        self.grad_cam.target_layer = layer.into();
        self
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DemoConfig::default();
        assert_eq!(config.class_names.len(), 4);
        assert_eq!(config.model.n_classes, 4);
        assert_eq!(config.preprocess.image_size, 224);
        assert_eq!(config.overlay.alpha, 0.5);
    }

    #[test]
    fn test_with_model_updates_input_size() {
        let config = DemoConfig::default().with_model(ResNetConfig::tiny(4, 64));
        assert_eq!(config.preprocess.image_size, 64);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        let config = DemoConfig::default()
            .with_sample_dir("parts")
            .with_target_layer("layer3");
        config.save(&path).unwrap();
        assert_eq!(DemoConfig::load(&path).unwrap(), config);
    }
}
