//! The classification demo: load once, then select, classify and explain.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use mechcam_core::{CamError, ClassLabels, FrameFile, Preprocess, Result, RgbFrame};
use mechcam_explain::{overlay, GradCam, Heatmap};
use mechcam_models::{load_classifier, CamClassifier, ResNet};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::DemoConfig;
use crate::CamBackend;

/// Classifier type served by the demo.
pub type Classifier = ResNet<CamBackend>;

/// Extensions recognised as sample frames.
pub const SAMPLE_EXTENSIONS: [&str; 1] = ["json"];

/// Predicted class of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPrediction {
    /// Index of the predicted class.
    pub class_index: usize,
    /// Name of the predicted class.
    pub label: String,
    /// Raw class scores.
    pub scores: Vec<f32>,
}

/// Outcome of [`Demo::analyze`].
///
/// When no model is loaded or the request fails, `prediction`, `heatmap`
/// and `overlay` are `None` and `message` says why.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Analysis {
    /// The predicted class.
    pub prediction: Option<ClassPrediction>,
    /// Grad-CAM heatmap for the predicted class.
    pub heatmap: Option<Heatmap>,
    /// Heatmap blended over the resized frame.
    pub overlay: Option<RgbFrame>,
    /// Human-readable explanation of a missing result.
    pub message: Option<String>,
}

/// Serializable form of an [`Analysis`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// The predicted class.
    pub prediction: Option<ClassPrediction>,
    /// Grad-CAM heatmap for the predicted class.
    pub heatmap: Option<Heatmap>,
    /// Heatmap blended over the resized frame.
    pub overlay: Option<FrameFile>,
    /// Human-readable explanation of a missing result.
    pub message: Option<String>,
}

impl Analysis {
    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Whether a prediction was produced.
    pub fn is_complete(&self) -> bool {
        self.prediction.is_some()
    }

    /// Serializable report.
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            prediction: self.prediction.clone(),
            heatmap: self.heatmap.clone(),
            overlay: self.overlay.as_ref().map(RgbFrame::to_file),
            message: self.message.clone(),
        }
    }
}

/// Sample frames found in the sample directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Samples {
    /// File names, sorted.
    pub names: Vec<String>,
    /// Set when the directory is missing or empty.
    pub message: Option<String>,
}

impl Samples {
    /// List the sample frames in `dir`, sorted by name.
    ///
    /// A missing or empty directory yields no names and a message.
    pub fn scan(dir: &Path) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("Cannot read sample folder {:?}: {}", dir, err);
                return Self {
                    names: Vec::new(),
                    message: Some(format!("Folder '{}' not found.", dir.display())),
                };
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_sample(path))
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();

        let message = names
            .is_empty()
            .then(|| "No sample images found.".to_string());
        Self { names, message }
    }
}

/// The interactive demo state.
///
/// Holds the explainer behind a mutex so concurrent requests against the one
/// classifier are serialized.
pub struct Demo {
    config: DemoConfig,
    preprocess: Preprocess,
    labels: ClassLabels,
    explainer: Option<Mutex<GradCam<CamBackend, Classifier>>>,
    status: Option<String>,
    device: <CamBackend as Backend>::Device,
}

impl Demo {
    /// Build the demo, loading the classifier from the configured checkpoint.
    ///
    /// A missing or incompatible checkpoint, or one that does not fit the
    /// configured preprocessing or target layer, does not fail: the demo runs
    /// without a model and [`Demo::status`] reports why.
    ///
    /// # Errors
    ///
    /// Fails only on an invalid preprocessing configuration.
    pub fn load(config: DemoConfig) -> Result<Self> {
        let device = <CamBackend as Backend>::Device::default();
        let mut demo = Self::without_model(config, device)?;

        match load_classifier::<CamBackend>(&demo.config.checkpoint, &demo.config.model, &demo.device) {
            Ok((model, metadata)) => {
                if let Err(err) = demo.attach(model, metadata.class_names) {
                    tracing::warn!("Running without a model: {}", err);
                    demo.status = Some(err.to_string());
                }
            }
            Err(err) => {
                tracing::warn!("Running without a model: {}", err);
                demo.status = Some(err.to_string());
            }
        }

        Ok(demo)
    }

    /// Build the demo around an in-memory classifier.
    ///
    /// # Errors
    ///
    /// Fails on an invalid preprocessing configuration or an unknown target
    /// layer.
    pub fn from_model(model: Classifier, config: DemoConfig) -> Result<Self> {
        let device = <CamBackend as Backend>::Device::default();
        let mut demo = Self::without_model(config, device)?;
        demo.attach(model, None)?;
        Ok(demo)
    }

    fn without_model(config: DemoConfig, device: <CamBackend as Backend>::Device) -> Result<Self> {
        let preprocess = config.preprocess.init()?;
        Ok(Self {
            labels: config.class_names.clone(),
            preprocess,
            config,
            explainer: None,
            status: None,
            device,
        })
    }

    /// Install `model`, adopting `labels` only if the model is accepted.
    fn attach(&mut self, model: Classifier, labels: Option<ClassLabels>) -> Result<()> {
        let input = model.input_shape();
        if input != self.preprocess.output_shape() {
            return Err(CamError::shape(self.preprocess.output_shape(), input));
        }
        let explainer = GradCam::from_config(model, self.config.grad_cam.clone())?;

        if let Some(labels) = labels {
            self.labels = labels;
        }
        if explainer.model().n_classes() != self.labels.len() {
            tracing::warn!(
                "Model has {} classes but {} labels are configured",
                explainer.model().n_classes(),
                self.labels.len()
            );
        }
        tracing::info!("Explaining layer '{}'", explainer.target_layer());
        self.explainer = Some(Mutex::new(explainer));
        self.status = None;
        Ok(())
    }

    /// The configuration in use.
    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// Whether a classifier is loaded.
    pub fn has_model(&self) -> bool {
        self.explainer.is_some()
    }

    /// Why no classifier is loaded, if so.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Class labels in use.
    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// Name of class `index`.
    pub fn class_label(&self, index: usize) -> String {
        self.labels.label(index)
    }

    /// List sample frames in the sample directory.
    pub fn list_samples(&self) -> Samples {
        Samples::scan(&self.config.sample_dir)
    }

    /// Read the sample frame `name`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or malformed frame files.
    pub fn load_sample(&self, name: &str) -> Result<RgbFrame> {
        RgbFrame::load(self.config.sample_dir.join(name))
    }

    /// The requested sample if it exists, otherwise the first one.
    ///
    /// Returns `None` when there are no samples.
    ///
    /// # Errors
    ///
    /// Fails if the chosen frame cannot be read.
    pub fn select_sample(&self, selected: Option<&str>) -> Result<Option<(String, RgbFrame)>> {
        let samples = self.list_samples();
        let name = selected
            .filter(|s| samples.names.iter().any(|n| n == s))
            .map(str::to_string)
            .or_else(|| samples.names.first().cloned());
        match name {
            Some(name) => {
                let frame = self.load_sample(&name)?;
                Ok(Some((name, frame)))
            }
            None => Ok(None),
        }
    }

    /// Classify `frame` without computing a heatmap.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::ModelUnavailable`] when no model is loaded.
    pub fn predict(&self, frame: &RgbFrame) -> Result<ClassPrediction> {
        let Some(explainer) = &self.explainer else {
            return Err(CamError::ModelUnavailable {
                path: self.config.checkpoint.clone(),
                reason: self.status.clone().unwrap_or_else(|| "no model loaded".to_string()),
            });
        };
        type Inner = <CamBackend as AutodiffBackend>::InnerBackend;
        let input = self.preprocess.to_tensor::<Inner>(frame, &self.device);
        let prediction = explainer.lock().predict(input)?;
        Ok(ClassPrediction {
            label: self.class_label(prediction.class_index),
            class_index: prediction.class_index,
            scores: prediction.scores,
        })
    }

    /// Classify `frame` and explain the predicted class.
    pub fn analyze(&self, frame: &RgbFrame) -> Analysis {
        self.analyze_class(frame, None)
    }

    /// Classify `frame` and explain `target_class`, or the predicted class.
    ///
    /// Never fails: errors become an [`Analysis`] without results.
    pub fn analyze_class(&self, frame: &RgbFrame, target_class: Option<usize>) -> Analysis {
        let Some(explainer) = &self.explainer else {
            let reason = self.status.as_deref().unwrap_or("no model loaded");
            return Analysis::unavailable(format!("Model unavailable: {}", reason));
        };

        match self.run(explainer, frame, target_class) {
            Ok(analysis) => analysis,
            Err(err) => {
                tracing::warn!("Analysis failed: {}", err);
                Analysis::unavailable(err.to_string())
            }
        }
    }

    fn run(
        &self,
        explainer: &Mutex<GradCam<CamBackend, Classifier>>,
        frame: &RgbFrame,
        target_class: Option<usize>,
    ) -> Result<Analysis> {
        let input = self.preprocess.to_tensor::<CamBackend>(frame, &self.device);
        let explanation = explainer.lock().explain(input, target_class)?;

        let class_index = explanation.class_index;
        let label = self.class_label(class_index);
        tracing::info!("Predicted class: {} ({})", label, class_index);

        let display = self.preprocess.display_frame(frame);
        let composite = overlay(&display, &explanation.heatmap, &self.config.overlay)?;

        Ok(Analysis {
            prediction: Some(ClassPrediction {
                class_index,
                label,
                scores: explanation.scores,
            }),
            heatmap: Some(explanation.heatmap),
            overlay: Some(composite),
            message: None,
        })
    }
}

fn is_sample(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SAMPLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
