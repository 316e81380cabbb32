//! ResNet image classifier with bottleneck blocks.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use mechcam_core::ImageShape;
use serde::{Deserialize, Serialize};

use crate::norm::FrozenBatchNorm;
use crate::observer::{LayerObserver, Passthrough};
use crate::traits::CamClassifier;

/// Names of the observable stages, in forward order.
pub const RESNET_STAGES: [&str; 5] = ["stem", "layer1", "layer2", "layer3", "layer4"];

/// Output channels of a bottleneck relative to its inner width.
pub const BOTTLENECK_EXPANSION: usize = 4;

/// Configuration for [`ResNet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResNetConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Side length of the square input image.
    pub image_size: usize,
    /// Number of input channels.
    pub in_channels: usize,
    /// Bottleneck blocks per stage.
    pub layers: [usize; 4],
    /// Stem width; stage `i` uses `base_width * 2^i` inner channels.
    pub base_width: usize,
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self::resnet50(4)
    }
}

impl ResNetConfig {
    /// ResNet-50 layout: `[3, 4, 6, 3]` blocks, width 64, 224x224 RGB input.
    pub fn resnet50(n_classes: usize) -> Self {
        Self {
            n_classes,
            image_size: 224,
            in_channels: 3,
            layers: [3, 4, 6, 3],
            base_width: 64,
        }
    }

    /// One narrow block per stage; cheap enough for CPU tests.
    pub fn tiny(n_classes: usize, image_size: usize) -> Self {
        Self {
            n_classes,
            image_size,
            in_channels: 3,
            layers: [1, 1, 1, 1],
            base_width: 4,
        }
    }

    /// Set the input image size.
    #[must_use]
    pub fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = image_size;
        self
    }

    /// Set the blocks per stage.
    #[must_use]
    pub fn with_layers(mut self, layers: [usize; 4]) -> Self {
        self.layers = layers;
        self
    }

    /// Set the stem width.
    #[must_use]
    pub fn with_base_width(mut self, base_width: usize) -> Self {
        self.base_width = base_width;
        self
    }

    /// Expected input shape.
    pub fn input_shape(&self) -> ImageShape {
        ImageShape::new(self.in_channels, self.image_size, self.image_size)
    }

    /// Spatial side length of a stage's output, or `None` for unknown stages.
    ///
    /// The stem halves twice (strided conv, max pool); every stage after
    /// `layer1` halves once more.
    pub fn feature_size(&self, layer: &str) -> Option<usize> {
        let halvings = match layer {
            "stem" | "layer1" => 2,
            "layer2" => 3,
            "layer3" => 4,
            "layer4" => 5,
            _ => return None,
        };
        Some((0..halvings).fold(self.image_size, |size, _| halve(size)))
    }

    /// Channels of a stage's output, or `None` for unknown stages.
    pub fn feature_channels(&self, layer: &str) -> Option<usize> {
        let stage = match layer {
            "stem" => return Some(self.base_width),
            "layer1" => 0,
            "layer2" => 1,
            "layer3" => 2,
            "layer4" => 3,
            _ => return None,
        };
        Some(self.base_width * (1 << stage) * BOTTLENECK_EXPANSION)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        ResNet::new(self.clone(), device)
    }
}

/// Output length of a stride-2 window with "same"-style padding.
fn halve(size: usize) -> usize {
    size.saturating_sub(1) / 2 + 1
}

fn conv<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    let pad = kernel / 2;
    Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(pad, pad))
        .with_bias(false)
        .init(device)
}

/// 7x7 strided convolution, normalization, ReLU and 3x3 max pool.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm<B>,
    pool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    /// Create a new stem.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: conv(in_channels, out_channels, 7, 2, device),
            bn: FrozenBatchNorm::new(out_channels, device),
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.bn.forward(self.conv.forward(x));
        self.pool.forward(Relu::new().forward(out))
    }
}

/// Projection shortcut used when a block changes shape.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm<B>,
}

/// Bottleneck residual block: 1x1 reduce, 3x3 (strided), 1x1 expand.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm<B>,
    conv3: Conv2d<B>,
    bn3: FrozenBatchNorm<B>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    /// Create a new bottleneck block.
    pub fn new(in_channels: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let out_channels = width * BOTTLENECK_EXPANSION;

        // Shortcut projection if the shape changes
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample {
                conv: conv(in_channels, out_channels, 1, stride, device),
                bn: FrozenBatchNorm::new(out_channels, device),
            })
        } else {
            None
        };

        Self {
            conv1: conv(in_channels, width, 1, 1, device),
            bn1: FrozenBatchNorm::new(width, device),
            conv2: conv(width, width, 3, stride, device),
            bn2: FrozenBatchNorm::new(width, device),
            conv3: conv(width, out_channels, 1, 1, device),
            bn3: FrozenBatchNorm::new(out_channels, device),
            downsample,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let relu = Relu::new();

        let out = self.conv1.forward(x.clone());
        let out = relu.forward(self.bn1.forward(out));

        let out = self.conv2.forward(out);
        let out = relu.forward(self.bn2.forward(out));

        let out = self.bn3.forward(self.conv3.forward(out));

        let shortcut = match &self.downsample {
            Some(ds) => ds.bn.forward(ds.conv.forward(x)),
            None => x,
        };

        relu.forward(out + shortcut)
    }
}

/// ResNet classifier with four observable bottleneck stages.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    stem: Stem<B>,
    layer1: Vec<Bottleneck<B>>,
    layer2: Vec<Bottleneck<B>>,
    layer3: Vec<Bottleneck<B>>,
    layer4: Vec<Bottleneck<B>>,
    gap: AdaptiveAvgPool2d,
    fc: Linear<B>,
    in_channels: usize,
    image_size: usize,
    n_classes: usize,
}

impl<B: Backend> ResNet<B> {
    /// Create a new ResNet.
    pub fn new(config: ResNetConfig, device: &B::Device) -> Self {
        let stem = Stem::new(config.in_channels, config.base_width, device);

        let mut in_channels = config.base_width;
        let mut stages: Vec<Vec<Bottleneck<B>>> = Vec::with_capacity(4);
        for (stage, &n_blocks) in config.layers.iter().enumerate() {
            let width = config.base_width << stage;
            let stride = if stage == 0 { 1 } else { 2 };
            let mut blocks = Vec::with_capacity(n_blocks);
            for block in 0..n_blocks {
                let block_stride = if block == 0 { stride } else { 1 };
                blocks.push(Bottleneck::new(in_channels, width, block_stride, device));
                in_channels = width * BOTTLENECK_EXPANSION;
            }
            stages.push(blocks);
        }

        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(in_channels, config.n_classes).init(device);

        let mut stages = stages.into_iter();
        Self {
            stem,
            layer1: stages.next().unwrap_or_default(),
            layer2: stages.next().unwrap_or_default(),
            layer3: stages.next().unwrap_or_default(),
            layer4: stages.next().unwrap_or_default(),
            gap,
            fc,
            in_channels: config.in_channels,
            image_size: config.image_size,
            n_classes: config.n_classes,
        }
    }

    /// Forward pass returning logits of shape `(batch, n_classes)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_observed(x, &mut Passthrough)
    }

    /// Forward pass reporting every stage output to `observer`.
    pub fn forward_observed(
        &self,
        x: Tensor<B, 4>,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2> {
        let mut out = observer.observe("stem", self.stem.forward(x));

        let stages = [
            ("layer1", &self.layer1),
            ("layer2", &self.layer2),
            ("layer3", &self.layer3),
            ("layer4", &self.layer4),
        ];
        for (name, blocks) in stages {
            for block in blocks {
                out = block.forward(out);
            }
            out = observer.observe(name, out);
        }

        let out = self.gap.forward(out);
        let [batch, channels, _, _] = out.dims();
        self.fc.forward(out.reshape([batch, channels]))
    }
}

/// Describe how `record` deviates from the layout of `config`, if it does.
///
/// Loading a record into a module with a different number of blocks panics
/// inside Burn, so checkpoints are checked against the architecture first.
pub(crate) fn record_mismatch<B: Backend>(
    config: &ResNetConfig,
    record: &ResNetRecord<B>,
) -> Option<String> {
    let stages = [
        &record.layer1,
        &record.layer2,
        &record.layer3,
        &record.layer4,
    ];
    for (stage, (blocks, &expected)) in stages.iter().zip(&config.layers).enumerate() {
        if blocks.len() != expected {
            return Some(format!(
                "layer{} has {} blocks in the checkpoint but {} in the architecture",
                stage + 1,
                blocks.len(),
                expected
            ));
        }
    }

    let stem = record.stem.conv.weight.val().dims();
    let expected_stem = [config.base_width, config.in_channels, 7, 7];
    if stem != expected_stem {
        return Some(format!(
            "stem convolution is {:?} in the checkpoint but {:?} in the architecture",
            stem, expected_stem
        ));
    }

    let head = record.fc.weight.val().dims();
    let features = config.feature_channels("layer4").unwrap_or_default();
    if head != [features, config.n_classes] {
        return Some(format!(
            "classifier head is {:?} in the checkpoint but {:?} in the architecture",
            head,
            [features, config.n_classes]
        ));
    }
    None
}

impl<B: Backend> CamClassifier<B> for ResNet<B> {
    fn forward_observed(
        &self,
        x: Tensor<B, 4>,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2> {
        ResNet::forward_observed(self, x, observer)
    }

    fn input_shape(&self) -> ImageShape {
        ImageShape::new(self.in_channels, self.image_size, self.image_size)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn observable_layers(&self) -> &'static [&'static str] {
        &RESNET_STAGES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ShapeRecorder;
    use mechcam_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_resnet50_config() {
        let config = ResNetConfig::resnet50(4);
        assert_eq!(config.layers, [3, 4, 6, 3]);
        assert_eq!(config.base_width, 64);
        assert_eq!(config.feature_channels("layer4"), Some(2048));
        assert_eq!(config.feature_size("layer4"), Some(7));
        assert_eq!(config.feature_size("stem"), Some(56));
        assert_eq!(config.feature_size("fc"), None);
    }

    #[test]
    fn test_config_serde() {
        let config = ResNetConfig::tiny(4, 64);
        let json = serde_json::to_string(&config).unwrap();
        let decoded: ResNetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let config = ResNetConfig::tiny(4, 32);
        let model = config.init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let logits = model.forward(x);
        assert_eq!(logits.dims(), [2, 4]);
    }

    #[test]
    fn test_stage_shapes_match_config() {
        let device = Default::default();
        let config = ResNetConfig::tiny(4, 64);
        let model = config.init::<TestBackend>(&device);
        let mut recorder = ShapeRecorder::new();

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        let _ = model.forward_observed(x, &mut recorder);

        let names: Vec<&str> = recorder.shapes().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, RESNET_STAGES.to_vec());
        for layer in RESNET_STAGES {
            let size = config.feature_size(layer).unwrap();
            let channels = config.feature_channels(layer).unwrap();
            assert_eq!(recorder.get(layer), Some([1, channels, size, size]), "{layer}");
        }
    }

    #[test]
    fn test_cam_classifier_metadata() {
        let device = Default::default();
        let model = ResNetConfig::tiny(4, 48).init::<TestBackend>(&device);
        assert_eq!(model.input_shape(), ImageShape::rgb(48));
        assert_eq!(CamClassifier::n_classes(&model), 4);
        assert!(model.observable_layers().contains(&"layer4"));
    }

    #[test]
    fn test_record_layout_check() {
        let device = Default::default();
        let config = ResNetConfig::tiny(4, 32);
        let record = config.init::<TestBackend>(&device).into_record();
        assert_eq!(record_mismatch(&config, &record), None);

        let deeper = config.clone().with_layers([1, 1, 1, 2]);
        let reason = record_mismatch(&deeper, &record).unwrap();
        assert!(reason.starts_with("layer4 has 1 blocks"), "{reason}");

        let wider = config.with_base_width(8);
        let reason = record_mismatch(&wider, &record).unwrap();
        assert!(reason.starts_with("stem convolution"), "{reason}");
    }
}
