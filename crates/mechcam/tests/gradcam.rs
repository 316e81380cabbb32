//! Grad-CAM on the ResNet classifier.

mod common;

use burn::module::AutodiffModule;
use burn::prelude::*;
use mechcam::models::RESNET_STAGES;
use mechcam::prelude::*;

use common::{random_frame, square_frame, tiny_model};

fn assert_unit_range(heatmap: &Heatmap) {
    for &v in heatmap.values().iter() {
        assert!(v.is_finite(), "non-finite heatmap value {v}");
        assert!((0.0..=1.0).contains(&v), "value {v} out of [0, 1]");
    }
}

#[test]
fn test_heatmap_matches_input_for_every_stage() {
    let (model, config) = tiny_model(64);
    let preprocess = PreprocessConfig::new(64).init().unwrap();
    let device = Default::default();
    let frame = random_frame(Seed::new(7), 80, 60);

    for layer in RESNET_STAGES {
        let mut cam = GradCam::new(model.clone(), layer).unwrap();
        let input = preprocess.to_tensor::<CamBackend>(&frame, &device);
        let explanation = cam.explain(input, None).unwrap();

        assert_eq!(explanation.heatmap.width(), 64, "layer {layer}");
        assert_eq!(explanation.heatmap.height(), 64, "layer {layer}");
        let side = config.feature_size(layer).unwrap();
        assert_eq!(explanation.feature_size, (side, side), "layer {layer}");
        assert_unit_range(&explanation.heatmap);
        assert_eq!(explanation.heatmap.min(), 0.0);
    }
}

#[test]
fn test_repeated_explain_is_deterministic() {
    let (model, _) = tiny_model(64);
    let preprocess = PreprocessConfig::new(64).init().unwrap();
    let device = Default::default();
    let frame = square_frame(64);
    let mut cam = GradCam::new(model, "layer3").unwrap();

    let first = cam
        .explain(preprocess.to_tensor::<CamBackend>(&frame, &device), Some(2))
        .unwrap();
    let second = cam
        .explain(preprocess.to_tensor::<CamBackend>(&frame, &device), Some(2))
        .unwrap();

    assert_eq!(first.heatmap, second.heatmap);
    assert_eq!(first.scores, second.scores);
    assert_eq!(first.class_index, 2);
}

#[test]
fn test_target_classes_give_different_maps() {
    let (model, _) = tiny_model(64);
    let preprocess = PreprocessConfig::new(64).init().unwrap();
    let device = Default::default();
    let frame = random_frame(Seed::new(11), 64, 64);
    let mut cam = GradCam::new(model, "layer2").unwrap();

    let maps: Vec<Heatmap> = (0..4)
        .map(|class| {
            let input = preprocess.to_tensor::<CamBackend>(&frame, &device);
            cam.explain(input, Some(class)).unwrap().heatmap
        })
        .collect();

    let distinct = maps
        .iter()
        .enumerate()
        .any(|(i, a)| maps[i + 1..].iter().any(|b| a != b));
    assert!(distinct, "all class heatmaps are identical");
}

#[test]
fn test_mechanical_components_at_224() {
    let (model, _) = tiny_model(224);
    let labels = ClassLabels::mechanical_components();
    let preprocess = PreprocessConfig::default().init().unwrap();
    assert_eq!(preprocess.config().mean, mechcam::core::IMAGENET_MEAN);
    assert_eq!(preprocess.config().std, mechcam::core::IMAGENET_STD);

    let device = Default::default();
    let frame = random_frame(Seed::new(3).derive(224), 300, 200);
    let input = preprocess.to_tensor::<CamBackend>(&frame, &device);
    assert_eq!(input.dims(), [1, 3, 224, 224]);

    let reference: Vec<f32> = model
        .valid()
        .forward(input.clone().inner())
        .into_data()
        .to_vec()
        .unwrap();
    let expected = mechcam::explain::argmax(&reference).unwrap();

    let mut cam = GradCam::new(model, "layer4").unwrap();
    let explanation = cam.explain(input, None).unwrap();

    assert_eq!(explanation.heatmap.width(), 224);
    assert_eq!(explanation.heatmap.height(), 224);
    assert_eq!(explanation.feature_size, (7, 7));
    assert_eq!(explanation.class_index, expected);
    assert_eq!(explanation.scores.len(), labels.len());
    for (a, b) in explanation.scores.iter().zip(&reference) {
        assert!((a - b).abs() < 1e-4, "score {a} vs reference {b}");
    }
    assert!(labels.get(explanation.class_index).is_some());
    assert_unit_range(&explanation.heatmap);
}

#[test]
fn test_all_zero_input_is_finite() {
    let (model, _) = tiny_model(64);
    let device = Default::default();
    let mut cam = GradCam::new(model, "layer3").unwrap();

    let input = Tensor::<CamBackend, 4>::zeros([1, 3, 64, 64], &device);
    let explanation = cam.explain(input, None).unwrap();

    assert_unit_range(&explanation.heatmap);
    assert!(explanation.scores.iter().all(|s| s.is_finite()));
}

#[test]
fn test_batched_input_is_rejected() {
    let (model, _) = tiny_model(32);
    let device = Default::default();
    let mut cam = GradCam::new(model, "layer4").unwrap();

    let input = Tensor::<CamBackend, 4>::zeros([2, 3, 32, 32], &device);
    let err = cam.explain(input, None).unwrap_err();
    assert!(matches!(err, CamError::InvalidInputShape { .. }));
}

#[test]
fn test_unknown_layer_lists_stages() {
    let (model, _) = tiny_model(32);
    match GradCam::new(model, "fc") {
        Err(CamError::UnknownLayer { layer, available }) => {
            assert_eq!(layer, "fc");
            assert_eq!(available, RESNET_STAGES.map(String::from).to_vec());
        }
        other => panic!("expected UnknownLayer, got {:?}", other.err()),
    }
}

#[test]
fn test_snapshots_come_from_the_last_call() {
    let (model, config) = tiny_model(64);
    let preprocess = PreprocessConfig::new(64).init().unwrap();
    let device = Default::default();
    let mut cam = GradCam::new(model, "layer2").unwrap();
    assert!(cam.last_activation().is_none());

    let frame = square_frame(64);
    cam.explain(preprocess.to_tensor::<CamBackend>(&frame, &device), None)
        .unwrap();

    let side = config.feature_size("layer2").unwrap();
    let channels = config.feature_channels("layer2").unwrap();
    assert_eq!(
        cam.last_activation().unwrap().dims(),
        [1, channels, side, side]
    );
    assert_eq!(cam.last_gradient().unwrap().dims(), [1, channels, side, side]);
}
