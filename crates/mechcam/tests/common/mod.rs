//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use mechcam::prelude::*;
use rand::Rng;

/// Frame of uniformly random pixels.
pub fn random_frame(seed: Seed, width: usize, height: usize) -> RgbFrame {
    let mut rng = seed.to_rng();
    let pixels: Vec<u8> = (0..width * height * 3).map(|_| rng.gen()).collect();
    RgbFrame::from_raw(width, height, pixels).unwrap()
}

/// Grey frame with a bright square in the top-left quarter.
pub fn square_frame(size: usize) -> RgbFrame {
    let mut pixels = vec![40u8; size * size * 3];
    for y in 0..size / 2 {
        for x in 0..size / 2 {
            let offset = (y * size + x) * 3;
            pixels[offset..offset + 3].copy_from_slice(&[230, 220, 200]);
        }
    }
    RgbFrame::from_raw(size, size, pixels).unwrap()
}

/// Small four-class ResNet for `image_size` inputs.
pub fn tiny_model(image_size: usize) -> (ResNet<CamBackend>, ResNetConfig) {
    let config = ResNetConfig::tiny(4, image_size);
    let device = Default::default();
    (config.init::<CamBackend>(&device), config)
}

/// Demo configuration matching [`tiny_model`].
pub fn tiny_config(image_size: usize) -> DemoConfig {
    DemoConfig::default().with_model(ResNetConfig::tiny(4, image_size))
}
