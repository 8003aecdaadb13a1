//! Image fixtures generated in-process.

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;

/// RGB noise from a fixed-seed LCG; noise defeats JPEG compression, so the
/// encoded size scales with the pixel count.
pub fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let img = RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        Rgb([next(), next(), next()])
    });
    DynamicImage::ImageRgb8(img)
}

pub fn jpeg(image: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    image.to_rgb8().write_with_encoder(encoder).unwrap();
    out
}

pub fn png(image: &DynamicImage) -> Vec<u8> {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// Noise JPEG of the given size.
pub fn noise_jpeg(width: u32, height: u32, seed: u32) -> Vec<u8> {
    jpeg(&noise_image(width, height, seed), 95)
}
