//! Crop cleanup before recognition: grayscale, denoise, Otsu binarisation.

use image::{DynamicImage, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;

/// Median window radius used for denoising (3x3 window).
pub const DENOISE_RADIUS: u32 = 1;

pub fn preprocess_for_ocr(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let denoised = median_filter(&gray, DENOISE_RADIUS, DENOISE_RADIUS);
    binarize(&denoised)
}

/// Otsu threshold: pixels above the level become white, the rest black.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::Binary)
}
