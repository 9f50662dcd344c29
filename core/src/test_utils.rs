//! Shared fixtures for unit tests

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

// ============================================================================
// Image fixtures
// ============================================================================

pub fn write_gray(path: &Path, width: u32, height: u32, value: u8) {
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .expect("Failed to write gray PNG");
}

pub fn write_rgb(path: &Path, width: u32, height: u32, value: [u8; 3]) {
    RgbImage::from_pixel(width, height, Rgb(value))
        .save(path)
        .expect("Failed to write RGB PNG");
}

pub fn write_rgba(path: &Path, width: u32, height: u32, value: [u8; 4]) {
    RgbaImage::from_pixel(width, height, Rgba(value))
        .save(path)
        .expect("Failed to write RGBA PNG");
}

/// Write a complete material directory: color, roughness, normal and the
/// canonical render, all `width` x `height`.
pub fn write_material(dataset: &Path, name: &str, width: u32, height: u32) {
    let dir = dataset.join(name);
    std::fs::create_dir_all(&dir).expect("Failed to create material dir");
    write_rgb(&dir.join(format!("{name}_4K-PNG_Color.png")), width, height, [200, 100, 50]);
    write_gray(&dir.join(format!("{name}_4K-PNG_Roughness.png")), width, height, 128);
    write_rgb(&dir.join(format!("{name}_4K-PNG_NormalGL.png")), width, height, [128, 128, 255]);
    write_rgb(&dir.join("canonical_render.png"), width, height, [90, 90, 90]);
}
