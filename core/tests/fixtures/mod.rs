//! On-disk material fixtures for pipeline tests.

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Write a material with color, roughness and normal maps, plus the canonical
/// render unless `with_render` is false.
pub fn write_material(dataset: &Path, name: &str, size: u32, with_render: bool) {
    let dir = dataset.join(name);
    std::fs::create_dir_all(&dir).expect("Failed to create material dir");

    RgbImage::from_fn(size, size, |x, y| Rgb([x as u8, y as u8, 200]))
        .save(dir.join(format!("{name}_4K-PNG_Color.png")))
        .expect("Failed to write color map");
    GrayImage::from_pixel(size, size, Luma([140]))
        .save(dir.join(format!("{name}_4K-PNG_Roughness.png")))
        .expect("Failed to write roughness map");
    RgbImage::from_pixel(size, size, Rgb([128, 128, 255]))
        .save(dir.join(format!("{name}_4K-PNG_NormalGL.png")))
        .expect("Failed to write normal map");
    // Non-image files in a material directory are ignored
    std::fs::write(dir.join(format!("{name}.txt")), "ambientCG").expect("Failed to write note");

    if with_render {
        RgbImage::from_pixel(size, size, Rgb([60, 70, 80]))
            .save(dir.join("canonical_render.png"))
            .expect("Failed to write render");
    }
}
