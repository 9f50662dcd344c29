//! Channel-major pixel arrays
//!
//! Images are stored planar (C, H, W): every channel is a contiguous
//! `height * width` plane. Packing keeps 8-bit samples; reads promote to f32.

use std::ops::Range;

use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, GrayImage};

use crate::error::{PackError, Result};

/// 8-bit (C, H, W) array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelArray {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl ChannelArray {
    /// Wrap planar data. Returns `None` if `data` does not match the shape.
    pub fn from_raw(channels: usize, height: usize, width: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == channels * height * width).then_some(Self {
            channels,
            height,
            width,
            data,
        })
    }

    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            data: vec![0; channels * height * width],
        }
    }

    /// Convert a decoded image to planar layout.
    ///
    /// With `channels = Some(1 | 3)` the image is coerced to luma or RGB.
    /// With `None` the stored channel count is kept (L, LA, RGB or RGBA).
    /// Higher bit depths are reduced to 8 bits.
    pub fn from_image(img: &DynamicImage, channels: Option<usize>) -> Self {
        let target = channels
            .unwrap_or_else(|| native_channels(img.color()))
            .clamp(1, 4);
        let (width, height) = (img.width() as usize, img.height() as usize);
        let interleaved = match target {
            1 => img.to_luma8().into_raw(),
            2 => img.to_luma_alpha8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            _ => img.to_rgba8().into_raw(),
        };
        Self::from_interleaved(&interleaved, target, height, width)
    }

    /// Move the channel axis of an (H, W, C) buffer to the front.
    pub fn from_interleaved(pixels: &[u8], channels: usize, height: usize, width: usize) -> Self {
        if channels == 1 {
            return Self {
                channels,
                height,
                width,
                data: pixels.to_vec(),
            };
        }

        let plane = height * width;
        let mut data = vec![0u8; channels * plane];
        for (i, px) in pixels.chunks_exact(channels).enumerate() {
            for (c, &v) in px.iter().enumerate() {
                data[c * plane + i] = v;
            }
        }
        Self {
            channels,
            height,
            width,
            data,
        }
    }

    /// Concatenate arrays along the channel axis.
    ///
    /// All inputs must share (H, W).
    pub fn concat(parts: &[ChannelArray]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Ok(Self::zeros(0, 0, 0));
        };
        let (height, width) = (first.height, first.width);
        let mut data = Vec::with_capacity(parts.iter().map(|p| p.data.len()).sum());
        let mut channels = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.height != height || part.width != width {
                return Err(PackError::ShapeMismatch {
                    channel: format!("#{i}"),
                    expected_w: width as u32,
                    expected_h: height as u32,
                    found_w: part.width as u32,
                    found_h: part.height as u32,
                });
            }
            channels += part.channels;
            data.extend_from_slice(&part.data);
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// Copy out a contiguous range of channels.
    ///
    /// Panics if the range exceeds the channel count.
    pub fn slice_channels(&self, range: Range<usize>) -> Self {
        assert!(range.end <= self.channels, "channel range out of bounds");
        let plane = self.plane_len();
        Self {
            channels: range.len(),
            height: self.height,
            width: self.width,
            data: self.data[range.start * plane..range.end * plane].to_vec(),
        }
    }

    /// Crop a `height` x `width` window at (`top`, `left`), applied to every
    /// channel. Pixels outside the source are zero.
    pub fn crop(&self, top: isize, left: isize, height: usize, width: usize) -> Self {
        let mut out = Self::zeros(self.channels, height, width);
        let plane_out = height * width;

        for c in 0..self.channels {
            let src = self.plane(c);
            let dst = &mut out.data[c * plane_out..(c + 1) * plane_out];
            for y in 0..height {
                let sy = top + y as isize;
                if sy < 0 || sy >= self.height as isize {
                    continue;
                }
                // Horizontal overlap of the window with the source row
                let x0 = (-left).clamp(0, width as isize) as usize;
                let x1 = (self.width as isize - left).clamp(0, width as isize) as usize;
                if x0 >= x1 {
                    continue;
                }
                let sx0 = (left + x0 as isize) as usize;
                let row = sy as usize * self.width;
                dst[y * width + x0..y * width + x1]
                    .copy_from_slice(&src[row + sx0..row + sx0 + (x1 - x0)]);
            }
        }
        out
    }

    /// Bilinear resize of every channel to `height` x `width`.
    pub fn resize(&self, height: usize, width: usize) -> Self {
        if height == self.height && width == self.width {
            return self.clone();
        }
        let mut data = Vec::with_capacity(self.channels * height * width);
        for c in 0..self.channels {
            let plane = GrayImage::from_raw(
                self.width as u32,
                self.height as u32,
                self.plane(c).to_vec(),
            )
            .expect("plane length matches shape");
            let resized =
                imageops::resize(&plane, width as u32, height as u32, FilterType::Triangle);
            data.extend_from_slice(resized.as_raw());
        }
        Self {
            channels: self.channels,
            height,
            width,
            data,
        }
    }

    pub fn to_f32(&self) -> FloatArray {
        FloatArray {
            channels: self.channels,
            height: self.height,
            width: self.width,
            data: self.data.iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn plane(&self, channel: usize) -> &[u8] {
        let plane = self.plane_len();
        &self.data[channel * plane..(channel + 1) * plane]
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    fn plane_len(&self) -> usize {
        self.height * self.width
    }
}

fn native_channels(color: ColorType) -> usize {
    match color {
        ColorType::L8 | ColorType::L16 => 1,
        ColorType::La8 | ColorType::La16 => 2,
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => 3,
        _ => 4,
    }
}

/// f32 (C, H, W) array handed to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatArray {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl FloatArray {
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn ramp(channels: usize, height: usize, width: usize) -> ChannelArray {
        let data = (0..channels * height * width).map(|i| (i % 251) as u8).collect();
        ChannelArray::from_raw(channels, height, width, data).unwrap()
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(ChannelArray::from_raw(3, 2, 2, vec![0; 12]).is_some());
        assert!(ChannelArray::from_raw(3, 2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_from_image_moves_channel_axis() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([1, 2, 3]));
        img.put_pixel(1, 0, Rgb([4, 5, 6]));
        let arr = ChannelArray::from_image(&DynamicImage::ImageRgb8(img), None);
        assert_eq!(arr.shape(), (3, 1, 2));
        assert_eq!(arr.as_bytes(), &[1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_from_image_gray_gets_channel_axis() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_raw(2, 2, vec![9, 8, 7, 6]).unwrap());
        let arr = ChannelArray::from_image(&img, None);
        assert_eq!(arr.shape(), (1, 2, 2));
        assert_eq!(arr.as_bytes(), &[9, 8, 7, 6]);
    }

    #[test]
    fn test_from_image_coerces_to_requested_count() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_raw(1, 1, vec![42]).unwrap());
        let arr = ChannelArray::from_image(&img, Some(3));
        assert_eq!(arr.shape(), (3, 1, 1));
        assert_eq!(arr.as_bytes(), &[42, 42, 42]);
    }

    #[test]
    fn test_concat_then_slice_is_identity() {
        let a = ramp(3, 4, 5);
        let b = ramp(1, 4, 5);
        let joined = ChannelArray::concat(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(joined.shape(), (4, 4, 5));
        assert_eq!(joined.slice_channels(0..3), a);
        assert_eq!(joined.slice_channels(3..4), b);
    }

    #[test]
    fn test_concat_rejects_mismatched_planes() {
        let err = ChannelArray::concat(&[ramp(1, 4, 4), ramp(1, 4, 5)]).unwrap_err();
        assert!(matches!(err, PackError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_crop_inside() {
        let arr = ramp(2, 4, 4);
        let crop = arr.crop(1, 2, 2, 2);
        assert_eq!(crop.shape(), (2, 2, 2));
        assert_eq!(crop.plane(0), &[6, 7, 10, 11]);
        assert_eq!(crop.plane(1), &[22, 23, 26, 27]);
    }

    #[test]
    fn test_crop_pads_with_zeros() {
        let arr = ChannelArray::from_raw(1, 2, 2, vec![1, 2, 3, 4]).unwrap();
        let crop = arr.crop(-1, -1, 4, 4);
        assert_eq!(
            crop.as_bytes(),
            &[0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_resize_shape_and_constant_planes() {
        let mut data = vec![10u8; 16];
        data.extend(vec![200u8; 16]);
        let arr = ChannelArray::from_raw(2, 4, 4, data).unwrap();
        let small = arr.resize(2, 3);
        assert_eq!(small.shape(), (2, 2, 3));
        assert!(small.plane(0).iter().all(|&v| v == 10));
        assert!(small.plane(1).iter().all(|&v| v == 200));
    }

    #[test]
    fn test_to_f32_promotes_values() {
        let arr = ChannelArray::from_raw(1, 1, 2, vec![0, 255]).unwrap();
        assert_eq!(arr.to_f32().as_slice(), &[0.0, 255.0]);
    }
}
