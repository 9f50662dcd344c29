//! Fitting transforms
//!
//! Reconcile arbitrary source resolution with the fixed training resolution.
//! A transform always applies one geometry to every channel of the input, so
//! stacked channels stay pixel-aligned.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::error::{PackError, Result};
use crate::tensor::ChannelArray;

/// Area fraction range sampled by `RANDOM_RESIZED_CROP`.
pub const RESIZED_CROP_SCALE: (f64, f64) = (0.08, 1.0);
/// Aspect ratio range sampled (log-uniform) by `RANDOM_RESIZED_CROP`.
pub const RESIZED_CROP_RATIO: (f64, f64) = (3.0 / 4.0, 4.0 / 3.0);
const RESIZED_CROP_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FittingMethod {
    RandomCrop,
    CenterCrop,
    RandomResizedCrop,
    Resize,
}

impl FittingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomCrop => "RANDOM_CROP",
            Self::CenterCrop => "CENTER_CROP",
            Self::RandomResizedCrop => "RANDOM_RESIZED_CROP",
            Self::Resize => "RESIZE",
        }
    }

    /// Random methods produce a different sample on every call.
    pub fn is_random(&self) -> bool {
        matches!(self, Self::RandomCrop | Self::RandomResizedCrop)
    }
}

impl FromStr for FittingMethod {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            // RANDOM_CORP and RANDOM_RESIZE are spellings found in older configs
            "RANDOM_CROP" | "RANDOM_CORP" => Ok(Self::RandomCrop),
            "CENTER_CROP" => Ok(Self::CenterCrop),
            "RANDOM_RESIZED_CROP" | "RANDOM_RESIZE" => Ok(Self::RandomResizedCrop),
            "RESIZE" => Ok(Self::Resize),
            other => Err(PackError::InvalidFittingMethod(other.to_string())),
        }
    }
}

impl fmt::Display for FittingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target (height, width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub height: usize,
    pub width: usize,
}

impl Resolution {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// Crop window chosen for one invocation, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub top: isize,
    pub left: isize,
    pub height: usize,
    pub width: usize,
}

/// A configured fitting transform with its own random stream.
#[derive(Debug, Clone)]
pub struct Transform {
    method: FittingMethod,
    resolution: Resolution,
    rng: Pcg64,
}

/// Parse `method` and build a transform seeded from the OS.
///
/// Fails with [`PackError::InvalidFittingMethod`] for unknown method names.
pub fn build_transform(method: &str, resolution: Resolution) -> Result<Transform> {
    let method = method.parse()?;
    Ok(Transform::new(method, resolution))
}

impl Transform {
    pub fn new(method: FittingMethod, resolution: Resolution) -> Self {
        Self::with_seed(method, resolution, rand::random::<u64>())
    }

    /// Reproducible random stream.
    pub fn with_seed(method: FittingMethod, resolution: Resolution, seed: u64) -> Self {
        Self {
            method,
            resolution,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn method(&self) -> FittingMethod {
        self.method
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Apply the transform to every channel of `input`.
    pub fn apply(&mut self, input: &ChannelArray) -> Result<ChannelArray> {
        let Resolution { height, width } = self.resolution;
        match self.method {
            FittingMethod::Resize => Ok(input.resize(height, width)),
            FittingMethod::CenterCrop => {
                let w = self.center_window(input);
                Ok(input.crop(w.top, w.left, w.height, w.width))
            }
            FittingMethod::RandomCrop => {
                let w = self.random_window(input)?;
                Ok(input.crop(w.top, w.left, w.height, w.width))
            }
            FittingMethod::RandomResizedCrop => {
                let w = self.resized_crop_window(input);
                Ok(input
                    .crop(w.top, w.left, w.height, w.width)
                    .resize(height, width))
            }
        }
    }

    /// Centred window; negative offsets mean zero padding.
    fn center_window(&self, input: &ChannelArray) -> CropWindow {
        let Resolution { height, width } = self.resolution;
        CropWindow {
            top: center_offset(input.height(), height),
            left: center_offset(input.width(), width),
            height,
            width,
        }
    }

    fn random_window(&mut self, input: &ChannelArray) -> Result<CropWindow> {
        let Resolution { height, width } = self.resolution;
        let (h, w) = (input.height(), input.width());
        if height > h || width > w {
            return Err(PackError::CropTooLarge {
                crop_h: height,
                crop_w: width,
                input_h: h,
                input_w: w,
            });
        }
        Ok(CropWindow {
            top: self.rng.random_range(0..=h - height) as isize,
            left: self.rng.random_range(0..=w - width) as isize,
            height,
            width,
        })
    }

    /// Random area/aspect window, falling back to a centred crop clamped to
    /// the aspect range when no attempt fits.
    fn resized_crop_window(&mut self, input: &ChannelArray) -> CropWindow {
        let (h, w) = (input.height(), input.width());
        let area = (h * w) as f64;
        let (log_lo, log_hi) = (RESIZED_CROP_RATIO.0.ln(), RESIZED_CROP_RATIO.1.ln());

        for _ in 0..RESIZED_CROP_ATTEMPTS {
            let scale = self.rng.random_range(RESIZED_CROP_SCALE.0..RESIZED_CROP_SCALE.1);
            let target_area = area * scale;
            let aspect = self.rng.random_range(log_lo..log_hi).exp();
            let cw = (target_area * aspect).sqrt().round_ties_even() as usize;
            let ch = (target_area / aspect).sqrt().round_ties_even() as usize;
            if cw > 0 && cw <= w && ch > 0 && ch <= h {
                return CropWindow {
                    top: self.rng.random_range(0..=h - ch) as isize,
                    left: self.rng.random_range(0..=w - cw) as isize,
                    height: ch,
                    width: cw,
                };
            }
        }

        let in_ratio = w as f64 / h.max(1) as f64;
        let (cw, ch) = if in_ratio < RESIZED_CROP_RATIO.0 {
            (w, (w as f64 / RESIZED_CROP_RATIO.0).round_ties_even() as usize)
        } else if in_ratio > RESIZED_CROP_RATIO.1 {
            ((h as f64 * RESIZED_CROP_RATIO.1).round_ties_even() as usize, h)
        } else {
            (w, h)
        };
        CropWindow {
            top: ((h - ch.min(h)) / 2) as isize,
            left: ((w - cw.min(w)) / 2) as isize,
            height: ch.min(h),
            width: cw.min(w),
        }
    }
}

/// Offset that centres `target` within `size`; negative when padding is needed.
/// Halves round to even.
fn center_offset(size: usize, target: usize) -> isize {
    if size >= target {
        ((size - target) as f64 / 2.0).round_ties_even() as isize
    } else {
        -(((target - size) / 2) as isize)
    }
}
