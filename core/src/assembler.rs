//! Sample assembler
//!
//! Loads the scanned channel images of a material plus its rendered channels
//! and stacks them into one (C, H, W) array with a layout descriptor.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{PackError, Result};
use crate::scanner::{ScanResult, material_name};
use crate::tensor::ChannelArray;

/// One slot of a [`ChannelLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub name: String,
    pub channels: usize,
}

/// Which channel occupies which slice of a concatenated array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    entries: Vec<LayoutEntry>,
}

impl ChannelLayout {
    pub fn push(&mut self, name: &str, channels: usize) {
        self.entries.push(LayoutEntry {
            name: name.to_string(),
            channels,
        });
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Sum of all entry channel counts.
    pub fn total_channels(&self) -> usize {
        self.entries.iter().map(|e| e.channels).sum()
    }

    /// Split `array` back into one array per entry.
    ///
    /// `array` must have exactly [`Self::total_channels`] channels.
    pub fn split(&self, array: &ChannelArray) -> Vec<(String, ChannelArray)> {
        assert_eq!(
            array.channels(),
            self.total_channels(),
            "array does not match layout"
        );
        let mut offset = 0;
        self.entries
            .iter()
            .map(|entry| {
                let slice = array.slice_channels(offset..offset + entry.channels);
                offset += entry.channels;
                (entry.name.clone(), slice)
            })
            .collect()
    }
}

/// Stacked channels of one material.
#[derive(Debug, Clone)]
pub struct AssembledSample {
    pub array: ChannelArray,
    pub layout: ChannelLayout,
}

/// Load and stack the channels of a material.
///
/// Scanned channels come first in scan order, coerced to their catalog channel
/// count. Each name in `rendered` must exist as `<name>.<render_ext>` in
/// `material_dir` and keeps its stored channel count.
pub fn assemble(
    material_dir: &Path,
    scan: &ScanResult,
    catalog: &Catalog,
    rendered: &[String],
    render_ext: &str,
) -> Result<AssembledSample> {
    let mut parts = Vec::with_capacity(scan.len() + rendered.len());
    let mut layout = ChannelLayout::default();

    for (name, file) in scan.iter() {
        let channels = catalog.channel_count(name)?;
        let array = load_channel(file, Some(channels))?;
        layout.push(name, array.channels());
        parts.push((name.to_string(), array));
    }

    for name in rendered {
        let path = material_dir.join(format!("{name}.{render_ext}"));
        if !path.is_file() {
            return Err(PackError::MissingRender {
                channel: name.clone(),
                path,
            });
        }
        let array = load_channel(&path, None)?;
        layout.push(name, array.channels());
        parts.push((name.clone(), array));
    }

    let Some((_, first)) = parts.first() else {
        return Err(PackError::EmptySample(material_name(material_dir)));
    };
    let (height, width) = (first.height(), first.width());
    if let Some((name, bad)) = parts
        .iter()
        .find(|(_, a)| a.height() != height || a.width() != width)
    {
        return Err(PackError::ShapeMismatch {
            channel: name.clone(),
            expected_w: width as u32,
            expected_h: height as u32,
            found_w: bad.width() as u32,
            found_h: bad.height() as u32,
        });
    }

    let arrays: Vec<ChannelArray> = parts.into_iter().map(|(_, a)| a).collect();
    let array = ChannelArray::concat(&arrays)?;
    debug_assert_eq!(array.channels(), layout.total_channels());

    Ok(AssembledSample { array, layout })
}

fn load_channel(path: &Path, channels: Option<usize>) -> Result<ChannelArray> {
    let img = image::open(path).map_err(|source| PackError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ChannelArray::from_image(&img, channels))
}
