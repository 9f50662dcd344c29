//! Material scanner
//!
//! Binds the image files of one material directory to catalog channels by
//! filename fragment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{PackError, Result};

/// Extensions (lowercase) considered image channels.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

/// How conflicting fragment matches are resolved.
///
/// A conflict is either one filename containing several catalog fragments, or
/// one channel matched by several files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Later catalog entry and later file (sorted by name) win.
    #[default]
    LastMatchWins,
    /// Any conflict fails the material.
    Reject,
}

/// Channel bindings for one material, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    bindings: Vec<(String, PathBuf)>,
}

impl ScanResult {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.bindings
            .iter()
            .map(|(name, file)| (name.as_str(), file.as_path()))
    }

    pub fn get(&self, channel: &str) -> Option<&Path> {
        self.bindings
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, file)| file.as_path())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Match the image files in `material_dir` against `catalog`.
pub fn scan(material_dir: &Path, catalog: &Catalog, policy: MatchPolicy) -> Result<ScanResult> {
    if !material_dir.is_dir() {
        return Err(PackError::MaterialNotFound(material_dir.to_path_buf()));
    }
    let material = material_name(material_dir);

    let mut files: Vec<String> = std::fs::read_dir(material_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| is_image_file(name))
        .collect();
    files.sort();

    // Indexed by catalog position so the result comes out in catalog order
    let mut bound: Vec<Option<String>> = vec![None; catalog.len()];

    for file in &files {
        let matches: Vec<usize> = catalog
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, entry)| file.contains(entry.fragment.as_str()))
            .map(|(i, _)| i)
            .collect();

        let Some(&winner) = matches.last() else {
            continue;
        };

        if policy == MatchPolicy::Reject && matches.len() > 1 {
            let names: Vec<&str> = matches
                .iter()
                .map(|&i| catalog.entries()[i].name.as_str())
                .collect();
            return Err(PackError::AmbiguousChannel {
                material,
                detail: format!("'{}' matches channels {}", file, names.join(", ")),
            });
        }

        if let Some(previous) = &bound[winner] {
            if policy == MatchPolicy::Reject {
                return Err(PackError::AmbiguousChannel {
                    material,
                    detail: format!(
                        "channel '{}' matched by both '{}' and '{}'",
                        catalog.entries()[winner].name,
                        previous,
                        file
                    ),
                });
            }
            tracing::debug!(
                material = %material,
                channel = %catalog.entries()[winner].name,
                replaced = %previous,
                file = %file,
                "Later file wins channel binding"
            );
        }
        bound[winner] = Some(file.clone());
    }

    let bindings = catalog
        .entries()
        .iter()
        .zip(bound)
        .filter_map(|(entry, file)| file.map(|f| (entry.name.clone(), material_dir.join(f))))
        .collect();

    Ok(ScanResult { bindings })
}

pub(crate) fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|i| ext.eq_ignore_ascii_case(i)))
        .unwrap_or(false)
}

pub(crate) fn material_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}
