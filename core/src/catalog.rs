//! Channel catalog
//!
//! Maps semantic channel names to the filename fragment used by the texture
//! packs and the number of pixel components the channel carries.

use crate::error::{PackError, Result};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub fragment: String,
    pub channels: usize,
}

impl ChannelSpec {
    pub fn new(name: &str, fragment: &str, channels: usize) -> Self {
        Self {
            name: name.to_string(),
            fragment: fragment.to_string(),
            channels,
        }
    }
}

/// Built-in channels, in catalog order: (name, filename fragment, channel count).
pub const BUILTIN_CHANNELS: &[(&str, &str, usize)] = &[
    ("ao", "AmbientOcclusion", 1),
    ("base_color", "Color", 3),
    ("displacement", "Displacement", 1),
    ("roughness", "Roughness", 1),
    ("normal", "NormalGL", 3),
    ("emission", "Emission", 3),
    ("metallic", "Metalness", 1),
    ("opacity", "Opacity", 1),
];

/// Ordered, immutable set of channel specs with unique names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<ChannelSpec>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The texture pack naming scheme.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_CHANNELS
                .iter()
                .map(|&(name, fragment, channels)| ChannelSpec::new(name, fragment, channels))
                .collect(),
        }
    }

    /// Build a catalog from explicit entries.
    ///
    /// Names must be unique, fragments non-empty and channel counts 1 or 3.
    pub fn from_entries(entries: Vec<ChannelSpec>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(PackError::InvalidCatalog(format!(
                    "duplicate catalog channel '{}'",
                    entry.name
                )));
            }
            if entry.fragment.is_empty() {
                return Err(PackError::InvalidCatalog(format!(
                    "catalog channel '{}' has an empty filename fragment",
                    entry.name
                )));
            }
            if entry.channels != 1 && entry.channels != 3 {
                return Err(PackError::InvalidCatalog(format!(
                    "catalog channel '{}' has {} channels (must be 1 or 3)",
                    entry.name, entry.channels
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Restrict the catalog to `names`, keeping catalog order.
    ///
    /// Unknown names are skipped with a warning.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Self {
        for name in names {
            if let Err(e) = self.get(name.as_ref()) {
                tracing::warn!(error = %e, "Ignoring data type");
            }
        }
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| names.iter().any(|n| n.as_ref() == e.name))
                .cloned()
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&ChannelSpec> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PackError::UnknownChannel(name.to_string()))
    }

    pub fn channel_fragment(&self, name: &str) -> Result<&str> {
        self.get(name).map(|e| e.fragment.as_str())
    }

    pub fn channel_count(&self, name: &str) -> Result<usize> {
        self.get(name).map(|e| e.channels)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn entries(&self) -> &[ChannelSpec] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
