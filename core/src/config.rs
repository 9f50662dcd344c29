//! Pipeline configuration (JSON or TOML)
//!
//! Every field has a default except the store name, resolution and fitting
//! method. Those deserialize to empty values and are reported by
//! [`PackConfig::validate`] together with every other problem.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::BuildOptions;
use crate::catalog::{BUILTIN_CHANNELS, Catalog};
use crate::fitting::{FittingMethod, Resolution};
use crate::scanner::MatchPolicy;

pub const DEFAULT_CSV_URL: &str = "https://ambientCG.com/api/v2/downloads_csv?type=Material";

/// Configuration loading or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON/TOML for [`PackConfig`]
    #[error("failed to parse config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// One or more fields failed validation
    #[error("invalid config:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_lmdb_dir")]
    pub lmdb_dir: PathBuf,
    /// Store directory name under `lmdb_dir`
    #[serde(default)]
    pub lmdb_name: String,
    /// [height, width]
    #[serde(default)]
    pub resolution: [usize; 2],
    #[serde(default)]
    pub fitting_method: String,
    #[serde(default = "default_samples")]
    pub generate_data_per_sample: usize,
    #[serde(default)]
    pub use_rendered_types: Vec<String>,
    #[serde(default = "default_data_types")]
    pub use_data_types: Vec<String>,
    #[serde(default)]
    pub fetch_pairs: Vec<(String, String)>,
    #[serde(default = "default_commit_interval")]
    pub commit_interval: usize,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    #[serde(default = "default_render_extension")]
    pub render_extension: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_csv_url")]
    pub download_csv_url: String,
    #[serde(default = "default_download_filter")]
    pub download_filter: String,
    #[serde(default = "default_download_history")]
    pub download_history_cache: PathBuf,
    #[serde(default = "default_render_history")]
    pub render_history_cache_canonical: PathBuf,
    /// Render program template; `{material_dir}`, `{material}` and `{output}`
    /// are substituted per material
    #[serde(default)]
    pub render_command: Option<String>,
}

fn default_root_dir() -> PathBuf { PathBuf::from(".") }
fn default_dataset_dir() -> PathBuf { PathBuf::from("dataset") }
fn default_cache_dir() -> PathBuf { PathBuf::from("cache") }
fn default_lmdb_dir() -> PathBuf { PathBuf::from("lmdb") }
fn default_samples() -> usize { 1 }
fn default_data_types() -> Vec<String> {
    BUILTIN_CHANNELS.iter().map(|(name, _, _)| name.to_string()).collect()
}
fn default_commit_interval() -> usize { 20 }
fn default_render_extension() -> String { "png".to_string() }
fn default_csv_url() -> String { DEFAULT_CSV_URL.to_string() }
fn default_download_filter() -> String { "4K-PNG".to_string() }
fn default_download_history() -> PathBuf { PathBuf::from("downloaded_files.txt") }
fn default_render_history() -> PathBuf { PathBuf::from("render_history_canonical.txt") }

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            dataset_dir: default_dataset_dir(),
            cache_dir: default_cache_dir(),
            lmdb_dir: default_lmdb_dir(),
            lmdb_name: String::new(),
            resolution: [0, 0],
            fitting_method: String::new(),
            generate_data_per_sample: default_samples(),
            use_rendered_types: Vec::new(),
            use_data_types: default_data_types(),
            fetch_pairs: Vec::new(),
            commit_interval: default_commit_interval(),
            match_policy: MatchPolicy::default(),
            render_extension: default_render_extension(),
            seed: None,
            download_csv_url: default_csv_url(),
            download_filter: default_download_filter(),
            download_history_cache: default_download_history(),
            render_history_cache_canonical: default_render_history(),
            render_command: None,
        }
    }
}

impl PackConfig {
    /// Defaults plus the three required fields.
    pub fn new(lmdb_name: &str, resolution: [usize; 2], fitting_method: &str) -> Self {
        Self {
            lmdb_name: lmdb_name.to_string(),
            resolution,
            fitting_method: fitting_method.to_string(),
            ..Self::default()
        }
    }

    /// Load from `path` and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path` without validating; `.toml` files parse as TOML,
    /// everything else as JSON.
    ///
    /// For commands that only need the directory and download settings.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Check every field, collecting all problems into one error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.lmdb_name.trim().is_empty() {
            problems.push("lmdb_name is required".to_string());
        }
        if self.resolution[0] == 0 || self.resolution[1] == 0 {
            problems.push(format!(
                "resolution must be two positive integers [height, width], got {:?}",
                self.resolution
            ));
        }
        if self.fitting_method.is_empty() {
            problems.push("fitting_method is required".to_string());
        } else if let Err(e) = self.fitting_method.parse::<FittingMethod>() {
            problems.push(e.to_string());
        }
        if self.generate_data_per_sample == 0 {
            problems.push("generate_data_per_sample must be at least 1".to_string());
        }
        if self.commit_interval == 0 {
            problems.push("commit_interval must be at least 1".to_string());
        }
        if self.render_extension.is_empty() {
            problems.push("render_extension must not be empty".to_string());
        }

        // Unknown data types are skipped by `catalog()` and pairs naming
        // disabled channels by `active_pairs()`; neither is an error.
        let catalog = Catalog::builtin();
        for name in &self.use_rendered_types {
            if name.trim().is_empty() {
                problems.push("use_rendered_types: empty channel name".to_string());
            } else if catalog.contains(name) {
                problems.push(format!(
                    "use_rendered_types: '{name}' collides with a catalog channel"
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root_dir.join(path)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.dataset_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.cache_dir)
    }

    /// Parent directory of all stores.
    pub fn store_root(&self) -> PathBuf {
        self.resolve(&self.lmdb_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_root().join(&self.lmdb_name)
    }

    pub fn download_history_path(&self) -> PathBuf {
        self.resolve(&self.download_history_cache)
    }

    pub fn render_history_path(&self) -> PathBuf {
        self.resolve(&self.render_history_cache_canonical)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.resolution[0], self.resolution[1])
    }

    /// Built-in catalog restricted to `use_data_types`.
    pub fn catalog(&self) -> Catalog {
        Catalog::builtin().select(&self.use_data_types)
    }

    /// Configured `fetch_pairs` whose channels are both enabled.
    ///
    /// A pair is dropped when its rendered channel is not in
    /// `use_rendered_types`, or its data channel is not in `use_data_types`
    /// or unknown to the catalog.
    pub fn active_pairs(&self) -> Vec<(String, String)> {
        let catalog = self.catalog();
        self.fetch_pairs
            .iter()
            .filter(|(a, b)| {
                let active = self.use_rendered_types.contains(a) && catalog.contains(b);
                if !active {
                    tracing::debug!(rendered = %a, data = %b, "Skipping disabled fetch pair");
                }
                active
            })
            .cloned()
            .collect()
    }

    pub fn build_options(&self, rebuild: bool) -> BuildOptions {
        BuildOptions {
            dataset_dir: self.dataset_path(),
            store_path: self.store_path(),
            catalog: self.catalog(),
            rendered_channels: self.use_rendered_types.clone(),
            render_extension: self.render_extension.clone(),
            fitting_method: self.fitting_method.clone(),
            resolution: self.resolution(),
            samples_per_material: self.generate_data_per_sample,
            commit_interval: self.commit_interval,
            match_policy: self.match_policy,
            seed: self.seed,
            rebuild,
        }
    }
}
