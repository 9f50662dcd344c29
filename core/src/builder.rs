//! Store builder
//!
//! Walks the dataset directory, turns every material into
//! `samples_per_material` fitted records and writes them to the store.
//! A failing material is logged and skipped; only configuration errors abort.

use std::path::{Path, PathBuf};

use crate::assembler::assemble;
use crate::catalog::Catalog;
use crate::config::ConfigError;
use crate::error::{PackError, Result};
use crate::fitting::{FittingMethod, Resolution, Transform};
use crate::record::{GeneratedRecord, record_key};
use crate::scanner::{MatchPolicy, material_name, scan};
use crate::store::{STORE_FORMAT_VERSION, StoreMeta, StoreWriter};

/// Inputs of one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub dataset_dir: PathBuf,
    pub store_path: PathBuf,
    pub catalog: Catalog,
    /// Rendered channels required in every material, in layout order
    pub rendered_channels: Vec<String>,
    pub render_extension: String,
    pub fitting_method: String,
    pub resolution: Resolution,
    pub samples_per_material: usize,
    /// Materials per transaction
    pub commit_interval: usize,
    pub match_policy: MatchPolicy,
    /// Fixed seed for the random fitting methods
    pub seed: Option<u64>,
    /// Build into a staging directory and replace any existing store
    pub rebuild: bool,
}

impl BuildOptions {
    pub fn new(
        dataset_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
        fitting_method: &str,
        resolution: Resolution,
    ) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
            store_path: store_path.into(),
            catalog: Catalog::builtin(),
            rendered_channels: Vec::new(),
            render_extension: "png".to_string(),
            fitting_method: fitting_method.to_string(),
            resolution,
            samples_per_material: 1,
            commit_interval: 20,
            match_policy: MatchPolicy::default(),
            seed: None,
            rebuild: false,
        }
    }
}

/// A material left out of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMaterial {
    pub material: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub materials_packed: usize,
    pub records_written: usize,
    pub skipped: Vec<SkippedMaterial>,
}

/// Build (or extend) the store described by `options`.
///
/// Without `rebuild`, an existing store is opened as-is and its keys are
/// overwritten one by one; keys of materials no longer present survive.
pub fn build_store(options: &BuildOptions) -> Result<BuildReport> {
    let method: FittingMethod = options.fitting_method.parse()?;
    check_options(options)?;

    let mut transform = match options.seed {
        Some(seed) => Transform::with_seed(method, options.resolution, seed),
        None => Transform::new(method, options.resolution),
    };
    if !method.is_random() && options.samples_per_material > 1 {
        tracing::warn!(
            method = %method,
            samples = options.samples_per_material,
            "Deterministic fitting method produces identical samples"
        );
    }

    let materials = list_materials(&options.dataset_dir)?;
    tracing::info!(
        materials = materials.len(),
        dataset = %options.dataset_dir.display(),
        store = %options.store_path.display(),
        "Building store"
    );

    let target = if options.rebuild {
        let staging = sibling(&options.store_path, "building");
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        staging
    } else {
        options.store_path.clone()
    };

    let mut writer = StoreWriter::open(&target)?;
    let mut report = BuildReport::default();

    for dir in &materials {
        let name = material_name(dir);
        match pack_material(dir, &name, options, &mut transform) {
            Ok(records) => {
                for (key, bytes) in &records {
                    writer.put(key, bytes)?;
                }
                report.materials_packed += 1;
                report.records_written += records.len();
                tracing::debug!(material = %name, records = records.len(), "Packed material");

                if report.materials_packed % options.commit_interval == 0 {
                    writer.commit()?;
                }
            }
            Err(e) => {
                tracing::warn!(material = %name, error = %e, "Skipping material");
                report.skipped.push(SkippedMaterial {
                    material: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut channels: Vec<String> = options.catalog.names().map(str::to_string).collect();
    channels.extend(options.rendered_channels.iter().cloned());
    writer.write_meta(&StoreMeta {
        format_version: STORE_FORMAT_VERSION,
        resolution: [options.resolution.height, options.resolution.width],
        fitting_method: method.as_str().to_string(),
        samples_per_material: options.samples_per_material,
        channels,
    })?;
    writer.finish()?;

    if options.rebuild {
        swap_into_place(&target, &options.store_path)?;
    }

    tracing::info!(
        records = report.records_written,
        materials = report.materials_packed,
        skipped = report.skipped.len(),
        "Store build complete"
    );
    Ok(report)
}

fn check_options(options: &BuildOptions) -> Result<()> {
    let mut problems = Vec::new();
    if options.samples_per_material == 0 {
        problems.push("samples_per_material must be at least 1".to_string());
    }
    if options.commit_interval == 0 {
        problems.push("commit_interval must be at least 1".to_string());
    }
    if options.resolution.height == 0 || options.resolution.width == 0 {
        problems.push(format!("resolution {} has a zero side", options.resolution));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems).into())
    }
}

/// Scan, assemble, and fit one material. Nothing is returned unless every
/// sample succeeded.
fn pack_material(
    dir: &Path,
    name: &str,
    options: &BuildOptions,
    transform: &mut Transform,
) -> Result<Vec<(String, Vec<u8>)>> {
    let scanned = scan(dir, &options.catalog, options.match_policy)?;
    let sample = assemble(
        dir,
        &scanned,
        &options.catalog,
        &options.rendered_channels,
        &options.render_extension,
    )?;

    (0..options.samples_per_material)
        .map(|i| {
            let fitted = transform.apply(&sample.array)?;
            let record = GeneratedRecord::from_slices(sample.layout.split(&fitted));
            Ok((record_key(name, i), record.to_bytes()))
        })
        .collect()
}

/// Material subdirectories of `dataset_dir`, sorted by name.
pub fn list_materials(dataset_dir: &Path) -> Result<Vec<PathBuf>> {
    if !dataset_dir.is_dir() {
        return Err(PackError::MaterialNotFound(dataset_dir.to_path_buf()));
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dataset_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Move a finished staging store over `store_path`.
fn swap_into_place(staging: &Path, store_path: &Path) -> Result<()> {
    if !store_path.exists() {
        std::fs::rename(staging, store_path)?;
        return Ok(());
    }

    let retired = sibling(store_path, "old");
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    std::fs::rename(store_path, &retired)?;
    if let Err(e) = std::fs::rename(staging, store_path) {
        // Put the previous store back
        std::fs::rename(&retired, store_path)?;
        return Err(e.into());
    }
    std::fs::remove_dir_all(&retired)?;
    tracing::info!(store = %store_path.display(), "Replaced existing store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreReader;
    use crate::test_utils::write_material;
    use tempfile::tempdir;

    fn options(dataset: &Path, store: &Path, method: &str) -> BuildOptions {
        let mut options = BuildOptions::new(dataset, store, method, Resolution::new(8, 8));
        options.rendered_channels = vec!["canonical_render".to_string()];
        options.seed = Some(3);
        options
    }

    #[test]
    fn test_invalid_method_aborts_before_store_is_created() {
        let dir = tempdir().unwrap();
        write_material(dir.path(), "Rock001", 16, 16);
        let store = dir.path().join("store");

        let err = build_store(&options(dir.path(), &store, "BOGUS")).unwrap_err();
        assert!(matches!(err, PackError::InvalidFittingMethod(_)));
        assert!(err.is_fatal());
        assert!(!store.exists());
    }

    #[test]
    fn test_zero_samples_rejected() {
        let dir = tempdir().unwrap();
        let mut opts = options(dir.path(), &dir.path().join("store"), "RESIZE");
        opts.samples_per_material = 0;
        assert!(matches!(build_store(&opts), Err(PackError::Config(_))));
    }

    #[test]
    fn test_missing_dataset_dir() {
        let dir = tempdir().unwrap();
        let opts = options(&dir.path().join("nope"), &dir.path().join("store"), "RESIZE");
        assert!(matches!(build_store(&opts), Err(PackError::MaterialNotFound(_))));
    }

    #[test]
    fn test_build_writes_meta() {
        let dataset = tempdir().unwrap();
        write_material(dataset.path(), "Rock001", 16, 12);
        let out = tempdir().unwrap();
        let store = out.path().join("store");

        let report = build_store(&options(dataset.path(), &store, "CENTER_CROP")).unwrap();
        assert_eq!(report.materials_packed, 1);
        assert_eq!(report.records_written, 1);

        let reader = StoreReader::open(&store).unwrap();
        let meta = reader.meta().unwrap();
        assert_eq!(meta.resolution, [8, 8]);
        assert_eq!(meta.fitting_method, "CENTER_CROP");
        assert_eq!(meta.channels.last().map(String::as_str), Some("canonical_render"));
        let record = reader.fetch_record("Rock001_0").unwrap();
        let names: Vec<&str> = record.channel_names().collect();
        assert_eq!(names, vec!["base_color", "roughness", "normal", "canonical_render"]);
    }

    #[test]
    fn test_commit_interval_of_one() {
        let dataset = tempdir().unwrap();
        for name in ["A", "B", "C"] {
            write_material(dataset.path(), name, 8, 8);
        }
        let out = tempdir().unwrap();
        let store = out.path().join("store");
        let mut opts = options(dataset.path(), &store, "RESIZE");
        opts.commit_interval = 1;

        let report = build_store(&opts).unwrap();
        assert_eq!(report.records_written, 3);
        assert_eq!(StoreReader::open(&store).unwrap().keys(), &["A_0", "B_0", "C_0"]);
    }

    #[test]
    fn test_sibling_names() {
        let p = Path::new("/tmp/lmdb/canonical");
        assert_eq!(sibling(p, "building"), PathBuf::from("/tmp/lmdb/canonical.building"));
        assert_eq!(sibling(p, "old"), PathBuf::from("/tmp/lmdb/canonical.old"));
    }
}
