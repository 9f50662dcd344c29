//! Unzip command - extract downloaded material archives
//!
//! `<cache>/<name>.zip` is extracted into `<dataset>/<name>/`. Entries whose
//! path would leave the target directory are rejected.

use std::fs::File;
use std::path::{Path, PathBuf};

use ambientproc_core::PackConfig;
use anyhow::{Context, Result};
use zip::ZipArchive;

pub fn execute(config: &PackConfig) -> Result<()> {
    let cache = config.cache_path();
    let dataset = config.dataset_path();
    std::fs::create_dir_all(&dataset)
        .with_context(|| format!("Failed to create dataset directory: {}", dataset.display()))?;

    let archives = list_archives(&cache)?;
    let mut extracted = 0;
    for archive in &archives {
        let Some(stem) = archive.file_stem() else {
            continue;
        };
        let target = dataset.join(stem);
        tracing::info!(archive = %archive.display(), "Unzipping");
        match extract(archive, &target) {
            Ok(files) => {
                tracing::debug!(target = %target.display(), files, "Extracted");
                extracted += 1;
            }
            Err(e) => {
                tracing::warn!(
                    archive = %archive.display(),
                    error = %format!("{e:#}"),
                    "Extraction failed"
                );
            }
        }
    }

    println!("Extracted {} of {} archives into {}", extracted, archives.len(), dataset.display());
    Ok(())
}

/// `*.zip` files in `dir`, sorted by name.
fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read cache directory: {}", dir.display()))?;
    let mut archives: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")))
        .collect();
    archives.sort();
    Ok(archives)
}

/// Extract every entry of `archive` below `target`. Returns the file count.
pub fn extract(archive: &Path, target: &Path) -> Result<usize> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", archive.display()))?;

    std::fs::create_dir_all(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let mut files = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            anyhow::bail!(
                "Archive entry '{}' escapes the target directory",
                entry.name()
            );
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract {}", out_path.display()))?;
        files += 1;
    }
    Ok(files)
}
