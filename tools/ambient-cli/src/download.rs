//! Catalog and material download
//!
//! The catalog CSV lists one row per downloadable variant. Rows containing the
//! configured filter (e.g. `4K-PNG`) are fetched as `<cache>/<name>.zip`.
//! Finished names go into the download history so a rerun only fetches what
//! is missing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ambientproc_core::{HistoryCache, PackConfig};
use anyhow::{Context, Result};
use clap::Args;

pub const CATALOG_FILE: &str = "materials.csv";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:62.0) Gecko/20100101 Firefox/62.0";
const NAME_COLUMN: usize = 0;
const LINK_COLUMN: usize = 5;
const DOWNLOAD_PAUSE: Duration = Duration::from_secs(1);

#[derive(Args)]
pub struct DownloadArgs {
    /// Catalog CSV to read (defaults to <cache_dir>/materials.csv)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Stop after this many downloads
    #[arg(long)]
    pub limit: Option<usize>,
}

/// One downloadable material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub name: String,
    pub url: String,
}

fn client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}

fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Request failed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad response: {}", url))?;
    let bytes = response
        .bytes()
        .with_context(|| format!("Failed to read response body: {}", url))?;
    Ok(bytes.to_vec())
}

/// Download the catalog CSV into the cache directory.
pub fn fetch_catalog(config: &PackConfig) -> Result<()> {
    let cache = config.cache_path();
    std::fs::create_dir_all(&cache)
        .with_context(|| format!("Failed to create cache directory: {}", cache.display()))?;

    tracing::info!(url = %config.download_csv_url, "Fetching catalog");
    let body = fetch(&client()?, &config.download_csv_url)?;

    let path = cache.join(CATALOG_FILE);
    std::fs::write(&path, &body)
        .with_context(|| format!("Failed to write catalog: {}", path.display()))?;
    println!("Catalog saved: {} ({} bytes)", path.display(), body.len());
    Ok(())
}

/// Download every filtered catalog row not yet in the history.
pub fn execute(config: &PackConfig, args: DownloadArgs) -> Result<()> {
    let cache = config.cache_path();
    let csv_path = args.csv.unwrap_or_else(|| cache.join(CATALOG_FILE));
    let csv = std::fs::read_to_string(&csv_path).with_context(|| {
        format!(
            "Failed to read catalog {} (run `ambient fetch-catalog` first)",
            csv_path.display()
        )
    })?;

    let rows = parse_catalog(&csv, &config.download_filter);
    let history_path = config.download_history_path();
    let mut history = HistoryCache::load(&history_path)
        .with_context(|| format!("Failed to read history: {}", history_path.display()))?;
    let pending: Vec<&CatalogRow> = rows.iter().filter(|r| !history.contains(&r.name)).collect();

    println!(
        "{} materials match '{}', {} already downloaded, {} to go",
        rows.len(),
        config.download_filter,
        rows.len() - pending.len(),
        pending.len()
    );

    std::fs::create_dir_all(&cache)
        .with_context(|| format!("Failed to create cache directory: {}", cache.display()))?;
    let client = client()?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut downloaded = 0;
    let mut failed = 0;

    for row in pending.into_iter().take(limit) {
        if downloaded + failed > 0 {
            std::thread::sleep(DOWNLOAD_PAUSE);
        }
        tracing::info!(material = %row.name, url = %row.url, "Downloading");
        match download_one(&client, row, &cache) {
            Ok(path) => {
                history.record(&row.name).with_context(|| {
                    format!("Failed to update history: {}", history_path.display())
                })?;
                tracing::debug!(material = %row.name, path = %path.display(), "Saved");
                downloaded += 1;
            }
            Err(e) => {
                tracing::warn!(material = %row.name, error = %format!("{e:#}"), "Download failed");
                failed += 1;
            }
        }
    }

    println!("Downloaded {} materials ({} failed)", downloaded, failed);
    Ok(())
}

fn download_one(
    client: &reqwest::blocking::Client,
    row: &CatalogRow,
    cache: &Path,
) -> Result<PathBuf> {
    let body = fetch(client, &row.url)?;
    let path = zip_path(cache, &row.name);
    let partial = path.with_extension("zip.part");
    std::fs::write(&partial, &body)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    std::fs::rename(&partial, &path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(path)
}

pub fn zip_path(cache: &Path, name: &str) -> PathBuf {
    cache.join(format!("{name}.zip"))
}

/// Rows of the catalog CSV whose line contains `filter`.
///
/// Columns are split on plain commas; the name is column 0 and the download
/// link column 5. Rows with too few columns are skipped.
pub fn parse_catalog(csv: &str, filter: &str) -> Vec<CatalogRow> {
    csv.lines()
        .filter(|line| line.contains(filter))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split(',').collect();
            let name = columns.get(NAME_COLUMN)?.trim().trim_matches('"');
            let url = columns.get(LINK_COLUMN)?.trim().trim_matches('"');
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(CatalogRow {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
assetId,downloadAttribute,filetype,size,downloadLink,rawLink
Gravel033,1K-JPG,zip,100,x,https://ambientcg.com/get?file=Gravel033_1K-JPG.zip
Gravel033,4K-PNG,zip,900,x,https://ambientcg.com/get?file=Gravel033_4K-PNG.zip
Bricks001,4K-PNG,zip,800,x,https://ambientcg.com/get?file=Bricks001_4K-PNG.zip
Broken,4K-PNG,zip
";

    #[test]
    fn test_parse_catalog_filters_rows() {
        let rows = parse_catalog(CSV, "4K-PNG");
        assert_eq!(
            rows,
            vec![
                CatalogRow {
                    name: "Gravel033".to_string(),
                    url: "https://ambientcg.com/get?file=Gravel033_4K-PNG.zip".to_string(),
                },
                CatalogRow {
                    name: "Bricks001".to_string(),
                    url: "https://ambientcg.com/get?file=Bricks001_4K-PNG.zip".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_catalog_other_filter() {
        let rows = parse_catalog(CSV, "1K-JPG");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Gravel033");
    }

    #[test]
    fn test_zip_path() {
        assert_eq!(
            zip_path(Path::new("cache"), "Gravel033"),
            PathBuf::from("cache/Gravel033.zip")
        );
    }
}
