//! Processed-material history
//!
//! Newline-delimited list of material names that a download or render pass
//! has already handled. Entries are appended and flushed one at a time so an
//! interrupted pass resumes where it stopped.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HistoryCache {
    path: PathBuf,
    names: HashSet<String>,
}

impl HistoryCache {
    /// Read the history at `path`. A missing file is an empty history.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let names = match std::fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_path_buf(),
            names,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Append `name` to the file. Already-recorded names are not written twice.
    pub fn record(&mut self, name: &str) -> std::io::Result<()> {
        if self.names.contains(name) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{name}")?;
        file.flush()?;
        self.names.insert(name.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
