//! Record store
//!
//! A store is a directory holding one SQLite database ([`DATABASE_FILE`]) with
//! a `records` table (key → encoded [`GeneratedRecord`]) and a `meta` table
//! describing the build.
//!
//! # Access model
//!
//! - Exactly one [`StoreWriter`] at a time. Writes go into an open
//!   transaction that the caller commits in batches.
//! - Any number of [`StoreReader`]s once the writer has closed. Readers open
//!   the database read-only, memory-mapped and without file locking, which
//!   suits offline batch consumption. Readers must not coexist with a writer.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{PackError, Result};
use crate::record::GeneratedRecord;
use crate::tensor::FloatArray;

pub const DATABASE_FILE: &str = "records.db";
pub const STORE_FORMAT_VERSION: u32 = 1;

const META_BUILD_KEY: &str = "build";

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS records (
        key   BLOB PRIMARY KEY,
        value BLOB NOT NULL
    ) WITHOUT ROWID;
    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );";

/// Build parameters persisted alongside the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub format_version: u32,
    /// [height, width]
    pub resolution: [usize; 2],
    pub fitting_method: String,
    pub samples_per_material: usize,
    pub channels: Vec<String>,
}

pub fn database_path(store_dir: &Path) -> PathBuf {
    store_dir.join(DATABASE_FILE)
}

pub fn store_exists(store_dir: &Path) -> bool {
    database_path(store_dir).is_file()
}

// ============================================================================
// Writer
// ============================================================================

/// Exclusive, transaction-batched writer.
///
/// Dropping a writer without [`StoreWriter::finish`] discards everything
/// since the last [`StoreWriter::commit`].
pub struct StoreWriter {
    conn: Connection,
    path: PathBuf,
    pending: usize,
}

impl StoreWriter {
    /// Open (or create) the store at `store_dir` and begin a transaction.
    ///
    /// An existing store is opened as-is; keys written later replace keys
    /// already present.
    pub fn open(store_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(store_dir)?;
        let conn = Connection::open(database_path(store_dir))?;
        conn.execute_batch(
            "PRAGMA journal_mode = DELETE;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(Self {
            conn,
            path: store_dir.to_path_buf(),
            pending: 0,
        })
    }

    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.conn
            .prepare_cached("INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)")?
            .execute(params![key.as_bytes(), value])?;
        self.pending += 1;
        Ok(())
    }

    /// Commit the open transaction and start a new one.
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT; BEGIN TRANSACTION")?;
        tracing::debug!(records = self.pending, store = %self.path.display(), "Committed batch");
        self.pending = 0;
        Ok(())
    }

    pub fn write_meta(&mut self, meta: &StoreMeta) -> Result<()> {
        let json = serde_json::to_string(meta)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![META_BUILD_KEY, json],
        )?;
        Ok(())
    }

    /// Final commit, then close the database.
    pub fn finish(self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.conn.close().map_err(|(_, e)| PackError::Store(e))?;
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reader configuration.
///
/// The defaults describe a single offline consumer: no file locking and a
/// large memory map. Not intended for concurrent service workloads.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Use SQLite file locking. Off by default; the store is immutable once built.
    pub lock: bool,
    /// Bytes of the database file to memory-map (0 disables mmap).
    pub mmap_size: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            lock: false,
            mmap_size: 1 << 30,
        }
    }
}

/// Read-only view of a built store.
pub struct StoreReader {
    conn: Connection,
    path: PathBuf,
    keys: Vec<String>,
    meta: Option<StoreMeta>,
    catalog: Catalog,
}

impl StoreReader {
    /// Open with default options and the built-in catalog.
    pub fn open(store_dir: &Path) -> Result<Self> {
        Self::open_with(store_dir, ReaderOptions::default(), Catalog::builtin())
    }

    /// Open read-only and enumerate keys once.
    ///
    /// `catalog` supplies channel counts for zero-filled secondary channels.
    pub fn open_with(store_dir: &Path, options: ReaderOptions, catalog: Catalog) -> Result<Self> {
        let db_path = database_path(store_dir);
        if !db_path.is_file() {
            return Err(PackError::StoreNotFound(store_dir.to_path_buf()));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(sqlite_uri(&db_path, options.lock), flags)?;
        conn.execute_batch(&format!("PRAGMA mmap_size = {};", options.mmap_size))?;

        let keys = {
            let mut stmt = conn.prepare("SELECT key FROM records ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;
            rows.map(|r| r.map(|k| String::from_utf8_lossy(&k).into_owned()))
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let meta = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_BUILD_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .and_then(|json| serde_json::from_str(&json).ok());

        tracing::debug!(store = %store_dir.display(), keys = keys.len(), "Opened store");

        Ok(Self {
            conn,
            path: store_dir.to_path_buf(),
            keys,
            meta,
            catalog,
        })
    }

    /// Keys in byte order, as enumerated at open time.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn meta(&self) -> Option<&StoreMeta> {
        self.meta.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fetch_record(&self, key: &str) -> Result<GeneratedRecord> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .prepare_cached("SELECT value FROM records WHERE key = ?1")?
            .query_row(params![key.as_bytes()], |row| row.get(0))
            .optional()?;
        let bytes = bytes.ok_or_else(|| PackError::UnknownRecord(key.to_string()))?;
        GeneratedRecord::from_bytes(&bytes)
    }

    /// Fetch `primary` and `secondary` from the record at `key` as f32 arrays.
    ///
    /// `primary` must be present. A missing `secondary` is replaced by zeros of
    /// shape (catalog channel count, H, W) where (H, W) is the record
    /// resolution.
    pub fn fetch_pair(
        &self,
        key: &str,
        primary: &str,
        secondary: &str,
    ) -> Result<(FloatArray, FloatArray)> {
        let record = self.fetch_record(key)?;
        let a = record
            .get(primary)
            .ok_or_else(|| PackError::MissingChannel {
                key: key.to_string(),
                channel: primary.to_string(),
            })?;

        let b = match record.get(secondary) {
            Some(b) => b.to_f32(),
            None => {
                let channels = self.catalog.channel_count(secondary)?;
                let (height, width) = self
                    .meta
                    .as_ref()
                    .map(|m| (m.resolution[0], m.resolution[1]))
                    .unwrap_or((a.height(), a.width()));
                FloatArray::zeros(channels, height, width)
            }
        };

        Ok((a.to_f32(), b))
    }
}

/// `file:` URI for a read-only open; `immutable=1` disables locking.
fn sqlite_uri(db_path: &Path, lock: bool) -> String {
    let escaped = db_path
        .to_string_lossy()
        .replace('%', "%25")
        .replace('?', "%3f")
        .replace('#', "%23");
    if lock {
        format!("file:{escaped}?mode=ro")
    } else {
        format!("file:{escaped}?mode=ro&immutable=1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ChannelArray;
    use tempfile::tempdir;

    fn record_with(fields: &[(&str, usize)]) -> GeneratedRecord {
        GeneratedRecord::from_slices(
            fields
                .iter()
                .map(|&(name, c)| {
                    let array = ChannelArray::from_raw(c, 4, 4, vec![7; c * 16]).unwrap();
                    (name.to_string(), array)
                })
                .collect(),
        )
    }

    fn meta() -> StoreMeta {
        StoreMeta {
            format_version: STORE_FORMAT_VERSION,
            resolution: [4, 4],
            fitting_method: "RESIZE".to_string(),
            samples_per_material: 1,
            channels: vec!["base_color".to_string()],
        }
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempdir().unwrap();
        let err = StoreReader::open(&dir.path().join("missing")).err().unwrap();
        assert!(matches!(err, PackError::StoreNotFound(_)));
    }

    #[test]
    fn test_write_then_read_keys_in_order() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");

        let mut writer = StoreWriter::open(&store).unwrap();
        let bytes = record_with(&[("base_color", 3)]).to_bytes();
        writer.put("b_0", &bytes).unwrap();
        writer.put("a_1", &bytes).unwrap();
        writer.commit().unwrap();
        writer.put("a_0", &bytes).unwrap();
        writer.write_meta(&meta()).unwrap();
        writer.finish().unwrap();

        let reader = StoreReader::open(&store).unwrap();
        assert_eq!(reader.keys(), &["a_0", "a_1", "b_0"]);
        assert_eq!(reader.meta(), Some(&meta()));
    }

    #[test]
    fn test_uncommitted_writes_are_discarded() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");

        let mut writer = StoreWriter::open(&store).unwrap();
        let bytes = record_with(&[("base_color", 3)]).to_bytes();
        writer.put("kept_0", &bytes).unwrap();
        writer.commit().unwrap();
        writer.put("lost_0", &bytes).unwrap();
        drop(writer);

        let reader = StoreReader::open(&store).unwrap();
        assert_eq!(reader.keys(), &["kept_0"]);
    }

    #[test]
    fn test_fetch_pair_zero_fills_secondary() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        let mut writer = StoreWriter::open(&store).unwrap();
        writer
            .put("m_0", &record_with(&[("canonical_render", 3), ("roughness", 1)]).to_bytes())
            .unwrap();
        writer.finish().unwrap();

        let reader = StoreReader::open(&store).unwrap();
        let (a, b) = reader.fetch_pair("m_0", "canonical_render", "normal").unwrap();
        assert_eq!(a.shape(), (3, 4, 4));
        assert!(a.as_slice().iter().all(|&v| v == 7.0));
        assert_eq!(b.shape(), (3, 4, 4));
        assert!(b.as_slice().iter().all(|&v| v == 0.0));

        let (_, rough) = reader.fetch_pair("m_0", "canonical_render", "roughness").unwrap();
        assert_eq!(rough.shape(), (1, 4, 4));
    }

    #[test]
    fn test_fetch_pair_missing_primary() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        let mut writer = StoreWriter::open(&store).unwrap();
        writer.put("m_0", &record_with(&[("roughness", 1)]).to_bytes()).unwrap();
        writer.finish().unwrap();

        let reader = StoreReader::open(&store).unwrap();
        let err = reader.fetch_pair("m_0", "canonical_render", "roughness").unwrap_err();
        assert!(matches!(
            err,
            PackError::MissingChannel { ref channel, .. } if channel == "canonical_render"
        ));
        // Other requests keep working
        assert!(reader.fetch_record("m_0").is_ok());
    }

    #[test]
    fn test_fetch_unknown_key() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        StoreWriter::open(&store).unwrap().finish().unwrap();

        let reader = StoreReader::open(&store).unwrap();
        assert!(reader.is_empty());
        let err = reader.fetch_record("nope_0").unwrap_err();
        assert!(matches!(err, PackError::UnknownRecord(_)));
    }

    #[test]
    fn test_metadata_error_is_not_a_corrupt_record() {
        let err: PackError = serde_json::from_str::<StoreMeta>("{").unwrap_err().into();
        assert!(matches!(err, PackError::Metadata(_)));
        assert!(err.to_string().starts_with("store metadata error"));
    }

    #[test]
    fn test_sqlite_uri_escaping() {
        let uri = sqlite_uri(Path::new("/data/a?b#c%d/records.db"), false);
        assert_eq!(uri, "file:/data/a%3fb%23c%25d/records.db?mode=ro&immutable=1");
        assert!(sqlite_uri(Path::new("/x/records.db"), true).ends_with("?mode=ro"));
    }
}
