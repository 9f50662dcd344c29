//! ambientproc core - Material texture dataset packing
//!
//! Turns directories of PBR texture images into fixed-resolution training
//! records stored in a key-value store, and serves them back as channel pairs.
//!
//! # Architecture
//!
//! - [`Catalog`] - Channel names, filename fragments and channel counts
//! - [`scan`] / [`assemble`] - Bind material files to channels and stack them
//! - [`Transform`] - Fitting to the training resolution
//! - [`build_store`] - Pack every material into the store
//! - [`StoreReader`] / [`PairDataset`] - Read records back as f32 pairs

pub mod assembler;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fitting;
pub mod history;
pub mod preflight;
pub mod record;
pub mod scanner;
pub mod store;
pub mod tensor;
#[cfg(test)]
mod test_utils;

pub use assembler::{AssembledSample, ChannelLayout, LayoutEntry, assemble};
pub use builder::{BuildOptions, BuildReport, SkippedMaterial, build_store, list_materials};
pub use catalog::{BUILTIN_CHANNELS, Catalog, ChannelSpec};
pub use config::{ConfigError, PackConfig};
pub use dataset::{ChannelPair, DatasetOptions, PairDataset, Sample};
pub use error::{PackError, Result};
pub use fitting::{FittingMethod, Resolution, Transform, build_transform};
pub use history::HistoryCache;
pub use preflight::MissingCapability;
pub use record::{GeneratedRecord, RecordField, record_key};
pub use scanner::{MatchPolicy, ScanResult, scan};
pub use store::{ReaderOptions, StoreMeta, StoreReader, StoreWriter};
pub use tensor::{ChannelArray, FloatArray};
