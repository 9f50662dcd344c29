//! Training-pair dataset over a built store

use std::collections::BTreeMap;

use crate::builder::build_store;
use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::store::{ReaderOptions, StoreReader, store_exists};
use crate::tensor::FloatArray;

/// (rendered channel, data channel)
pub type ChannelPair = (String, String);

/// Every active pair fetched for one record.
pub type Sample = BTreeMap<ChannelPair, (FloatArray, FloatArray)>;

type PostTransform = Box<dyn Fn(FloatArray) -> FloatArray + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct DatasetOptions {
    /// Replace the store even if it exists
    pub rebuild: bool,
    /// Build the store when it does not exist yet
    pub auto_build: bool,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            auto_build: true,
        }
    }
}

/// Random-access view of the records in a store as channel pairs.
pub struct PairDataset {
    reader: StoreReader,
    pairs: Vec<ChannelPair>,
    post_transform: Option<PostTransform>,
}

impl PairDataset {
    /// Validate `config`, build the store if needed, then open it.
    pub fn open(config: &PackConfig, options: DatasetOptions) -> Result<Self> {
        config.validate()?;
        let store_path = config.store_path();

        if options.rebuild || (options.auto_build && !store_exists(&store_path)) {
            build_store(&config.build_options(options.rebuild))?;
        }

        let reader =
            StoreReader::open_with(&store_path, ReaderOptions::default(), config.catalog())?;
        let pairs = config.active_pairs();
        tracing::info!(records = reader.len(), pairs = pairs.len(), "Opened dataset");

        Ok(Self {
            reader,
            pairs,
            post_transform: None,
        })
    }

    /// Apply `f` to each array of each pair returned by [`Self::get`].
    pub fn with_post_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(FloatArray) -> FloatArray + Send + Sync + 'static,
    {
        self.post_transform = Some(Box::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        self.reader.keys()
    }

    pub fn pairs(&self) -> &[ChannelPair] {
        &self.pairs
    }

    pub fn reader(&self) -> &StoreReader {
        &self.reader
    }

    pub fn get(&self, index: usize) -> Result<Sample> {
        let key = self.reader.keys().get(index).ok_or(PackError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;

        let mut sample = Sample::new();
        for (a, b) in &self.pairs {
            let (mut x, mut y) = self.reader.fetch_pair(key, a, b)?;
            if let Some(f) = &self.post_transform {
                x = f(x);
                y = f(y);
            }
            sample.insert((a.clone(), b.clone()), (x, y));
        }
        Ok(sample)
    }
}
