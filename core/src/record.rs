//! Generated record format
//!
//! One record holds the per-channel slices of one fitted sample.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Magic: "APRC" (4 bytes)                  │
//! ├──────────────────────────────────────────┤
//! │  GeneratedRecord (bitcode serialized)     │
//! │  └── fields: Vec<RecordField>             │
//! │      ├── name: String                     │
//! │      ├── channels / height / width: u32   │
//! │      └── data: Vec<u8>   ← planar C×H×W   │
//! └──────────────────────────────────────────┘
//! ```

use bitcode::{Decode, Encode};

use crate::error::{PackError, Result};
use crate::tensor::ChannelArray;

pub const RECORD_MAGIC: &[u8; 4] = b"APRC";

/// Store key of sample `index` of `material`.
pub fn record_key(material: &str, index: usize) -> String {
    format!("{material}_{index}")
}

/// One channel slice of a record.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RecordField {
    pub name: String,
    pub channels: u32,
    pub height: u32,
    pub width: u32,
    pub data: Vec<u8>,
}

impl RecordField {
    pub fn to_array(&self) -> Option<ChannelArray> {
        ChannelArray::from_raw(
            self.channels as usize,
            self.height as usize,
            self.width as usize,
            self.data.clone(),
        )
    }
}

/// Per-channel slices of one fitted sample, in layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct GeneratedRecord {
    pub fields: Vec<RecordField>,
}

impl GeneratedRecord {
    pub fn from_slices(slices: Vec<(String, ChannelArray)>) -> Self {
        let fields = slices
            .into_iter()
            .map(|(name, array)| {
                let (c, h, w) = array.shape();
                RecordField {
                    name,
                    channels: c as u32,
                    height: h as u32,
                    width: w as u32,
                    data: array.into_raw(),
                }
            })
            .collect();
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<ChannelArray> {
        self.field(name).and_then(RecordField::to_array)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Serialize with the magic header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = RECORD_MAGIC.to_vec();
        bytes.extend(bitcode::encode(self));
        bytes
    }

    /// Deserialize and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 || &bytes[0..4] != RECORD_MAGIC {
            return Err(PackError::CorruptRecord("bad magic bytes".to_string()));
        }
        let record: GeneratedRecord = bitcode::decode(&bytes[4..])
            .map_err(|e| PackError::CorruptRecord(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Checks every field's data length against its shape and that all fields
    /// share one resolution.
    pub fn validate(&self) -> Result<()> {
        for field in &self.fields {
            let expected = field.channels as usize * field.height as usize * field.width as usize;
            if field.data.len() != expected {
                return Err(PackError::CorruptRecord(format!(
                    "field '{}' has {} bytes, expected {}",
                    field.name,
                    field.data.len(),
                    expected
                )));
            }
        }
        let mismatched = self.fields.first().is_some_and(|first| {
            self.fields
                .iter()
                .any(|f| f.height != first.height || f.width != first.width)
        });
        if mismatched {
            return Err(PackError::CorruptRecord(
                "fields disagree on resolution".to_string(),
            ));
        }
        Ok(())
    }
}
