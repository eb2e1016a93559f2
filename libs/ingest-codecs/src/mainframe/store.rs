//! Versioned storage envelope for decoded batches
//!
//! Records are stored positionally in layout order together with the layout
//! name and fingerprint, so a batch can only be reopened with the exact
//! layout that produced it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::layout::CopybookLayout;
use super::record::{FieldValue, MainframeRecord};
use crate::error::{CodecError, Result};

pub const STORED_BATCH_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record_number: u64,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBatch {
    pub format_version: u32,
    pub layout_name: String,
    pub layout_fingerprint: String,
    pub records: Vec<StoredRecord>,
}

impl StoredBatch {
    pub fn seal(layout: &CopybookLayout, records: &[MainframeRecord]) -> Self {
        let records = records
            .iter()
            .map(|record| StoredRecord {
                record_number: record.record_number(),
                values: record.values().map(ToString::to_string).collect(),
            })
            .collect();

        Self {
            format_version: STORED_BATCH_VERSION,
            layout_name: layout.name().to_string(),
            layout_fingerprint: layout.fingerprint().to_string(),
            records,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CodecError::Protocol(format!("Cannot serialize stored batch: {e}")))
    }

    /// Parse an envelope and rebuild its records against `layout`
    pub fn open(bytes: &[u8], layout: &CopybookLayout) -> Result<Vec<MainframeRecord>> {
        let batch: StoredBatch = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::Protocol(format!("Invalid stored batch: {e}")))?;
        batch.into_records(layout)
    }

    pub fn into_records(self, layout: &CopybookLayout) -> Result<Vec<MainframeRecord>> {
        if self.format_version != STORED_BATCH_VERSION {
            return Err(CodecError::Protocol(format!(
                "Unsupported stored batch version {}",
                self.format_version
            )));
        }
        if self.layout_name != layout.name() || self.layout_fingerprint != layout.fingerprint() {
            return Err(CodecError::LayoutMismatch {
                expected: format!("{}@{}", layout.name(), layout.fingerprint()),
                actual: format!("{}@{}", self.layout_name, self.layout_fingerprint),
            });
        }

        debug!(
            "Opening {} stored records for layout {}",
            self.records.len(),
            layout.name()
        );
        self.records
            .into_iter()
            .map(|stored| {
                if stored.values.len() != layout.fields().len() {
                    return Err(CodecError::Protocol(format!(
                        "Stored record {} has {} values, layout has {} fields",
                        stored.record_number,
                        stored.values.len(),
                        layout.fields().len()
                    )));
                }
                let fields = layout
                    .fields()
                    .iter()
                    .zip(stored.values)
                    .map(|(spec, text)| Ok((spec.name.clone(), FieldValue::from_rendered(spec, text)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(MainframeRecord::new(stored.record_number, fields, Vec::new()))
            })
            .collect()
    }
}
