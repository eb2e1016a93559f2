use std::fmt;

use num_bigint::BigInt;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use super::decimal::{format_scaled, parse_scaled};
use super::layout::{FieldKind, FieldSpec};
use crate::error::Result;

/// Decoded value of one field
///
/// Serialized as a string so large integers survive JSON consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(BigInt),
    Decimal { unscaled: BigInt, scale: u32 },
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Self::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Rebuild a value from its rendered form using the field definition
    pub(crate) fn from_rendered(spec: &FieldSpec, text: String) -> Result<Self> {
        match (spec.kind, spec.scale) {
            (FieldKind::Text, _) => Ok(Self::Text(text)),
            (_, 0) => Ok(Self::Integer(parse_scaled(&text, 0)?)),
            (_, scale) => Ok(Self::Decimal {
                unscaled: parse_scaled(&text, scale)?,
                scale,
            }),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Decimal { unscaled, scale } => f.write_str(&format_scaled(unscaled, *scale)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One decoded record; fields keep layout order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainframeRecord {
    record_number: u64,
    fields: Vec<(String, FieldValue)>,
    raw: Vec<u8>,
}

impl MainframeRecord {
    pub(crate) fn new(record_number: u64, fields: Vec<(String, FieldValue)>, raw: Vec<u8>) -> Self {
        Self {
            record_number,
            fields,
            raw,
        }
    }

    /// Zero-based position in the batch
    pub fn record_number(&self) -> u64 {
        self.record_number
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of the raw record bytes; empty for records reopened from storage
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.iter().map(|(_, value)| value)
    }
}

struct OrderedFields<'a>(&'a [(String, FieldValue)]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for MainframeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MainframeRecord", 2)?;
        state.serialize_field("record_number", &self.record_number)?;
        state.serialize_field("fields", &OrderedFields(&self.fields))?;
        state.end()
    }
}
