use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CodecError, Result};

/// Storage format of one copybook field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// PIC X, EBCDIC characters
    #[serde(alias = "char")]
    Text,
    /// PIC S9 DISPLAY, one digit per byte, sign in the final zone
    #[serde(alias = "zoned")]
    ZonedDecimal,
    /// COMP-3, two digits per byte, sign in the final nibble
    #[serde(alias = "comp3", alias = "packed")]
    PackedDecimal,
    /// COMP, big-endian two's complement
    Binary,
    /// COMP, big-endian unsigned
    BinaryUnsigned,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Decimal digits the field can hold for a given byte length
    pub fn max_digits(self, length: usize) -> Option<usize> {
        match self {
            Self::Text => None,
            Self::ZonedDecimal => Some(length),
            Self::PackedDecimal => Some((length * 2).saturating_sub(1)),
            Self::Binary | Self::BinaryUnsigned => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub kind: FieldKind,
    /// Implied decimal places
    #[serde(default, alias = "decimal_places")]
    pub scale: u32,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, offset: usize, length: usize, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            kind,
            scale: 0,
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// One past the last byte; saturates on specs a layout would reject
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }
}

#[derive(Deserialize)]
struct RawLayout {
    name: String,
    record_length: usize,
    fields: Vec<FieldSpec>,
}

impl TryFrom<RawLayout> for CopybookLayout {
    type Error = CodecError;

    fn try_from(raw: RawLayout) -> Result<Self> {
        Self::new(raw.name, raw.record_length, raw.fields)
    }
}

/// Validated fixed-width record layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLayout")]
pub struct CopybookLayout {
    name: String,
    record_length: usize,
    fields: Vec<FieldSpec>,
    #[serde(skip)]
    fingerprint: String,
}

impl CopybookLayout {
    pub fn new(name: impl Into<String>, record_length: usize, fields: Vec<FieldSpec>) -> Result<Self> {
        let mut layout = Self {
            name: name.into(),
            record_length,
            fields,
            fingerprint: String::new(),
        };
        layout.validate()?;
        layout.fingerprint = layout.compute_fingerprint()?;
        Ok(layout)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_length(&self) -> usize {
        self.record_length
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Bytes a record must have to cover every field
    pub fn extent(&self) -> usize {
        self.fields.iter().map(FieldSpec::end).max().unwrap_or(0)
    }

    /// Lowercase hex SHA-256 of the layout's canonical JSON
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CodecError::layout("Layout name cannot be empty"));
        }
        if self.record_length == 0 {
            return Err(CodecError::layout(format!(
                "Layout {}: record length must be greater than zero",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(CodecError::layout(format!("Layout {} has no fields", self.name)));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(CodecError::layout(format!(
                    "Layout {}: field at offset {} has no name",
                    self.name, field.offset
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CodecError::layout(format!(
                    "Layout {}: duplicate field {}",
                    self.name, field.name
                )));
            }
            if field.length == 0 {
                return Err(CodecError::layout(format!(
                    "Field {}: length must be greater than zero",
                    field.name
                )));
            }
            let end = field.offset.checked_add(field.length).ok_or_else(|| {
                CodecError::layout(format!(
                    "Field {}: offset {} + length {} overflows",
                    field.name, field.offset, field.length
                ))
            })?;
            if end > self.record_length {
                return Err(CodecError::layout(format!(
                    "Field {}: bytes {}..{} exceed record length {}",
                    field.name, field.offset, end, self.record_length
                )));
            }
            match field.kind {
                FieldKind::Binary | FieldKind::BinaryUnsigned
                    if !matches!(field.length, 1 | 2 | 4 | 8) =>
                {
                    return Err(CodecError::layout(format!(
                        "Field {}: binary width must be 1, 2, 4 or 8 bytes, got {}",
                        field.name, field.length
                    )));
                },
                FieldKind::Text if field.scale > 0 => {
                    return Err(CodecError::layout(format!(
                        "Field {}: text fields cannot have a scale",
                        field.name
                    )));
                },
                _ => {},
            }
        }
        Ok(())
    }

    fn compute_fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)
            .map_err(|e| CodecError::layout(format!("Cannot serialize layout: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
