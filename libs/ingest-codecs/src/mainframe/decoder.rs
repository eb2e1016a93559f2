use serde::{Deserialize, Serialize};
use tracing::trace;

use super::decimal::{decode_binary, decode_packed, decode_zoned};
use super::ebcdic::{decode_cp037, EBCDIC_SPACE};
use super::layout::{CopybookLayout, FieldKind, FieldSpec};
use super::record::{FieldValue, MainframeRecord};
use crate::error::{CodecError, Result};

/// Record decoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Reject unmapped EBCDIC bytes instead of substituting U+FFFD
    pub strict: bool,
    /// Strip trailing EBCDIC spaces from text fields
    pub trim_text: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict: true,
            trim_text: true,
        }
    }
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }
}

/// Stateless record decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordDecoder {
    options: DecodeOptions,
}

impl RecordDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode one record slab
    pub fn decode(&self, record_number: u64, raw: &[u8], layout: &CopybookLayout) -> Result<MainframeRecord> {
        let extent = layout.extent();
        if raw.len() < extent {
            return Err(CodecError::TruncatedRecord {
                record_number,
                expected: extent,
                actual: raw.len(),
            });
        }

        let fields = layout
            .fields()
            .iter()
            .map(|spec| {
                let value = self.decode_field(spec, &raw[spec.offset..spec.end()])?;
                Ok((spec.name.clone(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        trace!("Record {} decoded: {} fields", record_number, fields.len());
        Ok(MainframeRecord::new(record_number, fields, raw.to_vec()))
    }

    fn decode_field(&self, spec: &FieldSpec, bytes: &[u8]) -> Result<FieldValue> {
        let unscaled = match spec.kind {
            FieldKind::Text => {
                let bytes = if self.options.trim_text {
                    let end = bytes
                        .iter()
                        .rposition(|&b| b != EBCDIC_SPACE)
                        .map_or(0, |pos| pos + 1);
                    &bytes[..end]
                } else {
                    bytes
                };
                let text = decode_cp037(bytes, &spec.name, spec.offset, self.options.strict)?;
                return Ok(FieldValue::Text(text));
            },
            FieldKind::ZonedDecimal => decode_zoned(bytes, &spec.name, spec.offset)?,
            FieldKind::PackedDecimal => decode_packed(bytes, &spec.name, spec.offset)?,
            FieldKind::Binary => decode_binary(bytes, true),
            FieldKind::BinaryUnsigned => decode_binary(bytes, false),
        };

        Ok(match spec.scale {
            0 => FieldValue::Integer(unscaled),
            scale => FieldValue::Decimal { unscaled, scale },
        })
    }
}

/// Decode a single record with record number 0
pub fn decode_record(raw: &[u8], layout: &CopybookLayout, options: &DecodeOptions) -> Result<MainframeRecord> {
    RecordDecoder::new(*options).decode(0, raw, layout)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn layout() -> CopybookLayout {
        CopybookLayout::new(
            "TEST",
            12,
            vec![
                FieldSpec::new("NAME", 0, 4, FieldKind::Text),
                FieldSpec::new("QTY", 4, 3, FieldKind::ZonedDecimal),
                FieldSpec::new("AMT", 7, 3, FieldKind::PackedDecimal).with_scale(2),
                FieldSpec::new("FLAGS", 10, 2, FieldKind::BinaryUnsigned),
            ],
        )
        .unwrap()
    }

    fn raw() -> Vec<u8> {
        vec![
            0xC1, 0xC2, 0x40, 0x40, // "AB  "
            0xF1, 0xF2, 0xD3, // -123
            0x12, 0x34, 0x5D, // -123.45
            0x01, 0x00, // 256
        ]
    }

    #[test]
    fn test_decode_all_kinds() {
        let record = decode_record(&raw(), &layout(), &DecodeOptions::default()).unwrap();

        assert_eq!(record.get("NAME").unwrap().as_text(), Some("AB"));
        assert_eq!(record.get("QTY").unwrap().as_integer(), Some(&BigInt::from(-123)));
        assert_eq!(record.get("AMT").unwrap().to_string(), "-123.45");
        assert_eq!(record.get("FLAGS").unwrap().as_integer(), Some(&BigInt::from(256)));
        assert_eq!(record.raw(), &raw()[..]);
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_trim_can_be_disabled() {
        let options = DecodeOptions {
            trim_text: false,
            ..DecodeOptions::default()
        };
        let record = decode_record(&raw(), &layout(), &options).unwrap();
        assert_eq!(record.get("NAME").unwrap().as_text(), Some("AB  "));
    }

    #[test]
    fn test_short_raw_is_truncated() {
        let err = decode_record(&raw()[..11], &layout(), &DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedRecord {
                expected: 12,
                actual: 11,
                ..
            }
        ));
    }

    #[test]
    fn test_strict_and_lenient_text() {
        let mut data = raw();
        data[1] = 0x07;

        let err = decode_record(&data, &layout(), &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, CodecError::Encoding { offset: 1, byte: 0x07, .. }));

        let record = decode_record(&data, &layout(), &DecodeOptions::lenient()).unwrap();
        assert_eq!(record.get("NAME").unwrap().as_text(), Some("A\u{FFFD}"));
    }

    #[test]
    fn test_numeric_fields_ignore_text_table() {
        // 0x01 has no CP037 mapping but is a valid packed digit pair
        let mut data = raw();
        data[7] = 0x01;
        let record = decode_record(&data, &layout(), &DecodeOptions::default()).unwrap();
        assert_eq!(record.get("AMT").unwrap().to_string(), "-13.45");
    }
}
