//! EBCDIC code page 037 (US/Canada)

use crate::error::{CodecError, Result};

/// EBCDIC space, the COBOL padding byte
pub const EBCDIC_SPACE: u8 = 0x40;

/// Unicode scalar for each CP037 byte; 0 marks an unmapped byte
const CP037: [u16; 256] = [
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, // 0_
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, // 1_
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, // 2_
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, // 3_
    0x0020, 0x00A0, 0x00E2, 0x00E4, 0x00E0, 0x00E1, 0x00E3, 0x00E5, 0x00E7, 0x00F1, 0x00A2, 0x002E, 0x003C, 0x0028, 0x002B, 0x007C, // 4_
    0x0026, 0x00E9, 0x00EA, 0x00EB, 0x00E8, 0x00ED, 0x00EE, 0x00EF, 0x00EC, 0x00DF, 0x0021, 0x0024, 0x002A, 0x0029, 0x003B, 0x00AC, // 5_
    0x002D, 0x002F, 0x00C2, 0x00C4, 0x00C0, 0x00C1, 0x00C3, 0x00C5, 0x00C7, 0x00D1, 0x00A6, 0x002C, 0x0025, 0x005F, 0x003E, 0x003F, // 6_
    0x00F8, 0x00C9, 0x00CA, 0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x0060, 0x003A, 0x0023, 0x0040, 0x0027, 0x003D, 0x0022, // 7_
    0x00D8, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067, 0x0068, 0x0069, 0x00AB, 0x00BB, 0x00F0, 0x00FD, 0x00FE, 0x00B1, // 8_
    0x00B0, 0x006A, 0x006B, 0x006C, 0x006D, 0x006E, 0x006F, 0x0070, 0x0071, 0x0072, 0x00AA, 0x00BA, 0x00E6, 0x00B8, 0x00C6, 0x00A4, // 9_
    0x00B5, 0x007E, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077, 0x0078, 0x0079, 0x007A, 0x00A1, 0x00BF, 0x00D0, 0x00DD, 0x00DE, 0x00AE, // A_
    0x005E, 0x00A3, 0x00A5, 0x00B7, 0x00A9, 0x00A7, 0x00B6, 0x00BC, 0x00BD, 0x00BE, 0x005B, 0x005D, 0x00AF, 0x00A8, 0x00B4, 0x00D7, // B_
    0x007B, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047, 0x0048, 0x0049, 0x00AD, 0x00F4, 0x00F6, 0x00F2, 0x00F3, 0x00F5, // C_
    0x007D, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F, 0x0050, 0x0051, 0x0052, 0x00B9, 0x00FB, 0x00FC, 0x00F9, 0x00FA, 0x00FF, // D_
    0x005C, 0x00F7, 0x0053, 0x0054, 0x0055, 0x0056, 0x0057, 0x0058, 0x0059, 0x005A, 0x00B2, 0x00D4, 0x00D6, 0x00D2, 0x00D3, 0x00D5, // E_
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037, 0x0038, 0x0039, 0x00B3, 0x00DB, 0x00DC, 0x00D9, 0x00DA, 0x0000, // F_
];

/// Map one byte, `None` for the control range and 0xFF
pub fn cp037_char(byte: u8) -> Option<char> {
    match CP037[usize::from(byte)] {
        0 => None,
        code => char::from_u32(u32::from(code)),
    }
}

/// Decode CP037 text
///
/// `base_offset` is the field's offset in the record and is only used for
/// error reporting. In lenient mode unmapped bytes become U+FFFD.
pub fn decode_cp037(bytes: &[u8], field: &str, base_offset: usize, strict: bool) -> Result<String> {
    let mut text = String::with_capacity(bytes.len());
    for (i, &byte) in bytes.iter().enumerate() {
        match cp037_char(byte) {
            Some(ch) => text.push(ch),
            None if strict => {
                return Err(CodecError::Encoding {
                    field: field.to_string(),
                    offset: base_offset + i,
                    byte,
                })
            },
            None => text.push(char::REPLACEMENT_CHARACTER),
        }
    }
    Ok(text)
}

/// Encode text to CP037 by reverse lookup
pub fn encode_cp037(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .enumerate()
        .map(|(i, ch)| {
            CP037
                .iter()
                .position(|&code| code != 0 && u32::from(code) == u32::from(ch))
                .and_then(|pos| u8::try_from(pos).ok())
                .ok_or_else(|| CodecError::Encoding {
                    field: format!("{:?}", ch),
                    offset: i,
                    byte: 0,
                })
        })
        .collect()
}

/// Encode text into a fixed-width field padded with EBCDIC spaces
pub fn encode_cp037_padded(text: &str, length: usize) -> Result<Vec<u8>> {
    let mut bytes = encode_cp037(text)?;
    if bytes.len() > length {
        return Err(CodecError::layout(format!(
            "Text {:?} does not fit in {} bytes",
            text, length
        )));
    }
    bytes.resize(length, EBCDIC_SPACE);
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_letters_digits_and_punctuation() {
        let bytes = [0xC1, 0xC3, 0xD4, 0xC5, 0x40, 0xF1, 0xF2, 0x4B, 0x5B];
        assert_eq!(decode_cp037(&bytes, "NAME", 0, true).unwrap(), "ACME 12.$");
        assert_eq!(cp037_char(0x81), Some('a'));
        assert_eq!(cp037_char(0x4A), Some('¢'));
    }

    #[test]
    fn test_unmapped_bytes() {
        assert_eq!(cp037_char(0x00), None);
        assert_eq!(cp037_char(0x3F), None);
        assert_eq!(cp037_char(0xFF), None);

        let err = decode_cp037(&[0xC1, 0x15], "NAME", 10, true).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Encoding {
                offset: 11,
                byte: 0x15,
                ..
            }
        ));

        let text = decode_cp037(&[0xC1, 0x15], "NAME", 10, false).unwrap();
        assert_eq!(text, "A\u{FFFD}");
    }

    #[test]
    fn test_encode_reverses_decode() {
        let text = "GREAT LAKES STEEL";
        let bytes = encode_cp037(text).unwrap();
        assert_eq!(bytes[0], 0xC7);
        assert_eq!(decode_cp037(&bytes, "T", 0, true).unwrap(), text);

        assert!(encode_cp037("\u{263A}").is_err());
        assert!(encode_cp037("\n").is_err());
    }

    #[test]
    fn test_padded_encoding() {
        assert_eq!(encode_cp037_padded("TX", 4).unwrap(), vec![0xE3, 0xE7, 0x40, 0x40]);
        assert!(encode_cp037_padded("TOO LONG", 3).is_err());
    }
}
