//! COBOL numeric storage: zoned decimal, packed decimal (COMP-3), binary
//!
//! Values are accumulated in `BigInt` so 18+ digit fields never overflow.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};

use crate::error::{CodecError, Result};

const ZONE_DIGIT: u8 = 0x0F;
const SIGN_POSITIVE: u8 = 0x0C;
const SIGN_NEGATIVE: u8 = 0x0D;

/// `Some(true)` for a negative sign nibble, `Some(false)` for positive
fn sign_nibble(nibble: u8) -> Option<bool> {
    match nibble {
        0x0D | 0x0B => Some(true),
        0x0C | 0x0F | 0x0A | 0x0E => Some(false),
        _ => None,
    }
}

fn digit(nibble: u8, field: &str, offset: usize) -> Result<u32> {
    if nibble > 9 {
        return Err(CodecError::InvalidDigit {
            field: field.to_string(),
            offset,
            nibble,
        });
    }
    Ok(u32::from(nibble))
}

fn push_digit(value: &mut BigInt, digit: u32) {
    *value *= 10u32;
    *value += digit;
}

/// Decode a zoned decimal field
///
/// `base_offset` is the field offset within the record, used in errors.
pub fn decode_zoned(bytes: &[u8], field: &str, base_offset: usize) -> Result<BigInt> {
    let Some((&last, body)) = bytes.split_last() else {
        return Err(CodecError::layout(format!("Field {field}: empty zoned field")));
    };

    // Only the final zone is significant; leading zones vary between producers
    let mut value = BigInt::zero();
    for (i, &byte) in body.iter().enumerate() {
        push_digit(&mut value, digit(byte & 0x0F, field, base_offset + i)?);
    }

    let offset = base_offset + body.len();
    push_digit(&mut value, digit(last & 0x0F, field, offset)?);
    let negative = matches!(last >> 4, 0x0D | 0x0B);

    Ok(if negative { -value } else { value })
}

/// Decode a packed decimal (COMP-3) field
pub fn decode_packed(bytes: &[u8], field: &str, base_offset: usize) -> Result<BigInt> {
    let Some((&last, body)) = bytes.split_last() else {
        return Err(CodecError::layout(format!("Field {field}: empty packed field")));
    };

    let mut value = BigInt::zero();
    for (i, &byte) in body.iter().enumerate() {
        push_digit(&mut value, digit(byte >> 4, field, base_offset + i)?);
        push_digit(&mut value, digit(byte & 0x0F, field, base_offset + i)?);
    }

    let offset = base_offset + body.len();
    push_digit(&mut value, digit(last >> 4, field, offset)?);
    let negative = sign_nibble(last & 0x0F).ok_or_else(|| CodecError::InvalidSign {
        field: field.to_string(),
        nibble: last & 0x0F,
    })?;

    Ok(if negative { -value } else { value })
}

/// Decode a big-endian binary field of any width
pub fn decode_binary(bytes: &[u8], signed: bool) -> BigInt {
    if signed {
        BigInt::from_signed_bytes_be(bytes)
    } else {
        BigInt::from_bytes_be(Sign::Plus, bytes)
    }
}

fn digits_for(value: &BigInt, max_digits: usize, length: usize) -> Result<Vec<u8>> {
    let digits = value.abs().to_string();
    if digits.len() > max_digits {
        return Err(CodecError::layout(format!(
            "Value {} does not fit in {} bytes",
            value, length
        )));
    }
    let mut out = vec![0u8; max_digits - digits.len()];
    out.extend(digits.bytes().map(|b| b - b'0'));
    Ok(out)
}

/// Encode a packed decimal field with canonical sign nibbles
pub fn encode_packed(value: &BigInt, length: usize) -> Result<Vec<u8>> {
    if length == 0 {
        return Err(CodecError::layout("Packed field length must be greater than zero"));
    }
    let mut nibbles = digits_for(value, length * 2 - 1, length)?;
    nibbles.push(if value.is_negative() {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    });

    Ok(nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

/// Encode a zoned decimal field with canonical sign zones
pub fn encode_zoned(value: &BigInt, length: usize) -> Result<Vec<u8>> {
    if length == 0 {
        return Err(CodecError::layout("Zoned field length must be greater than zero"));
    }
    let digits = digits_for(value, length, length)?;
    let sign = if value.is_negative() {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    };

    let last = digits.len() - 1;
    Ok(digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let zone = if i == last { sign } else { ZONE_DIGIT };
            (zone << 4) | d
        })
        .collect())
}

/// Render an unscaled integer with `scale` implied decimal places
pub fn format_scaled(unscaled: &BigInt, scale: u32) -> String {
    let scale = scale as usize;
    let mut digits = unscaled.abs().to_string();
    if scale == 0 {
        return unscaled.to_string();
    }
    if digits.len() <= scale {
        digits = format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits);
    }
    let (int_part, frac_part) = digits.split_at(digits.len() - scale);
    let sign = if unscaled.is_negative() { "-" } else { "" };
    format!("{sign}{int_part}.{frac_part}")
}

/// Parse a rendered decimal back to its unscaled integer
pub fn parse_scaled(text: &str, scale: u32) -> Result<BigInt> {
    let invalid = || CodecError::Protocol(format!("Invalid decimal {text:?} for scale {scale}"));
    let scale = scale as usize;

    let unscaled = match text.split_once('.') {
        Some((int_part, frac_part)) if frac_part.len() == scale && scale > 0 => {
            format!("{int_part}{frac_part}")
        },
        None if scale == 0 => text.to_string(),
        _ => return Err(invalid()),
    };
    unscaled.parse::<BigInt>().map_err(|_| invalid())
}
