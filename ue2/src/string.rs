//! Length-prefixed strings.
//!
//! The length is an [`Index`](crate::Index) counting units including the NUL
//! terminator. A positive length is followed by that many Latin-1 bytes, a
//! negative one by `-length` UTF-16LE code units. Zero means an empty string
//! with no body at all.

use crate::{ensure_remaining, read_index, write_index, CodecError, CodecResult, Decode, Encode};
use bytes::{Buf, BufMut};

/// Upper bound on the unit count of a single string, checked before any
/// buffer is allocated.
pub const MAX_STRING_UNITS: usize = 0x1_0000;

/// Maps Latin-1 bytes onto the matching Unicode scalar values.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub(crate) fn check_length(length: i32) -> CodecResult<usize> {
    let units = length.unsigned_abs() as usize;
    if units > MAX_STRING_UNITS {
        return Err(CodecError::LengthOutOfRange {
            length: i64::from(length),
            limit: MAX_STRING_UNITS,
        });
    }
    Ok(units)
}

/// Reads a plain string. A trailing NUL unit is dropped; invalid UTF-16 is
/// replaced with U+FFFD.
pub fn read_string<B: Buf>(buf: &mut B) -> CodecResult<String> {
    let length = read_index(buf)?;
    if length == 0 {
        return Ok(String::new());
    }

    let units = check_length(length)?;

    if length > 0 {
        ensure_remaining(buf, units)?;
        let mut raw = vec![0u8; units];
        buf.copy_to_slice(&mut raw);
        if raw.last() == Some(&0) {
            raw.pop();
        }
        return Ok(latin1_to_string(&raw));
    }

    ensure_remaining(buf, units * 2)?;
    let mut wide = Vec::with_capacity(units);
    for _ in 0..units {
        wide.push(buf.get_u16_le());
    }
    if wide.last() == Some(&0) {
        wide.pop();
    }
    Ok(String::from_utf16_lossy(&wide))
}

/// Writes a plain string, as Latin-1 when every character fits and as
/// UTF-16 otherwise.
pub fn write_string<B: BufMut>(buf: &mut B, value: &str) -> CodecResult<()> {
    if value.is_empty() {
        return write_index(buf, 0);
    }

    if value.contains('\0') {
        return Err(CodecError::Unencodable {
            ch: '\0',
            reason: "strings are NUL-terminated",
        });
    }

    if value.chars().all(|c| u32::from(c) <= 0xff) {
        let length = value.chars().count() + 1;
        write_index(buf, wire_length(length)?)?;
        for c in value.chars() {
            buf.put_u8(u32::from(c) as u8);
        }
        buf.put_u8(0);
    } else {
        let wide: Vec<u16> = value.encode_utf16().collect();
        write_index(buf, -wire_length(wide.len() + 1)?)?;
        for unit in wide {
            buf.put_u16_le(unit);
        }
        buf.put_u16_le(0);
    }

    Ok(())
}

pub(crate) fn wire_length(units: usize) -> CodecResult<i32> {
    if units > MAX_STRING_UNITS {
        return Err(CodecError::LengthOutOfRange {
            length: units as i64,
            limit: MAX_STRING_UNITS,
        });
    }
    Ok(units as i32)
}

impl Encode for String {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        write_string(buf, self)
    }
}

impl Encode for str {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        write_string(buf, self)
    }
}

impl Decode for String {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        read_string(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{from_bytes, to_bytes};

    #[test]
    fn test_empty_string_is_single_zero_byte() {
        assert_eq!(to_bytes("").unwrap().as_ref(), &[0x00]);
        assert_eq!(from_bytes::<String>(&[0x00]), Ok(String::new()));
    }

    #[test]
    fn test_latin1_string() {
        let bytes = to_bytes("TEST").unwrap();
        assert_eq!(bytes.as_ref(), &[0x05, b'T', b'E', b'S', b'T', 0x00]);
        assert_eq!(from_bytes::<String>(&bytes), Ok("TEST".to_string()));
    }

    #[test]
    fn test_high_latin1_characters_stay_single_byte() {
        let bytes = to_bytes("72°F").unwrap();
        assert_eq!(bytes.as_ref(), &[0x05, b'7', b'2', 0xb0, b'F', 0x00]);
        assert_eq!(from_bytes::<String>(&bytes), Ok("72°F".to_string()));
    }

    #[test]
    fn test_unicode_string_uses_negative_length() {
        let bytes = to_bytes("Ω").unwrap();
        assert_eq!(bytes.as_ref(), &[0x82, 0xa9, 0x03, 0x00, 0x00]);
        assert_eq!(from_bytes::<String>(&bytes), Ok("Ω".to_string()));
    }

    #[test]
    fn test_round_trip_mixed_strings() {
        for s in ["a", "DM-Rankin", "Ünïcödé", "日本語", "emoji 🎮", "x".repeat(300).as_str()] {
            let bytes = to_bytes(s).unwrap();
            assert_eq!(from_bytes::<String>(&bytes).as_deref(), Ok(s));
        }
    }

    #[test]
    fn test_missing_terminator_is_tolerated() {
        assert_eq!(
            from_bytes::<String>(&[0x02, b'o', b'k']),
            Ok("ok".to_string())
        );
    }

    #[test]
    fn test_huge_negative_length_is_rejected_before_allocation() {
        // -INDEX_MAX code units
        let result = from_bytes::<String>(&[0xff, 0xff, 0xff, 0x7f]);
        assert!(matches!(
            result,
            Err(CodecError::LengthOutOfRange { length, .. }) if length == -(crate::INDEX_MAX as i64)
        ));
    }

    #[test]
    fn test_negative_length_beyond_buffer_is_truncated() {
        let result = from_bytes::<String>(&[0x84, 0x41, 0x00]);
        assert_eq!(
            result,
            Err(CodecError::Truncated {
                needed: 8,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_positive_length_beyond_buffer_is_truncated() {
        let result = from_bytes::<String>(&[0x0a, b'a', b'b']);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_embedded_nul_is_unencodable() {
        assert!(matches!(
            to_bytes("a\0b"),
            Err(CodecError::Unencodable { ch: '\0', .. })
        ));
    }
}
