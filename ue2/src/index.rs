//! Variable-length signed index ("compact index").
//!
//! ```text
//! byte 1: S M x x x x x x   S = sign, M = more, x = magnitude bits 0..6
//! byte 2: M x x x x x x x   magnitude bits 6..13
//! byte 3: M x x x x x x x   magnitude bits 13..20
//! byte 4: 0 x x x x x x x   magnitude bits 20..27
//! ```
//!
//! Magnitudes above 27 bits are rejected in both directions rather than
//! silently wrapped.

use crate::{ensure_remaining, CodecError, CodecResult, Decode, Encode};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Largest magnitude an index can carry.
pub const INDEX_MAX: i32 = (1 << 27) - 1;

const SIGN: u8 = 0x80;
const FIRST_MORE: u8 = 0x40;
const MORE: u8 = 0x80;

/// A signed integer carried in the variable-length index encoding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Index(pub i32);

impl From<i32> for Index {
    fn from(value: i32) -> Self {
        Index(value)
    }
}

impl From<Index> for i32 {
    fn from(index: Index) -> Self {
        index.0
    }
}

/// Writes `value` using the minimal number of bytes.
pub fn write_index<B: BufMut>(buf: &mut B, value: i32) -> CodecResult<()> {
    let magnitude = value.unsigned_abs();
    if magnitude > INDEX_MAX as u32 {
        return Err(CodecError::IndexOutOfRange {
            value: i64::from(value),
        });
    }

    let mut rest = magnitude >> 6;
    let mut first = (magnitude & 0x3f) as u8;
    if value < 0 {
        first |= SIGN;
    }
    if rest != 0 {
        first |= FIRST_MORE;
    }
    buf.put_u8(first);

    while rest != 0 {
        let mut byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest != 0 {
            byte |= MORE;
        }
        buf.put_u8(byte);
    }

    Ok(())
}

/// Reads an index. Non-minimal encodings are accepted.
pub fn read_index<B: Buf>(buf: &mut B) -> CodecResult<i32> {
    ensure_remaining(buf, 1)?;
    let first = buf.get_u8();

    let negative = first & SIGN != 0;
    let mut value = i32::from(first & 0x3f);
    let mut more = first & FIRST_MORE != 0;
    let mut shift = 6;

    while more {
        ensure_remaining(buf, 1)?;
        let byte = buf.get_u8();

        if shift == 20 {
            // The fourth byte has no continuation bit.
            if byte & MORE != 0 {
                return Err(CodecError::IndexOutOfRange {
                    value: i64::from(value | i32::from(byte & 0x7f) << 20) + (1 << 27),
                });
            }
            value |= i32::from(byte) << 20;
            break;
        }

        value |= i32::from(byte & 0x7f) << shift;
        more = byte & MORE != 0;
        shift += 7;
    }

    Ok(if negative { -value } else { value })
}

impl Encode for Index {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        write_index(buf, self.0)
    }
}

impl Decode for Index {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        read_index(buf).map(Index)
    }
}
