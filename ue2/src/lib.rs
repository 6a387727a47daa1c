//! # UE2 wire codec
//!
//! Encoding and decoding for the binary format spoken by Unreal Engine 2
//! game servers on their UDP query port. The same primitives appear in the
//! engine's package files.
//!
//! ## Primitives
//!
//! - Fixed-width integers (`i8`/`u8`/`i16`/`u16`/`i32`/`u32`), little-endian.
//! - [`Index`]: a variable-length signed integer of at most 27 magnitude bits
//!   packed into 1 to 4 bytes.
//! - `String`: an index length prefix followed either by NUL-terminated
//!   Latin-1 bytes (positive length) or NUL-terminated UTF-16LE code units
//!   (negative length).
//! - [`ColorizedString`]: a Latin-1 string with inline `0x1B r g b` color
//!   escapes, decoded into plain text plus a list of [`ColorMarker`]s.
//! - Fixed byte arrays and nested structs, with no framing of their own.
//!
//! ## Layouts
//!
//! Structured messages are plain Rust structs whose [`Encode`] and
//! [`Decode`] impls visit fields in declaration order. That order is the wire
//! contract. The [`wire_struct!`] macro declares a struct and both impls in
//! one go:
//!
//! ```rust
//! use ue2::{wire_struct, Index};
//!
//! wire_struct! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Import {
//!         pub class_package: Index,
//!         pub class_name: Index,
//!         pub package: u32,
//!         pub object_name: Index,
//!     }
//! }
//!
//! let import = Import { class_package: Index(1), class_name: Index(-2), package: 7, object_name: Index(300) };
//! let bytes = ue2::to_bytes(&import).unwrap();
//! let back: Import = ue2::from_bytes(&bytes).unwrap();
//! assert_eq!(back, import);
//! ```
//!
//! ## Robustness
//!
//! Decoding never panics. Short reads, malformed escapes and absurd length
//! prefixes surface as [`CodecError`] values so a single bad datagram cannot
//! take down whoever is reading it.

#[macro_use]
mod macros;

pub mod color;
pub mod error;
pub mod index;
pub mod primitives;
pub mod string;

pub use bytes;
pub use color::{strip_colors, ColorMarker, ColorizedString, Rgb, COLOR_ESCAPE};
pub use error::{CodecError, CodecResult};
pub use index::{read_index, write_index, Index, INDEX_MAX};
pub use string::{latin1_to_string, read_string, write_string, MAX_STRING_UNITS};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::marker::PhantomData;

/// A value with a wire representation.
pub trait Encode {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()>;
}

/// A value that can be read back from its wire representation.
pub trait Decode: Sized {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self>;
}

/// Encodes a value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> CodecResult<Bytes> {
    let mut buf = BytesMut::new();
    value.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Decodes a single value from the start of `data`. Trailing bytes are ignored.
pub fn from_bytes<T: Decode>(mut data: &[u8]) -> CodecResult<T> {
    T::decode(&mut data)
}

/// Decodes `T` repeatedly until `data` is exhausted.
///
/// The stream ends cleanly when the buffer is empty on a record boundary. A
/// record cut short yields one `Err` and then the iterator is fused.
pub fn records<T: Decode>(data: &[u8]) -> Records<'_, T> {
    Records {
        data,
        failed: false,
        _marker: PhantomData,
    }
}

/// Iterator returned by [`records`].
pub struct Records<'a, T> {
    data: &'a [u8],
    failed: bool,
    _marker: PhantomData<T>,
}

impl<T: Decode> Iterator for Records<'_, T> {
    type Item = CodecResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.data.has_remaining() {
            return None;
        }

        let result = T::decode(&mut self.data);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Fails with [`CodecError::Truncated`] unless `needed` bytes remain.
pub(crate) fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> CodecResult<()> {
    let remaining = buf.remaining();
    if remaining < needed {
        return Err(CodecError::Truncated { needed, remaining });
    }
    Ok(())
}
