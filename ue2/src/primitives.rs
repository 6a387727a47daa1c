//! Fixed-width integers, byte arrays, tuples and sequences.

use crate::{ensure_remaining, CodecResult, Decode, Encode};
use bytes::{Buf, BufMut};

macro_rules! fixed_width {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
                    buf.$put(*self);
                    Ok(())
                }
            }

            impl Decode for $ty {
                fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
                    ensure_remaining(buf, std::mem::size_of::<$ty>())?;
                    Ok(buf.$get())
                }
            }
        )*
    };
}

fixed_width! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_le, get_u16_le;
    i16 => put_i16_le, get_i16_le;
    u32 => put_u32_le, get_u32_le;
    i32 => put_i32_le, get_i32_le;
}

impl<const N: usize> Encode for [u8; N] {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_slice(self);
        Ok(())
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, N)?;
        let mut out = [0u8; N];
        buf.copy_to_slice(&mut out);
        Ok(out)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        (**self).encode(buf)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        for item in self {
            item.encode(buf)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.as_slice().encode(buf)
    }
}

/// A sequence has no count on the wire, so it runs to the end of the buffer.
/// Only meaningful as the last field of a layout.
impl<T: Decode> Decode for Vec<T> {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut items = Vec::new();
        while buf.has_remaining() {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

impl<A: Encode, B2: Encode> Encode for (A, B2) {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.0.encode(buf)?;
        self.1.encode(buf)
    }
}

impl<A: Decode, B2: Decode> Decode for (A, B2) {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let first = A::decode(buf)?;
        let second = B2::decode(buf)?;
        Ok((first, second))
    }
}
