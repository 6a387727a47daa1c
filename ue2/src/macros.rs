/// Declares a struct whose wire layout is its field list, in order.
///
/// Generates the struct itself plus [`Encode`](crate::Encode) and
/// [`Decode`](crate::Decode) impls that visit the fields top to bottom.
/// Reordering fields changes the wire format.
#[macro_export]
macro_rules! wire_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Encode for $name {
            fn encode<B: $crate::bytes::BufMut>(&self, buf: &mut B) -> $crate::CodecResult<()> {
                $( $crate::Encode::encode(&self.$field, buf)?; )*
                Ok(())
            }
        }

        impl $crate::Decode for $name {
            fn decode<B: $crate::bytes::Buf>(buf: &mut B) -> $crate::CodecResult<Self> {
                // struct expressions evaluate their fields in source order
                Ok(Self {
                    $( $field: <$ty as $crate::Decode>::decode(buf)?, )*
                })
            }
        }
    };
}
