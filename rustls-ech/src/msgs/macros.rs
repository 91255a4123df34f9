/// Defines a wire enum over an unsigned integer type.
///
/// Every generated enum has an `Unknown` variant carrying values outside the
/// listed set, so decoding never fails on an unrecognised code point.
macro_rules! enum_builder {
    (
        $(#[doc = $comment:literal])*
        #[repr($uint:ty)]
        $enum_vis:vis enum $enum_name:ident
        {
          $( $enum_var:ident => $enum_val:literal),* $(,)?
        }
    ) => {
        $(#[doc = $comment])*
        #[non_exhaustive]
        #[allow(non_camel_case_types)]
        #[derive(PartialEq, Eq, Hash, Clone, Copy)]
        $enum_vis enum $enum_name {
            $( #[allow(missing_docs)] $enum_var ),*
            ,#[allow(missing_docs)] Unknown($uint)
        }

        impl $enum_name {
            // NOTE(allow) generated irrespective if there are callers
            #[allow(dead_code)]
            $enum_vis fn to_array(self) -> [u8; core::mem::size_of::<$uint>()] {
                <$uint>::from(self).to_be_bytes()
            }

            /// Whether this value is one of the listed code points.
            #[allow(dead_code)]
            $enum_vis fn is_known(&self) -> bool {
                !matches!(self, $enum_name::Unknown(_))
            }
        }

        impl crate::msgs::codec::Codec<'_> for $enum_name {
            fn encode(&self, bytes: &mut alloc::vec::Vec<u8>) {
                crate::msgs::codec::Codec::encode(&<$uint>::from(*self), bytes);
            }

            fn read(
                r: &mut crate::msgs::codec::Reader<'_>,
            ) -> Result<Self, crate::error::InvalidMessage> {
                match <$uint as crate::msgs::codec::Codec>::read(r) {
                    Ok(x) => Ok($enum_name::from(x)),
                    Err(_) => Err(crate::error::InvalidMessage::MissingData(stringify!($enum_name))),
                }
            }
        }

        impl From<$uint> for $enum_name {
            fn from(x: $uint) -> Self {
                match x {
                    $($enum_val => $enum_name::$enum_var,)*
                    x => $enum_name::Unknown(x),
                }
            }
        }

        impl From<$enum_name> for $uint {
            fn from(value: $enum_name) -> Self {
                match value {
                    $( $enum_name::$enum_var => $enum_val,)*
                    $enum_name::Unknown(x) => x
                }
            }
        }

        impl core::fmt::Debug for $enum_name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $( $enum_name::$enum_var => f.write_str(stringify!($enum_var)), )*
                    _ => write!(f, "{}(0x{:x?})", stringify!($enum_name), <$uint>::from(*self)),
                }
            }
        }
    };
}
