//! Value conversion plumbing and the `args!` call-site helper.

/// Runs `$m` once per scalar kind that maps one-to-one onto a `Value` variant.
/// Arguments passed to callback:
/// 1. Variant
/// 2. Rust Type
/// 3. `as_*` accessor name
/// 4. Kind name used in errors
macro_rules! for_each_scalar {
    ($m:ident) => {
        $m!(Bool, bool, as_bool, "bool");
        $m!(S64,  i64,  as_s64,  "s64");
        $m!(U64,  u64,  as_u64,  "u64");
        $m!(F64,  f64,  as_f64,  "f64");
        $m!(Char, char, as_char, "char");
    };
}

/// Generates `From<$ty>`, `TryFrom<Value>` and a by-value accessor for a scalar.
macro_rules! scalar_conversions {
    ($var:ident, $ty:ty, $as_name:ident, $kind:literal) => {
        impl From<$ty> for crate::value::Value {
            fn from(v: $ty) -> Self {
                Self::$var(v)
            }
        }

        impl TryFrom<crate::value::Value> for $ty {
            type Error = crate::error::Error;

            fn try_from(value: crate::value::Value) -> crate::error::Result<Self> {
                match value {
                    crate::value::Value::$var(v) => Ok(v),
                    other => Err(crate::error::Error::TypeMismatch {
                        expected: $kind,
                        found: other.kind(),
                    }),
                }
            }
        }

        impl crate::value::Value {
            #[doc = concat!("Returns the inner `", stringify!($ty), "` if this is a `", $kind, "`.")]
            pub fn $as_name(&self) -> Option<$ty> {
                match self {
                    Self::$var(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

pub(crate) use for_each_scalar;
pub(crate) use scalar_conversions;

/// Builds an argument list for a remote call.
///
/// ```
/// use tetherwire::{args, Value};
///
/// let args = args![1i64, "two", true];
/// assert_eq!(args, vec![Value::S64(1), Value::from("two"), Value::Bool(true)]);
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}
