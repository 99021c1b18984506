//! # Callable interfaces
//!
//! [`Remote`] is the one entry point every call goes through: a name, an
//! argument list, optionally some staged transfers. Peers, workers, routers
//! and pools all implement it, so code written against `Remote` does not care
//! whether it talks to one worker or a pool.
//!
//! The [`interface!`](crate::interface) macro layers a typed wrapper on top,
//! with one method per declared function name.

use std::sync::Arc;

use tetherwire::TransferSet;
use tetherwire::Value;

use crate::deferred::Deferred;

/// Something that can forward a named call to a worker.
pub trait Remote {
    /// Forwards a call carrying the objects staged in `transfers`.
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred;

    /// Forwards a call with no transfers.
    fn call(&self, name: &str, args: Vec<Value>) -> Deferred {
        self.call_with(name, args, TransferSet::new())
    }
}

impl<T: Remote + ?Sized> Remote for Arc<T> {
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        (**self).call_with(name, args, transfers)
    }
}

impl<T: Remote + ?Sized> Remote for &T {
    fn call_with(&self, name: &str, args: Vec<Value>, transfers: TransferSet) -> Deferred {
        (**self).call_with(name, args, transfers)
    }
}

/// Declares a typed wrapper around any [`Remote`].
///
/// Each `fn name;` becomes a method forwarding to `Remote::call` under that
/// name. Use `fn name = "remote-name";` when the remote name is not a Rust
/// identifier. `FUNCTIONS` lists every declared remote name.
///
/// ```ignore
/// tether::interface! {
///     pub struct Math {
///         fn add;
///         fn square_root = "sqrt";
///     }
/// }
///
/// let math = Math::new(worker);
/// let three = math.add(tether::args![1i64, 2i64]).await?;
/// ```
#[macro_export]
macro_rules! interface {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( fn $func:ident $(= $remote:literal)? ; )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<R> {
            remote: R,
        }

        impl<R: $crate::Remote> $name<R> {
            pub const FUNCTIONS: &'static [&'static str] = &[
                $( $crate::__interface_name!($func $(, $remote)?) ),*
            ];

            pub fn new(remote: R) -> Self {
                Self { remote }
            }

            pub fn remote(&self) -> &R {
                &self.remote
            }

            pub fn into_remote(self) -> R {
                self.remote
            }

            $(
                pub fn $func(&self, args: ::std::vec::Vec<$crate::Value>) -> $crate::Deferred {
                    $crate::Remote::call(&self.remote, $crate::__interface_name!($func $(, $remote)?), args)
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __interface_name {
    ($func:ident) => { stringify!($func) };
    ($func:ident, $remote:literal) => { $remote };
}
