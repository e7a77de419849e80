//! Domain Models
//!
//! Core entities of the identity service. All entities use TSID (Crockford
//! Base32) string IDs and camelCase JSON.

pub mod identity;
pub mod platform;
pub mod user;
pub mod project;
pub mod invitation;
pub mod otp;
pub mod flag;
pub mod session;

pub use identity::*;
pub use platform::*;
pub use user::*;
pub use project::*;
pub use invitation::*;
pub use otp::*;
pub use flag::*;
pub use session::*;

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum stored
/// as SCREAMING_SNAKE_CASE text.
#[macro_export]
macro_rules! impl_str_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $ty {
            type Err = $crate::error::PlatformError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::error::PlatformError::internal(format!(
                        "Unknown {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}
