//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across Waveguide. `SecretString`
//! redacts itself in `Debug`, so a config struct holding the JWT signing
//! secret can derive or hand-write `Debug` without leaking it, and the value is
//! zeroized on drop. Reading the value requires an explicit
//! [`ExposeSecret::expose_secret`] call.
//!
//! Use `SecretString` for the token signing secret, user passwords in request
//! bodies, and bearer tokens held outside the request path.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let signing_secret = SecretString::from("correct-horse-battery-staple");
//! assert!(!format!("{signing_secret:?}").contains("horse"));
//! assert_eq!(signing_secret.expose_secret().len(), 28);
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
