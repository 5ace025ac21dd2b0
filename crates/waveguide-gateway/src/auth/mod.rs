//! Authentication module for the Waveguide gateway.
//!
//! # Components
//!
//! - `claims` - Claim set carried in identity tokens and the verified identity
//! - `codec` - HS512 token issuing and verification
//! - `password` - bcrypt password hashing
//! - `revocation` - Concurrent store of revoked tokens awaiting expiry

pub mod claims;
pub mod codec;
pub mod password;
pub mod revocation;

pub use claims::{Claims, Identity};
pub use codec::{IssuedToken, TokenCodec};
pub use revocation::RevocationStore;
