//! Session token authentication
//!
//! Tokens are derived, never stored: `HMAC-SHA256(secret, session_id)` encoded
//! as unpadded base64url. With no secret configured authentication is off.

mod token;

pub use token::{SessionToken, TokenAuthenticator};
