//! HMAC-derived session tokens

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// A token bound to one session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues and verifies session tokens.
///
/// Stateless: a pure function of `(secret, session_id)`.
#[derive(Clone)]
pub struct TokenAuthenticator {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TokenAuthenticator {
    /// Build an authenticator. An absent or empty secret disables auth.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    pub fn disabled() -> Self {
        Self { secret: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Issue the token for `session_id`, or `None` when auth is disabled.
    pub fn issue(&self, session_id: &str) -> Option<SessionToken> {
        let mac = self.mac_for(session_id)?;
        Some(SessionToken(
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()),
        ))
    }

    /// Check a presented token against `session_id`.
    ///
    /// Always true when auth is disabled. Otherwise the token must match
    /// `issue(session_id)` exactly; absent, empty, padded or undecodable
    /// tokens are rejected and the MAC comparison is constant time.
    pub fn verify(&self, session_id: &str, presented: Option<&str>) -> bool {
        let Some(mac) = self.mac_for(session_id) else {
            return true;
        };

        let Some(presented) = presented.filter(|t| !t.is_empty()) else {
            return false;
        };

        match URL_SAFE_NO_PAD.decode(presented) {
            Ok(bytes) => mac.verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// `Error::Unauthorized` unless `verify` passes.
    pub fn check(&self, session_id: &str, presented: Option<&str>) -> Result<()> {
        if self.verify(session_id, presented) {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    fn mac_for(&self, session_id: &str) -> Option<HmacSha256> {
        let secret = self.secret.as_ref()?;
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(session_id.as_bytes());
        Some(mac)
    }
}
