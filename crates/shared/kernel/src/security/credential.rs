use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

#[fgate_derive::fgate_error]
pub enum SecurityError {
    #[error("Invalid credential configuration{}: {message}", format_context(.context))]
    InvalidKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Verifies presented keys against the configured shared secret.
///
/// Only the SHA-256 digest of the secret is kept. Verification hashes the candidate and
/// compares digests without an early exit, so timing does not depend on the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyGate {
    digest: [u8; 32],
}

impl ApiKeyGate {
    /// # Errors
    /// [`SecurityError::InvalidKey`] if the key is empty or only whitespace.
    pub fn new(key: &str) -> Result<Self, SecurityError> {
        if key.trim().is_empty() {
            return Err(SecurityError::InvalidKey {
                message: "security.api_key must not be empty".into(),
                context: None,
            });
        }
        Ok(Self { digest: digest(key) })
    }

    /// `true` only when a key was presented and it matches.
    #[must_use]
    pub fn verify(&self, presented: Option<&str>) -> bool {
        let Some(presented) = presented else {
            return false;
        };
        let candidate = digest(presented);
        self.digest.iter().zip(candidate.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

impl fmt::Debug for ApiKeyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyGate").finish_non_exhaustive()
    }
}

fn digest(key: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(key.as_bytes()));
    out
}
