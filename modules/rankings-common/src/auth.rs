use std::fmt;

use crate::error::{RankingError, Result};

/// The single server-held credential guarding operator writes.
///
/// No identity, no expiry. Compared in constant time.
#[derive(Clone)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(RankingError::Config("shared secret must not be empty".into()));
        }
        Ok(Self(secret))
    }

    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }

    /// `Ok(())` on match, [`RankingError::Unauthorized`] otherwise.
    pub fn verify(&self, presented: &str) -> Result<()> {
        if self.matches(presented) {
            Ok(())
        } else {
            Err(RankingError::Unauthorized)
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret(<{} chars>)", self.0.len())
    }
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
