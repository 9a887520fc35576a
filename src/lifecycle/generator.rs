//! Ticket token generation.
//!
//! Tokens are `prefix + base64url(random bytes)` drawn from the OS CSPRNG.
//! Uniqueness is not assumed: the store enforces it at insert time and the
//! caller re-draws on `DuplicateToken`, up to `max_attempts` times.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::TicketError;

/// 9 bytes renders to 12 URL-safe characters (72 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 9;
/// Never issue fewer than 64 random bits.
pub const MIN_TOKEN_BYTES: usize = 8;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const MAX_PREFIX_LEN: usize = 32;

/// Source of random bytes. `OsRng` in production; tests substitute a fixed sequence.
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]);
}

pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

pub struct TokenGenerator {
    entropy: Box<dyn EntropySource>,
    token_bytes: usize,
    max_attempts: u32,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BYTES, DEFAULT_MAX_ATTEMPTS)
    }
}

impl TokenGenerator {
    pub fn new(token_bytes: usize, max_attempts: u32) -> Self {
        Self::with_entropy(Box::new(OsEntropy), token_bytes, max_attempts)
    }

    pub fn with_entropy(
        entropy: Box<dyn EntropySource>,
        token_bytes: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            entropy,
            token_bytes: token_bytes.max(MIN_TOKEN_BYTES),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn token_bytes(&self) -> usize {
        self.token_bytes
    }

    /// Draw one candidate token. The prefix must already be validated.
    pub fn generate(&self, prefix: &str) -> String {
        let mut buf = vec![0u8; self.token_bytes];
        self.entropy.fill(&mut buf);
        let body = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&buf);
        format!("{}{}", prefix, body)
    }
}

/// Prefixes end up in a URL path segment, so only unreserved characters are allowed.
pub fn validate_prefix(prefix: &str) -> Result<(), TicketError> {
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(TicketError::InvalidPrefix(format!(
            "prefix longer than {} characters",
            MAX_PREFIX_LEN
        )));
    }
    if let Some(c) = prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(TicketError::InvalidPrefix(format!(
            "character {:?} is not URL-safe",
            c
        )));
    }
    Ok(())
}
