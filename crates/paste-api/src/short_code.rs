use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distr::Distribution;

pub const SHORT_CODE_LEN: usize = 21;

/// URL-safe alphabet: 64 symbols, so 21 of them carry 126 bits.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Opaque paste identifier: exactly [`SHORT_CODE_LEN`] alphabet symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    /// Draws a fresh code from the thread-local CSPRNG. Panics if the OS
    /// entropy source cannot seed it, which is unrecoverable for the service.
    pub fn generate() -> Self {
        rand::rng().sample(Generator)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ShortCode> for String {
    fn from(code: ShortCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not a valid short code")]
pub struct InvalidShortCode;

impl FromStr for ShortCode {
    type Err = InvalidShortCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SHORT_CODE_LEN || !s.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(InvalidShortCode);
        }
        Ok(Self(s.to_string()))
    }
}

pub struct Generator;

impl Distribution<ShortCode> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ShortCode {
        let code = (0..SHORT_CODE_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode(code)
    }
}
