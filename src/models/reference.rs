//! Transfer reference numbers
//!
//! A reference number links the two legs of one transfer. It is generated from
//! a random UUID so concurrent callers never need to coordinate; uniqueness is
//! still enforced by the transaction log at append time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix used when none is configured
pub const DEFAULT_REFERENCE_PREFIX: &str = "TRF";

const MAX_REFERENCE_LEN: usize = 64;

/// Opaque token shared by both legs of a transfer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceNumber(String);

impl ReferenceNumber {
    /// Parse a reference number
    ///
    /// Accepts ASCII letters, digits and '-', up to 64 characters.
    pub fn parse(s: &str) -> Result<Self, ReferenceParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ReferenceParseError::Empty);
        }
        if s.len() > MAX_REFERENCE_LEN {
            return Err(ReferenceParseError::TooLong(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ReferenceParseError::InvalidCharacters(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReferenceNumber {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReferenceNumber {
    type Error = ReferenceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReferenceNumber> for String {
    fn from(reference: ReferenceNumber) -> Self {
        reference.0
    }
}

/// Source of fresh reference numbers
///
/// Implementations must be callable from many threads at once without
/// coordinating with each other.
pub trait ReferenceGenerator: Send + Sync {
    fn generate(&self) -> ReferenceNumber;
}

/// Generates `{prefix}-{32 uppercase hex digits}` from a random UUID v4
#[derive(Debug, Clone)]
pub struct UuidReferenceGenerator {
    prefix: String,
}

impl UuidReferenceGenerator {
    /// Create a generator with the given prefix
    ///
    /// The prefix is reduced to its ASCII alphanumeric characters and
    /// uppercased; an empty result falls back to the default prefix.
    pub fn new(prefix: &str) -> Self {
        let prefix: String = prefix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(16)
            .collect::<String>()
            .to_ascii_uppercase();

        if prefix.is_empty() {
            Self::default()
        } else {
            Self { prefix }
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for UuidReferenceGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
        }
    }
}

impl ReferenceGenerator for UuidReferenceGenerator {
    fn generate(&self) -> ReferenceNumber {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        ReferenceNumber(format!("{}-{}", self.prefix, hex))
    }
}

/// Error for malformed reference numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceParseError {
    Empty,
    TooLong(usize),
    InvalidCharacters(String),
}

impl fmt::Display for ReferenceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Reference number cannot be empty"),
            Self::TooLong(len) => write!(
                f,
                "Reference number too long ({} chars, max {})",
                len, MAX_REFERENCE_LEN
            ),
            Self::InvalidCharacters(s) => {
                write!(f, "Reference number '{}' contains invalid characters", s)
            }
        }
    }
}

impl std::error::Error for ReferenceParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_generated_format() {
        let reference = UuidReferenceGenerator::default().generate();
        let (prefix, hex) = reference.as_str().split_once('-').unwrap();
        assert_eq!(prefix, "TRF");
        assert_eq!(hex.len(), 32);
        assert!(hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_custom_prefix_is_normalised() {
        let generator = UuidReferenceGenerator::new("wire-x");
        assert_eq!(generator.prefix(), "WIREX");
        assert!(generator.generate().as_str().starts_with("WIREX-"));

        assert_eq!(UuidReferenceGenerator::new("--").prefix(), "TRF");
    }

    #[test]
    fn test_concurrent_generation_is_unique() {
        let generator = Arc::new(UuidReferenceGenerator::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || (0..500).map(|_| generator.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for reference in handle.join().unwrap() {
                assert!(seen.insert(reference));
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_parse() {
        assert!(ReferenceNumber::parse("TRF-ABC123").is_ok());
        assert_eq!(ReferenceNumber::parse("  "), Err(ReferenceParseError::Empty));
        assert!(matches!(
            ReferenceNumber::parse("TRF ABC"),
            Err(ReferenceParseError::InvalidCharacters(_))
        ));
        assert!(matches!(
            ReferenceNumber::parse(&"A".repeat(65)),
            Err(ReferenceParseError::TooLong(65))
        ));
    }

    #[test]
    fn test_serde_validates() {
        let reference: ReferenceNumber = serde_json::from_str("\"TRF-1\"").unwrap();
        assert_eq!(reference.as_str(), "TRF-1");
        assert!(serde_json::from_str::<ReferenceNumber>("\"\"").is_err());
    }
}
