use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const DEFAULT_LENGTH: usize = 7;
pub const DEFAULT_MIN_LENGTH: usize = 6;
pub const DEFAULT_MAX_LENGTH: usize = 8;

/// A validated short identifier for a shortened URL.
///
/// Values are only produced by a [`ShortIdPolicy`] (for inbound requests),
/// by an identifier generator, or read back from storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    /// Creates a `ShortId` without validation.
    ///
    /// Use this only for identifiers produced by trusted internal sources
    /// (generators, rows read back from storage).
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Length rules for short identifiers.
///
/// `length` is what the generator produces; `[min_length, max_length]` is
/// the window accepted on the redirect path. Anything outside the window is
/// rejected before touching a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortIdPolicy {
    length: usize,
    min_length: usize,
    max_length: usize,
}

impl ShortIdPolicy {
    pub fn new(length: usize, min_length: usize, max_length: usize) -> Result<Self> {
        if length == 0 {
            return Err(CoreError::InvalidPolicy(
                "generation length must be positive".to_string(),
            ));
        }
        if min_length > max_length {
            return Err(CoreError::InvalidPolicy(format!(
                "min length {min_length} exceeds max length {max_length}"
            )));
        }
        if length < min_length || length > max_length {
            return Err(CoreError::InvalidPolicy(format!(
                "generation length {length} is outside [{min_length}, {max_length}]"
            )));
        }
        Ok(Self {
            length,
            min_length,
            max_length,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validates an inbound identifier.
    ///
    /// Accepted identifiers are within the length window and contain only
    /// ASCII alphanumerics, which is the alphabet the generator draws from.
    pub fn parse(&self, raw: &str) -> Result<ShortId> {
        let len = raw.len();
        if len < self.min_length || len > self.max_length {
            return Err(CoreError::InvalidShortId(format!(
                "length must be between {} and {}, got {}",
                self.min_length, self.max_length, len
            )));
        }

        if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidShortId(format!(
                "must contain only alphanumeric characters: '{raw}'"
            )));
        }

        Ok(ShortId(raw.to_string()))
    }
}

impl Default for ShortIdPolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}
