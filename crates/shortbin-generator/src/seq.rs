use crate::Generator;
use shortbin_core::ShortId;
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic generator using a sequential counter.
///
/// Produces `prefix` followed by a zero-padded counter, e.g. `sb00000`,
/// `sb00001`. Every id has the same length as long as the counter fits in
/// the padding. Handy for tests and single-node setups that want
/// predictable identifiers.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
    width: usize,
}

impl SeqGenerator {
    /// Creates a generator whose ids are `length` characters long.
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self::with_offset(prefix, length, 0)
    }

    /// Creates a generator starting from a specific counter value.
    ///
    /// Useful for resuming from a known state or distributing
    /// counter ranges across nodes.
    pub fn with_offset(prefix: impl Into<String>, length: usize, offset: u64) -> Self {
        let prefix = prefix.into();
        let width = length.saturating_sub(prefix.len());
        Self {
            counter: AtomicU64::new(offset),
            prefix,
            width,
        }
    }
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
            width: self.width,
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortId {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortId::new_unchecked(format!(
            "{}{:0width$}",
            self.prefix,
            count,
            width = self.width
        ))
    }

    fn length(&self) -> usize {
        self.prefix.len() + self.width
    }
}
