use crate::Generator;
use rand::distr::Alphanumeric;
use rand::Rng;
use shortbin_core::{ShortId, ShortIdPolicy};

/// Produces fixed-length identifiers drawn uniformly from `[0-9A-Za-z]`.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Uses the generation length of a short id policy.
    pub fn from_policy(policy: &ShortIdPolicy) -> Self {
        Self::new(policy.length())
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortId {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortId::new_unchecked(id)
    }

    fn length(&self) -> usize {
        self.length
    }
}
