pub mod random;
pub mod seq;

use shortbin_core::ShortId;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

/// Trait for generating short identifiers.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is probabilistic; callers that persist the result must handle
/// a storage conflict.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortId;

    /// Number of characters every generated identifier has.
    fn length(&self) -> usize;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self) -> ShortId {
        (**self).generate()
    }

    fn length(&self) -> usize {
        (**self).length()
    }
}
