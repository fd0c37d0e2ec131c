//! Publishers for redirect access events.

pub mod memory;
pub mod queued;
pub mod stream;

pub use memory::{MemorySink, NullSink};
pub use queued::QueuedSink;
pub use shortbin_core::events::{AccessEvent, EventSink, Result, Topic};
pub use shortbin_core::EventError;
pub use stream::{RedisStreamSettings, RedisStreamSink};
