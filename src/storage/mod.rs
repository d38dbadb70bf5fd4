//! Storage implementations backing the list endpoints

pub mod in_memory;

pub use in_memory::{InMemoryBackend, InMemoryCollection, QuerySupport};
