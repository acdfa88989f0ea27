//! Hashing primitives shared across the crate.

mod hash;

pub use hash::{ActionHasher, HASH_SIZE, Hash, HashParseError, hex};
