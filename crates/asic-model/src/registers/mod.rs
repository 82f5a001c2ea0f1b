//! Register address table and name lookup.

/// Static register table, name and address indexes.
pub mod map;

pub use map::{Register, RegisterMap, REGISTER_COUNT, REGISTER_SPACE_SIZE};
