//! Helpers shared across resource implementations.
pub mod fs;
