//! Shared types for AIVerse

pub mod error;

pub use error::{AiverseError, Result};
