//! Utilities
//!
//! Common utilities used throughout the engine.

pub mod error;
pub mod paths;

pub use error::*;
pub use paths::*;
