//! Shared types and utilities for rusty-cache.
//!
//! This crate provides common functionality used across all rusty-cache
//! crates:
//! - Shared tuning constants
//! - Cache version fingerprint computation
//! - Transfer progress tracking

pub mod constants;
pub mod progress;
pub mod version;

// Re-export commonly used items at crate root
pub use constants::*;
pub use progress::ProgressTracker;
pub use version::{compute_version, CompressionMethod};
