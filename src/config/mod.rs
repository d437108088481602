//! # KilnDB Configuration Module
//!
//! Centralizes the tuning constants for the storage core. Constants that
//! depend on each other live together and their relationships are enforced
//! through compile-time assertions.
//!
//! ## Module Organization
//!
//! - [`constants`]: numeric configuration values with dependency notes

pub mod constants;
pub use constants::*;
