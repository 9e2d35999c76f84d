//! Common Utilities and Types Library
//! 
//! This crate provides identifiers and utilities shared by the simulated E2 node crates.

pub mod types;
pub mod utils;

use thiserror::Error;

// Re-export commonly used items
pub use types::*;
pub use utils::*;

/// Errors raised while constructing or parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid PLMN: {0}")]
    InvalidPlmn(String),

    #[error("{name} value {value} out of range (max {max})")]
    OutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },
}
