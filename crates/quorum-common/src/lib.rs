//! Shared types for the Quorum workspace: entity structs and error types.

pub mod entities;
pub mod error;

pub use error::{QuorumError, Result};
