//! TribeFlow common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Run and worker identifiers
//! - The unified error type with stable codes and categories

pub mod error;
pub mod id;

pub use error::{Error, ErrorCategory, Result};
pub use id::{derive_seed, RunId, WorkerId};
