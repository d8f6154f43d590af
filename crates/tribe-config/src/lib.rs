//! TribeFlow configuration loading and validation.
//!
//! This crate provides:
//! - Typed `HyperParams` for a training run
//! - Config resolution (CLI → env → defaults)
//! - Semantic validation that fails before any worker starts

pub mod hyper;
pub mod resolve;
pub mod validate;

pub use hyper::{HyperParams, KernelFamily, PairingPolicy, PairingTopology};
pub use resolve::{resolve_hyper_params, ConfigSource, ResolvedHyperParams};
pub use validate::{validate_against_trace, validate_hyper_params, ValidationError, ValidationResult};
