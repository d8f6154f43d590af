//! Hyperparameter validation errors and semantic validation.
//!
//! Everything here runs before any worker thread is spawned: a bad
//! configuration must never cost a partially trained run.

use crate::hyper::HyperParams;
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<ValidationError> for tribe_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                tribe_common::Error::InvalidHyperParams { field, message }
            }
            other => tribe_common::Error::Config(other.to_string()),
        }
    }
}

/// Validate hyperparameters semantically.
pub fn validate_hyper_params(params: &HyperParams) -> ValidationResult<()> {
    if params.n_topics == 0 {
        return Err(ValidationError::invalid("n_topics", "Must be at least 1"));
    }
    if params.n_iter == 0 {
        return Err(ValidationError::invalid("n_iter", "Must be at least 1"));
    }
    if params.burn_in > params.n_iter {
        return Err(ValidationError::invalid(
            "burn_in",
            format!("Must not exceed n_iter ({}), got {}", params.n_iter, params.burn_in),
        ));
    }
    if params.n_workers == 0 {
        return Err(ValidationError::invalid("n_workers", "Must be at least 1"));
    }
    if params.n_batches == 0 {
        return Err(ValidationError::invalid("n_batches", "Must be at least 1"));
    }
    if params.pairing.every == 0 {
        return Err(ValidationError::invalid("pairing.every", "Must be at least 1"));
    }

    validate_smoothing("alpha_zh", params.alpha_zh)?;
    validate_smoothing("beta_zs", params.beta_zs)?;
    validate_residency_priors(params)?;

    if params.average_posteriors && params.burn_in == params.n_iter {
        return Err(ValidationError::SemanticError(format!(
            "average_posteriors needs at least one post-burn-in iteration (n_iter={}, burn_in={})",
            params.n_iter, params.burn_in
        )));
    }

    Ok(())
}

/// Validate hyperparameters against the size of a loaded trace.
pub fn validate_against_trace(params: &HyperParams, n_events: usize) -> ValidationResult<()> {
    if n_events == 0 {
        return Err(ValidationError::SemanticError(
            "trace contains no events".to_string(),
        ));
    }
    if params.n_workers > n_events {
        return Err(ValidationError::invalid(
            "n_workers",
            format!(
                "Must not exceed the number of events ({}), got {}",
                n_events, params.n_workers
            ),
        ));
    }
    Ok(())
}

/// Dirichlet smoothing constants must be finite and positive.
fn validate_smoothing(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::invalid(
            field,
            format!("Must be positive and finite, got {}", value),
        ));
    }
    Ok(())
}

fn validate_residency_priors(params: &HyperParams) -> ValidationResult<()> {
    let priors = params.effective_residency_priors();
    let expected = params.kernel.prior_arity();
    if priors.len() != expected {
        return Err(ValidationError::invalid(
            "residency_priors",
            format!(
                "kernel {} takes {} priors, got {}",
                params.kernel,
                expected,
                priors.len()
            ),
        ));
    }
    if let Some(bad) = priors.iter().find(|p| !p.is_finite() || **p <= 0.0) {
        return Err(ValidationError::invalid(
            "residency_priors",
            format!("Must be positive and finite, got {}", bad),
        ));
    }
    Ok(())
}
