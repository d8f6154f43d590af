//! Training hyperparameters.
//!
//! A `HyperParams` value is created once before training and never mutated
//! while workers run. It can be built in code, or loaded from TOML/JSON:
//!
//! ```toml
//! n_topics = 20
//! n_iter = 500
//! burn_in = 100
//! n_workers = 4
//! kernel = "exponential"
//! residency_priors = [1.0, 1.0]
//!
//! [pairing]
//! topology = "random_matching"
//! every = 1
//! ```

use crate::validate::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Residency-time kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelFamily {
    /// Ignores dwell times entirely.
    Noop,
    /// Exponential survival per topic, Gamma(shape, rate) prior on the rate.
    #[default]
    Exponential,
    /// Lomax (shifted Pareto) survival per topic; priors `[shape, rate, scale]`.
    Pareto,
}

impl KernelFamily {
    /// Number of entries expected in `residency_priors`.
    pub fn prior_arity(&self) -> usize {
        match self {
            KernelFamily::Noop => 0,
            KernelFamily::Exponential => 2,
            KernelFamily::Pareto => 3,
        }
    }

    /// Priors used when the configuration leaves them empty.
    pub fn default_priors(&self) -> Vec<f64> {
        match self {
            KernelFamily::Noop => Vec::new(),
            KernelFamily::Exponential => vec![1.0, 1.0],
            KernelFamily::Pareto => vec![1.0, 1.0, 1.0],
        }
    }
}

impl std::str::FromStr for KernelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "noop" | "none" => Ok(KernelFamily::Noop),
            "exponential" | "exp" => Ok(KernelFamily::Exponential),
            "pareto" | "lomax" | "power_law" => Ok(KernelFamily::Pareto),
            _ => Err(format!("unknown kernel: {}", s)),
        }
    }
}

impl std::fmt::Display for KernelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelFamily::Noop => write!(f, "noop"),
            KernelFamily::Exponential => write!(f, "exponential"),
            KernelFamily::Pareto => write!(f, "pareto"),
        }
    }
}

/// Which workers get paired at a synchronization barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingTopology {
    /// Uniformly random perfect matching, redrawn every pairing round.
    #[default]
    RandomMatching,
    /// Fixed ring: even rounds pair (0,1),(2,3)…, odd rounds pair (1,2),(3,4)….
    Ring,
}

/// Pairing schedule: topology plus cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingPolicy {
    pub topology: PairingTopology,
    /// Pair workers after every `every`-th iteration; other barriers idle everyone.
    pub every: usize,
}

impl Default for PairingPolicy {
    fn default() -> Self {
        Self {
            topology: PairingTopology::RandomMatching,
            every: 1,
        }
    }
}

impl PairingPolicy {
    /// Whether the barrier closing `iteration` (0-based) runs a pairing round.
    pub fn pairs_at(&self, iteration: usize) -> bool {
        self.every > 0 && (iteration + 1) % self.every == 0
    }
}

/// Complete hyperparameter set for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperParams {
    pub n_topics: usize,
    pub n_iter: usize,
    /// Leading iterations excluded from averaged posteriors.
    pub burn_in: usize,
    /// Refit the residency kernel during training.
    pub dynamic: bool,
    /// Kernel refit cadence, in iterations.
    pub n_batches: usize,
    /// Dirichlet smoothing for topic given hyper-entity.
    pub alpha_zh: f64,
    /// Dirichlet smoothing for site given topic.
    pub beta_zs: f64,
    pub kernel: KernelFamily,
    pub residency_priors: Vec<f64>,
    pub random_seed: u64,
    pub n_workers: usize,
    pub pairing: PairingPolicy,
    /// Average posteriors over post-burn-in iterations instead of using the last one.
    pub average_posteriors: bool,
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            n_topics: 10,
            n_iter: 2000,
            burn_in: 300,
            dynamic: false,
            n_batches: 1,
            alpha_zh: 5.0,
            beta_zs: 0.001,
            kernel: KernelFamily::Exponential,
            residency_priors: Vec::new(),
            random_seed: 42,
            n_workers: 1,
            pairing: PairingPolicy::default(),
            average_posteriors: false,
        }
    }
}

impl HyperParams {
    /// Load from a `.toml` or `.json` file, chosen by extension.
    ///
    /// The result is not validated; call [`crate::validate_hyper_params`].
    pub fn from_path(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn from_toml_str(content: &str) -> ValidationResult<Self> {
        toml::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> ValidationResult<Self> {
        serde_json::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    pub fn with_topics(mut self, n_topics: usize) -> Self {
        self.n_topics = n_topics;
        self
    }

    pub fn with_iterations(mut self, n_iter: usize, burn_in: usize) -> Self {
        self.n_iter = n_iter;
        self.burn_in = burn_in;
        self
    }

    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    pub fn with_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    pub fn with_smoothing(mut self, alpha_zh: f64, beta_zs: f64) -> Self {
        self.alpha_zh = alpha_zh;
        self.beta_zs = beta_zs;
        self
    }

    /// Switch kernel family, resetting priors to that family's defaults.
    pub fn with_kernel(mut self, kernel: KernelFamily) -> Self {
        self.kernel = kernel;
        self.residency_priors = Vec::new();
        self
    }

    pub fn with_residency_priors(mut self, priors: Vec<f64>) -> Self {
        self.residency_priors = priors;
        self
    }

    pub fn with_dynamic(mut self, dynamic: bool, n_batches: usize) -> Self {
        self.dynamic = dynamic;
        self.n_batches = n_batches;
        self
    }

    pub fn with_pairing(mut self, pairing: PairingPolicy) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_averaging(mut self, average_posteriors: bool) -> Self {
        self.average_posteriors = average_posteriors;
        self
    }

    /// Whether the M-step runs after the E-step of `iteration` (0-based).
    pub fn refits_kernel_at(&self, iteration: usize) -> bool {
        self.dynamic && (self.n_batches <= 1 || iteration % self.n_batches == 0)
    }

    /// Whether `iteration` (0-based) contributes to averaged posteriors.
    pub fn is_post_burn_in(&self, iteration: usize) -> bool {
        iteration >= self.burn_in
    }

    /// Kernel priors to use: the configured ones, or the family defaults when empty.
    pub fn effective_residency_priors(&self) -> Vec<f64> {
        if self.residency_priors.is_empty() {
            self.kernel.default_priors()
        } else {
            self.residency_priors.clone()
        }
    }
}
