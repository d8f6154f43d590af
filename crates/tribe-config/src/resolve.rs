//! Hyperparameter file resolution.
//!
//! Resolution order: CLI argument → `TRIBE_CONFIG` environment variable → defaults.

use crate::hyper::HyperParams;
use crate::validate::{ValidationError, ValidationResult};
use std::path::{Path, PathBuf};

/// Environment variable naming a hyperparameter file.
pub const ENV_CONFIG_PATH: &str = "TRIBE_CONFIG";

/// Where the hyperparameters came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Loaded hyperparameters with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedHyperParams {
    pub params: HyperParams,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve hyperparameters from an explicit path, the environment, or defaults.
///
/// An explicitly named file (CLI or env) that does not exist is an error, not
/// a silent fallback to defaults.
pub fn resolve_hyper_params(cli_path: Option<&Path>) -> ValidationResult<ResolvedHyperParams> {
    let env_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
    resolve_with(cli_path, env_path.as_deref())
}

fn resolve_with(cli_path: Option<&Path>, env_path: Option<&Path>) -> ValidationResult<ResolvedHyperParams> {
    let (path, source) = match (cli_path, env_path) {
        (Some(p), _) => (p.to_path_buf(), ConfigSource::CliArgument),
        (None, Some(p)) => (p.to_path_buf(), ConfigSource::Environment),
        (None, None) => {
            tracing::debug!("no hyperparameter file given, using builtin defaults");
            return Ok(ResolvedHyperParams {
                params: HyperParams::default(),
                path: None,
                source: ConfigSource::BuiltinDefault,
            });
        }
    };

    if !path.exists() {
        return Err(ValidationError::IoError(format!(
            "config file not found ({}): {}",
            source,
            path.display()
        )));
    }

    let params = HyperParams::from_path(&path)?;
    tracing::debug!(path = %path.display(), source = %source, "loaded hyperparameters");
    Ok(ResolvedHyperParams {
        params,
        path: Some(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_nothing_given() {
        let resolved = resolve_with(None, None).unwrap();
        assert_eq!(resolved.source, ConfigSource::BuiltinDefault);
        assert_eq!(resolved.params, HyperParams::default());
    }

    #[test]
    fn cli_beats_environment() {
        let dir = TempDir::new().unwrap();
        let cli = dir.path().join("cli.toml");
        let env = dir.path().join("env.json");
        fs::write(&cli, "n_topics = 7\n").unwrap();
        fs::write(&env, r#"{"n_topics": 9}"#).unwrap();

        let resolved = resolve_with(Some(&cli), Some(&env)).unwrap();
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(resolved.params.n_topics, 7);

        let resolved = resolve_with(None, Some(&env)).unwrap();
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.params.n_topics, 9);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            resolve_with(Some(&missing), None),
            Err(ValidationError::IoError(_))
        ));
    }
}
