//! Logging configuration.
//!
//! The level comes from `TRIBE_LOG`, else a coarse reading of `RUST_LOG`,
//! else `info`; the format from `TRIBE_LOG_FORMAT`. `--log-level` and
//! `--log-format` override both.

use clap::ValueEnum;

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    #[value(alias = "pretty")]
    Human,
    /// One JSON object per line.
    #[value(alias = "json")]
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Most verbose level named anywhere in a `RUST_LOG` string.
    fn from_rust_log(spec: &str) -> Option<Self> {
        [LogLevel::Trace, LogLevel::Debug, LogLevel::Warn, LogLevel::Error]
            .into_iter()
            .find(|level| spec.contains(level.as_directive()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}

impl LogConfig {
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(
            std::env::var("TRIBE_LOG").ok(),
            std::env::var("RUST_LOG").ok(),
            std::env::var("TRIBE_LOG_FORMAT").ok(),
            cli_level,
            cli_format,
        )
    }

    fn resolve(
        tribe_log: Option<String>,
        rust_log: Option<String>,
        log_format: Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let env_level = match tribe_log {
            Some(val) => LogLevel::from_str(&val, true).ok(),
            None => rust_log.as_deref().and_then(LogLevel::from_rust_log),
        };
        let env_format = log_format.and_then(|val| LogFormat::from_str(&val, true).ok());

        LogConfig {
            format: cli_format.or(env_format).unwrap_or_default(),
            level: cli_level.or(env_level).unwrap_or_default(),
        }
    }
}
