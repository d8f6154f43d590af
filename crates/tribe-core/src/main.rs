//! `tribe`: train a TribeFlow model from a trace file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tribe_common::Error;
use tribe_config::{resolve_hyper_params, KernelFamily};
use tribe_core::exit_codes::ExitCode;
use tribe_core::logging::{event_names, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage};
use tribe_core::{log_event, InitialTopics, InputData, Master};

#[derive(Parser)]
#[command(name = "tribe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Log level on stderr
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the model and print the result as JSON on stdout
    Learn(LearnArgs),
}

#[derive(Args, Debug)]
struct LearnArgs {
    /// Tab-separated trace file
    trace: PathBuf,

    /// Hyperparameter file (.toml or .json); falls back to $TRIBE_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    topics: Option<usize>,

    #[arg(long)]
    iter: Option<usize>,

    #[arg(long)]
    burn_in: Option<usize>,

    /// Residency kernel (noop, exponential, pareto)
    #[arg(long)]
    kernel: Option<KernelFamily>,

    #[arg(long)]
    seed: Option<u64>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env(cli.global.log_level, cli.global.log_format));

    let result = match cli.command {
        Commands::Learn(args) => run_learn(&args),
    };
    let exit_code = match result {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            let code = ExitCode::from_error(&err);
            match serde_json::to_string(&err.to_report()) {
                Ok(report) => eprintln!("{}", report),
                Err(_) => eprintln!("error: {}", err),
            }
            code
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn run_learn(args: &LearnArgs) -> Result<(), Error> {
    let resolved = resolve_hyper_params(args.config.as_deref())?;
    tracing::info!(source = ?resolved.source, path = ?resolved.path, "configuration resolved");
    let mut hyper = resolved.params;
    if let Some(workers) = args.workers {
        hyper.n_workers = workers;
    }
    if let Some(topics) = args.topics {
        hyper.n_topics = topics;
    }
    if let Some(n_iter) = args.iter {
        hyper.n_iter = n_iter;
    }
    if let Some(burn_in) = args.burn_in {
        hyper.burn_in = burn_in;
    }
    if let Some(kernel) = args.kernel {
        hyper = hyper.with_kernel(kernel);
    }
    if let Some(seed) = args.seed {
        hyper.random_seed = seed;
    }
    tribe_config::validate_hyper_params(&hyper)?;

    let input = InputData::load(&args.trace, hyper.n_topics, InitialTopics::Random, hyper.random_seed)?;
    let master = Master::new(hyper, input)?;
    let ctx = LogContext::new(master.run_id().clone());
    log_event!(ctx, INFO, event_names::TRACE_LOADED, Stage::Load, "trace loaded",
        events = master.n_events());

    let output = master.train()?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);
    Ok(())
}
