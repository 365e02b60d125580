use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;
mod logging;
mod watcher;

use config::Config;

#[derive(Parser)]
#[command(name = "subhub", version, about = "Aggregates proxy subscriptions into a sing-box profile")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true, default_value = "subhub.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Fetch every upstream once and print the profile
    Render {
        /// Write the profile to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Keep polling upstreams and rewrite `output.path` as they change
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is configured from the file, so load errors go to stderr as is.
    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };
    let _sentry = logging::init(&config.logging);

    if let Some(metrics) = &config.metrics {
        match shared::metrics::init_statsd(&metrics.statsd_host, metrics.statsd_port, &metrics.prefix)
        {
            Ok(()) => {
                shared::metrics_defs::describe_all(subscription::metrics_defs::ALL_METRICS);
                shared::metrics_defs::describe_all(profile::metrics_defs::ALL_METRICS);
            }
            Err(e) => tracing::warn!(error = %e, "metrics disabled"),
        }
    }

    let result = match cli.command {
        CliCommand::Render { output } => commands::render(&config, output.as_deref()).await,
        CliCommand::Run => commands::run(&cli.config, config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
