//! pspmigrator CLI - find pods mutated by PodSecurityPolicy before moving to Pod Security Admission

use clap::{Parser, Subcommand, ValueEnum};
use pspmigrator_core::{IgnoreSet, MutatingField};
use pspmigrator_kube::{ClusterConfig, KubeAccessor};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;

use error::Result;
use logging::LogLevel;

#[derive(Parser)]
#[command(name = "pspmigrator")]
#[command(version)]
#[command(about = "pspmigrator is a tool to help migrate from PSP to PSA", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the kubeconfig file (default: $KUBECONFIG, ~/.kube/config or in-cluster)
    #[arg(short, long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true, env = "PSPMIGRATOR_CONTEXT")]
    context: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "PSPMIGRATOR_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check if pods or PSP objects are mutating
    Mutating {
        #[command(subcommand)]
        command: MutatingCommand,
    },
}

#[derive(Subcommand)]
enum MutatingCommand {
    /// Check if a pod is being mutated by a PSP policy
    Pod {
        /// Pod name
        name: String,

        /// Pod namespace
        #[arg(short, long)]
        namespace: String,

        /// Comma-separated list of containers to ignore in the live pod spec at comparison time
        #[arg(
            short = 'c',
            long = "containers-to-ignore",
            alias = "containersToIgnore",
            default_value = ""
        )]
        containers_to_ignore: String,

        /// Policy field to leave out of the comparison (repeatable)
        #[arg(long = "ignore-field")]
        ignore_fields: Vec<MutatingField>,
    },

    /// Check all pods across all namespaces in a cluster are being mutated by a PSP policy
    Pods,

    /// Check if a PSP object is potentially mutating pods
    Psp {
        /// PodSecurityPolicy name
        name: String,
    },

    /// List every PSP object with the fields that mutate pods
    Psps,
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if err.print().is_err() {
                eprintln!("{err}");
            }
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            std::process::exit(code);
        }
    };

    logging::init(cli.log_level);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClusterConfig {
        kubeconfig: cli.kubeconfig,
        context: cli.context,
        timeout: Duration::from_secs(cli.timeout),
    };
    let output = cli.output;

    let accessor = KubeAccessor::connect(&config).await?;

    match cli.command {
        Commands::Mutating { command } => match command {
            MutatingCommand::Pod {
                name,
                namespace,
                containers_to_ignore,
                ignore_fields,
            } => {
                let ignore = ignore_fields
                    .into_iter()
                    .fold(IgnoreSet::parse_containers(&containers_to_ignore), |set, field| {
                        set.with_field(field)
                    });
                commands::mutating::pod(&accessor, &namespace, &name, &ignore, output).await
            }

            MutatingCommand::Pods => commands::mutating::pods(&accessor, output).await,

            MutatingCommand::Psp { name } => commands::mutating::psp(&accessor, &name, output).await,

            MutatingCommand::Psps => commands::mutating::psps(&accessor, output).await,
        },
    }
}
