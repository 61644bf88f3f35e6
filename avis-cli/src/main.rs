//! # avis CLI
//!
//! Command-line tools for the Avis Elvin client: subscription expression
//! checks, URI inspection, wire dumps and an in-process demo.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avis")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a client options file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Router URI, overriding `default_uri` from the options file
    #[arg(long, env = "ELVIN_URI")]
    uri: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send sample notifications through an in-process router and print
    /// what a `require(Opaque)` subscription receives
    Demo {
        /// Number of rounds; each round sends two notifications
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,
    },

    /// Evaluate a subscription expression against a notification
    Eval {
        /// Subscription expression
        filter: String,

        /// Attributes as name=type:value (types: string, int32, int64,
        /// real64, opaque as hex)
        attributes: Vec<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the parsed tree of a subscription expression
    Parse {
        /// Subscription expression
        filter: String,
    },

    /// Print the canonical form of an Elvin URI
    Uri {
        /// URI to inspect (defaults to the configured router URI)
        uri: Option<String>,
    },

    /// Hex dump of the NotifyEmit frame for a notification
    Encode {
        /// Attributes as name=type:value
        attributes: Vec<String>,

        /// Mark the notification as secure-only
        #[arg(long)]
        secure_only: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::WARN.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Demo { count } => {
            let options = commands::load_options(cli.config.as_deref(), cli.uri.as_deref())?;
            commands::run_demo(options, count)
        }
        Commands::Eval {
            filter,
            attributes,
            json,
        } => commands::eval_filter(&filter, &attributes, json),
        Commands::Parse { filter } => commands::parse_filter(&filter),
        Commands::Uri { uri } => {
            let options = commands::load_options(cli.config.as_deref(), cli.uri.as_deref())?;
            commands::show_uri(uri.as_deref().unwrap_or(&options.default_uri))
        }
        Commands::Encode {
            attributes,
            secure_only,
        } => commands::encode_notification(&attributes, secure_only),
    }
}
