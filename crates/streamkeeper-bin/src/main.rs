#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

use clap::{Parser, Subcommand};
use streamkeeper::{service::TokenSigner, tracing, CONFIG};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the configuration from the environment and report problems
    CheckConfig {
        #[clap(
            default_value = "false",
            short = 't',
            long = "check-token",
            help = "Also verify that the cluster API secret can sign a token."
        )]
        check_token: bool,
    },
    /// Sign a short-lived cluster API bearer token and print it
    SignToken {},
    /// Print the version
    Version {},
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Some(Commands::CheckConfig { check_token }) => {
            check_config(check_token)?;
        }
        Some(Commands::SignToken {}) => {
            let signer = TokenSigner::from_config(&CONFIG.cluster_api)?;
            println!("{}", signer.bearer_token()?);
        }
        Some(Commands::Version {}) => {
            println!("{VERSION}");
        }
        None => {
            eprintln!("No subcommand provided. Use --help for more information.");
            anyhow::bail!("No subcommand provided");
        }
    }

    Ok(())
}

fn check_config(check_token: bool) -> anyhow::Result<()> {
    // Forces the lazy configuration to resolve; parse failures abort here.
    // Secrets are redacted in the debug representation.
    println!("{:#?}", *CONFIG);

    if check_token {
        let signer = TokenSigner::from_config(&CONFIG.cluster_api)?;
        signer.bearer_token()?;
        println!("Cluster API secret OK.");
    }

    tracing::info!("Configuration resolved successfully");
    Ok(())
}
