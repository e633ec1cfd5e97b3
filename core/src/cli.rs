use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::demo::{Processor, RegistrationForm, Requests, View};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence - generator-style effect scheduling demos", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "cadence_core=debug" (overrides config file and env vars)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fill in and submit the registration form, printing every view
    Register {
        /// Name typed into the general form
        #[arg(long)]
        name: String,

        /// City typed into the address form
        #[arg(long)]
        city: String,

        /// Number of user saves that fail with "Bad request" before one succeeds
        #[arg(long, default_value = "0")]
        fail_saves: usize,
    },

    /// Run the nested program demo and print the visited values
    Processor,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config = Config::builder()
        .config_path(cli.config)
        .log_filter(cli.log)
        .build()?;

    init_tracing(&config);

    match cli.command {
        Commands::Register {
            name,
            city,
            fail_saves,
        } => register(&config, &name, &city, fail_saves).await,
        Commands::Processor => processor(&config).await,
    }
}

/// `RUST_LOG` wins over the configured filter
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn register(config: &Config, name: &str, city: &str, fail_saves: usize) -> Result<()> {
    anyhow::ensure!(!name.is_empty(), "Name must not be empty");

    let requests = Requests::new(config.demo.latency()).failing_saves(fail_saves);
    let mut form = RegistrationForm::mount(requests, config.demo.closing_delay())
        .context("Failed to mount registration form")?;

    let mut watch = form.watch();
    let mut last = form.render();
    println!("{}\n", last);

    let printer = tokio::spawn(async move {
        while let Some(view) = watch.changed().await {
            if view != last {
                println!("{}\n", view);
                last = view;
            }
        }
    });

    form.settle().await?;
    form.type_name(name);

    // Each failed save lands back on the general form
    while !matches!(form.render(), View::Address { .. }) {
        form.submit();
        form.settle().await?;
    }

    form.type_city(city);
    form.submit();
    form.settle().await?;

    let finished = form.is_finished();
    drop(form);
    printer.await.context("View printer failed")?;

    if finished {
        info!("registration complete");
    } else {
        println!("City name must be longer than 3 characters");
    }

    Ok(())
}

async fn processor(config: &Config) -> Result<()> {
    let mut processor = Processor::new(config.demo.latency());

    processor.process().await?;
    println!("Visited: {}", join(&processor.visited()));

    info!("continuing");
    processor.resume()?;
    processor.process().await?;
    println!("Visited: {}", join(&processor.visited()));

    Ok(())
}

fn join(values: &[serde_json::Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_arguments() {
        let cli = Cli::try_parse_from([
            "cadence", "--log", "debug", "register", "--name", "Ann", "--city", "Paris",
            "--fail-saves", "2",
        ])
        .unwrap();

        assert_eq!(cli.log.as_deref(), Some("debug"));
        let Commands::Register {
            name,
            city,
            fail_saves,
        } = cli.command
        else {
            unreachable!("Expected Register")
        };
        assert_eq!((name.as_str(), city.as_str(), fail_saves), ("Ann", "Paris", 2));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["cadence", "processor", "--config", "demo.toml"]).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("demo.toml")));
        assert!(matches!(cli.command, Commands::Processor));
    }

    #[test]
    fn test_register_requires_name() {
        assert!(Cli::try_parse_from(["cadence", "register", "--city", "Paris"]).is_err());
    }
}
