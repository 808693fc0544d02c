pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use covermatch_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use covermatch_core::EncoderStrategy;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "covermatch",
    about = "Covermatch insurance recommendation CLI",
    long_about = "Match a user profile against an insurance catalog, inspect configuration, and check encoder readiness.",
    after_help = "Examples:\n  covermatch recommend --profile profile.json --top-n 3 --diverse\n  covermatch config\n  covermatch doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a covermatch.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Score the catalog against a profile and print the selection report as JSON")]
    Recommend {
        #[arg(long, help = "JSON file holding the user profile")]
        profile: PathBuf,
        #[arg(long, help = "JSON product catalog (overrides catalog.path)")]
        catalog: Option<PathBuf>,
        #[arg(long = "top-n", help = "Maximum number of recommendations")]
        top_n: Option<usize>,
        #[arg(long, help = "Take the best product of each category first")]
        diverse: bool,
        #[arg(long, value_parser = parse_strategy, help = "auto | sentence | mean_pooling | keyword")]
        encoder: Option<EncoderStrategy>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog readability, and encoder chain selection")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn parse_strategy(value: &str) -> Result<EncoderStrategy, String> {
    value.parse()
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let base_options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        overrides: ConfigOverrides::default(),
    };

    let result = match cli.command {
        Command::Recommend { profile, catalog, top_n, diverse, encoder } => {
            let options = LoadOptions {
                overrides: ConfigOverrides {
                    encoder_strategy: encoder,
                    catalog_path: catalog,
                    top_n,
                    diversity: diverse.then_some(true),
                    ..ConfigOverrides::default()
                },
                ..base_options
            };
            init_logging(&options);
            commands::recommend::run(options, &profile)
        }
        Command::Config => {
            init_logging(&base_options);
            commands::CommandResult { exit_code: 0, output: commands::config::run(base_options) }
        }
        Command::Doctor { json } => {
            init_logging(&base_options);
            commands::doctor::run(base_options, json)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured level;
/// a config that fails to load falls back to `info`/compact so the command
/// itself can report the error.
pub fn init_logging(options: &LoadOptions) {
    let (level, format) = match AppConfig::load(options.clone()) {
        Ok(config) => (config.logging.level, config.logging.format),
        Err(_) => ("info".to_string(), LogFormat::Compact),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
