//! Command line front end
//!
//! stdout carries results only (JSON or the sweep wire value); logs go to
//! stderr through `logging::init`.

use crate::config::Settings;
use crate::converter::{Engine, ImageAvifConverter, LocalConverter};
use crate::error::{ConfigError, SweepError};
use crate::scanner::ConversionFilter;
use crate::services::CredentialManager;
use crate::sweep::SweepOutcome;
use crate::theme::ThemeReport;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "avif-sweep", version, about = "Convert theme images to AVIF")]
pub struct Cli {
    /// Settings file (default: <config dir>/avif-sweep/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Active theme directory, overrides `theme.stylesheet_dir`
    #[arg(long, global = true)]
    theme: Option<PathBuf>,

    /// Parent theme directory, overrides `theme.template_dir`
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Conversion engine, overrides `conversion.engine`
    #[arg(long, global = true, value_enum)]
    engine: Option<EngineArg>,

    /// Debug logging for this crate
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Theme roots and converted/total counts as JSON
    Status,

    /// List matching images, one path per line
    List {
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,

        /// Print a JSON array instead
        #[arg(long)]
        json: bool,
    },

    /// Run one sweep and print its outcome
    Convert {
        /// Repeat while the outcome is keep-alive
        #[arg(long)]
        until_done: bool,

        /// Round limit for --until-done (default: `sweep.max_rounds`)
        #[arg(long, requires = "until_done")]
        max_rounds: Option<usize>,
    },

    /// Delete every generated AVIF file and print true/false
    Delete,

    /// Manage the cloud API key in the OS keyring
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand, Debug)]
enum AuthAction {
    /// Store the cloud API key
    Set { api_key: String },
    /// Remove the stored cloud API key
    Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum FilterArg {
    All,
    Unconverted,
    Converted,
}

impl From<FilterArg> for ConversionFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => ConversionFilter::All,
            FilterArg::Unconverted => ConversionFilter::Unconverted,
            FilterArg::Converted => ConversionFilter::Converted,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EngineArg {
    Local,
    Cloud,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Local => Engine::Local,
            EngineArg::Cloud => Engine::Cloud,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sweep(#[from] SweepError),

    #[error("keyring: {0}")]
    Credentials(String),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Binary entry point
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);

    let stdout = io::stdout();
    match execute(cli, &mut stdout.lock()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("avif-sweep: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run a parsed command, writing results to `out`
pub fn execute(cli: Cli, out: &mut impl Write) -> Result<ExitCode, CliError> {
    match &cli.command {
        Command::Auth { action } => auth(action, out),
        Command::Status => {
            let settings = settings_for(&cli)?;
            settings.validate()?;
            let dirs = settings.theme_dirs()?;
            let scanner = settings.scanner();
            let controller = settings.controller();
            let report = ThemeReport::build(&dirs, &scanner);
            let value = json!({
                "theme": report,
                "engine": settings.conversion.engine,
                "localSupported": ImageAvifConverter::new().is_available(),
                "scan": {
                    "extensions": scanner.extensions(),
                    "targetExtension": scanner.naming().target_extension(),
                    "trimRule": scanner.naming().trim_rule(),
                },
                "limits": {
                    "perCallLimit": controller.per_call_limit(),
                    "batchCap": controller.batch_cap(),
                },
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List { filter, json } => {
            let settings = settings_for(&cli)?;
            settings.validate()?;
            let files = settings
                .scanner()
                .find(&settings.theme_dirs()?.roots(), (*filter).into());
            if *json {
                // Non UTF-8 names cannot be JSON strings as-is
                let names: Vec<_> = files.iter().map(|f| f.to_string_lossy()).collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&names)?)?;
            } else {
                for file in &files {
                    writeln!(out, "{}", file.display())?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Convert {
            until_done,
            max_rounds,
        } => {
            let settings = settings_for(&cli)?;
            let sweeper = settings.sweeper()?;
            let outcome = if *until_done {
                let rounds = max_rounds.unwrap_or(settings.sweep.max_rounds);
                sweeper.run_until_settled(rounds)?.outcome
            } else {
                sweeper.sweep()?
            };
            writeln!(out, "{}", outcome.wire_value())?;
            Ok(ExitCode::from(exit_status(outcome)))
        }
        Command::Delete => {
            let deleted = settings_for(&cli)?.sweeper()?.delete_all()?;
            writeln!(out, "{}", deleted)?;
            Ok(if deleted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn settings_for(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(theme) = &cli.theme {
        settings.theme.stylesheet_dir = Some(theme.clone());
    }
    if let Some(template) = &cli.template {
        settings.theme.template_dir = Some(template.clone());
    }
    if let Some(engine) = cli.engine {
        settings.conversion.engine = engine.into();
    }
    Ok(settings)
}

fn auth(action: &AuthAction, out: &mut impl Write) -> Result<ExitCode, CliError> {
    match action {
        AuthAction::Set { api_key } => {
            CredentialManager::store_cloud_api_key(api_key).map_err(CliError::Credentials)?;
            writeln!(out, "stored")?;
        }
        AuthAction::Clear => {
            CredentialManager::delete_cloud_api_key().map_err(CliError::Credentials)?;
            writeln!(out, "cleared")?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Failures the caller should notice get a non-zero exit
fn exit_status(outcome: SweepOutcome) -> u8 {
    match outcome {
        SweepOutcome::NoOp | SweepOutcome::AllConverted | SweepOutcome::PartialBatchDone => 0,
        SweepOutcome::GuardFailed | SweepOutcome::EngineFailure | SweepOutcome::QuotaExceeded => 2,
    }
}
