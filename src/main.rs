//! Doctrans - Office Document Translation
//!
//! Command line entry point: translate a document, list its strings, write a
//! default configuration, or clean the working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doctrans::cli::{Args, Commands};
use doctrans::config::Config;
use doctrans::error::DoctransError;
use doctrans::translate::TranslationOptions;
use doctrans::workflow::{extract_strings, InboundDocument, Workflow};
use doctrans::workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate {
            input,
            target_lang,
            instruction,
            output_dir,
        } => {
            let options = TranslationOptions::new(
                target_lang.unwrap_or_else(|| config.translate.default_target_language.clone()),
            )
            .with_instruction(instruction);

            if let Err(e) = translate_file(&config, &input, &options, output_dir).await {
                error!("Translation failed: {}", e);
                eprintln!(
                    "{} (error type: {})",
                    e.user_message(),
                    e.category().as_str()
                );
                std::process::exit(1);
            }
        }
        Commands::Extract { input, json } => {
            let (kind, strings) = extract_strings(&input).await?;
            info!("{} strings found in {} document", strings.len(), kind);

            if json {
                println!("{}", serde_json::to_string_pretty(&strings)?);
            } else {
                for s in strings.iter() {
                    println!("{}", s);
                }
            }
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, use --force to overwrite",
                    output.display()
                );
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Sweep { hours } => {
            let hours = hours.unwrap_or(config.workspace.stale_after_hours);
            let workspace = Workspace::from_config(&config.workspace);
            let removed = workspace.sweep_stale(Duration::from_secs(hours * 3600))?;
            println!("Removed {} working files older than {}h", removed, hours);
        }
    }

    Ok(())
}

async fn translate_file(
    config: &Config,
    input: &Path,
    options: &TranslationOptions,
    output_dir: Option<PathBuf>,
) -> std::result::Result<(), DoctransError> {
    let output_dir = match output_dir {
        Some(dir) => dir,
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    tokio::fs::create_dir_all(&output_dir).await?;

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] batch {pos}/{len} {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let workflow = Workflow::from_config(config)?.with_progress(progress);
    let inbound = InboundDocument::from_path(input).await?;

    info!(
        "Translating {} into {}",
        input.display(),
        options.target_language
    );
    let delivered = workflow.run(inbound, options).await?;

    let output_path = output_dir.join(&delivered.file_name);
    tokio::fs::write(&output_path, &delivered.bytes).await?;

    println!("Wrote {}", output_path.display());
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".doctrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "doctrans.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("doctrans.log").display()
    );

    Ok(())
}
