//! Roberta - Subtitle Transcription Review
//!
//! Command-line entry point: analyzes subtitle files with a language model
//! and keeps a history of the produced reports.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use roberta::cli::{Args, Commands, HistoryAction};
use roberta::completion::OpenAiClient;
use roberta::completion::openai::ApiKey;
use roberta::config::Config;
use roberta::error::RobertaError;
use roberta::report::Report;
use roberta::session::{HistoryEntry, Session, SessionStore};
use roberta::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Roberta - Subtitle Transcription Review");

    let mut config = match &args.config {
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

    let store = SessionStore::new(&config.session.history_path);

    match args.command {
        Commands::Analyze { input, output_dir, max_tokens } => {
            if let Some(max_tokens) = max_tokens {
                config.analysis.max_tokens = max_tokens;
            }

            let mut workflow = build_workflow(&config)?;
            let mut session = store.load()?;
            session.new_analysis();

            let report = workflow.analyze_file(&input, output_dir.as_deref()).await?;
            print_report(&report);
            record(&mut session, &report);
            store.save(&session)?;
            log_usage(&workflow);
        }
        Commands::Batch { input_dir, output_dir, max_tokens } => {
            if let Some(max_tokens) = max_tokens {
                config.analysis.max_tokens = max_tokens;
            }

            let mut workflow = build_workflow(&config)?;
            let mut session = store.load()?;

            let reports = workflow.analyze_directory(&input_dir, output_dir.as_deref()).await?;
            for report in &reports {
                print_report(report);
                record(&mut session, report);
            }
            store.save(&session)?;
            log_usage(&workflow);

            println!("Analyzed {} files", reports.len());
        }
        Commands::History { action } => {
            let mut session = store.load()?;

            match action {
                HistoryAction::List => print_history(&session),
                HistoryAction::Show { index } => {
                    let entry = session.select(index)?;
                    println!("🧠 Risultato per: {}\n", entry.title);
                    println!("{}", entry.report);
                    store.save(&session)?;
                }
                HistoryAction::Delete { index } => {
                    let removed = session.delete(index)?;
                    store.save(&session)?;
                    println!("Removed {} from history", removed.title);
                }
            }
        }
        Commands::Init { force } => {
            let path = args.config.unwrap_or_else(|| "config.toml".into());
            if path.exists() && !force {
                return Err(RobertaError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                )).into());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    info!("Roberta completed successfully");
    Ok(())
}

/// Create the workflow. Fails before any analysis when the API key is missing.
fn build_workflow(config: &Config) -> Result<Workflow> {
    config.validate()?;

    let api_key = ApiKey::from_env(&config.completion.api_key_env)?;
    let client = OpenAiClient::new(&config.completion, api_key)?;

    Ok(Workflow::new(config.clone(), Box::new(client))?)
}

fn log_usage(workflow: &Workflow) {
    let dispatcher = workflow.dispatcher();
    info!("Sent {} requests to the completion service ({} results cached)",
          dispatcher.service_calls(), dispatcher.cached_results());
}

fn record(session: &mut Session, report: &Report) {
    let index = session.append(HistoryEntry::from(report));
    info!("Stored {} as history entry {}", report.title, index);
}

fn print_report(report: &Report) {
    println!("\n🧠 Risultato per: {}\n", report.title);
    if report.is_empty() {
        println!("(nessuno snippet sospetto)");
    } else {
        println!("{}", report.body);
    }
    if report.failed_chunks > 0 {
        println!("\n{} of {} chunks failed", report.failed_chunks, report.chunk_count);
    }
}

fn print_history(session: &Session) {
    if session.is_empty() {
        println!("No analyses in history.");
        return;
    }

    println!("\n📜 Storico Analisi File");
    println!("{:<6} {:<20} {:<50}", "Index", "Analyzed", "File");
    println!("{}", "-".repeat(76));

    for (index, entry) in session.entries().iter().enumerate() {
        let marker = if session.active_index() == Some(index) { "*" } else { " " };
        println!(
            "{}{:<5} {:<20} {:<50}",
            marker,
            index,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.title
        );
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".roberta").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive the program
    let file_appender = rolling::daily(&log_dir, "roberta.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("roberta.log").display());

    Ok(())
}
