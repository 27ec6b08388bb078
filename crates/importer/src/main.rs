//! `arkiv-import`: runs one import or identifier check against PostgreSQL
//! and prints the report.

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use arkiv_db::PgGraphStore;
use arkiv_pipeline::{check_store, ImportDriver, ImportReport, ImportSettings};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Import aborted");
            eprintln!("Import aborted: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arkiv_importer=info,arkiv_pipeline=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Cli {
        database_url,
        json,
        command,
        ..
    } = cli;

    // --- Database ---
    let pool = arkiv_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    arkiv_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    arkiv_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let store = PgGraphStore::new(pool);

    match command {
        Command::Xml { dir, run } => {
            let mut settings = ImportSettings::from_env()?;
            let verbose = run.verbose;
            run.apply(&mut settings);
            let report = import(&store, settings, Input::Xml(dir), verbose).await?;
            print_report(&report, json)?;
        }
        Command::Csv { file, run, csv } => {
            let mut settings = ImportSettings::from_env()?;
            let verbose = run.verbose;
            run.apply(&mut settings);
            csv.apply(&mut settings);
            let report = import(&store, settings, Input::Csv(file), verbose).await?;
            print_report(&report, json)?;
        }
        Command::Check => {
            let found = check_store(&store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("All identifiers are consistent.");
            } else {
                println!("{} inconsistent identifier(s):", found.len());
                for item in &found {
                    println!("  {item}");
                }
            }
            if !found.is_empty() {
                return Ok(ExitCode::from(2));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

enum Input {
    Xml(PathBuf),
    Csv(PathBuf),
}

/// Run one import. With `verbose`, resolved records are printed to stdout
/// as they arrive.
async fn import(
    store: &PgGraphStore,
    settings: ImportSettings,
    input: Input,
    verbose: bool,
) -> anyhow::Result<ImportReport> {
    let mut driver = ImportDriver::new(store, settings)?;
    let printer = if verbose {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        driver = driver.with_sender(sender);
        Some(tokio::spawn(async move {
            while let Some(mutation) = receiver.recv().await {
                println!("{mutation}");
            }
        }))
    } else {
        None
    };

    let result = match &input {
        Input::Xml(dir) => driver.import_xml(dir).await,
        Input::Csv(file) => driver.import_csv(file).await,
    };
    // Closes the channel so the printer drains and stops.
    drop(driver);
    if let Some(printer) = printer {
        printer.await.context("Mutation printer failed")?;
    }
    Ok(result?)
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("{}", report.log);
    match &report.event_id {
        Some(id) => println!("Event: {id} ({} batch(es))", report.batches),
        None if report.dry_run => println!("Dry run, nothing committed."),
        None => println!("No changes."),
    }
    Ok(())
}
