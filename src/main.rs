use anyhow::{Context, Result};
use house_rental::import::{import_clients, import_houses, import_rentals, ImportStats};
use house_rental::{AppConfig, ClientAnalyticsAggregator, Clock, Database, SystemClock};
use std::env;
use std::fs::File;
use std::sync::Arc;

const USAGE: &str = "\
Usage:
  house-rental init
  house-rental import <clients.csv> <houses.csv> <rentals.csv>   (use - to skip a file)
  house-rental report <client-id>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&config),
        Some("import") if args.len() == 5 => run_import(&config, &args[2], &args[3], &args[4]),
        Some("report") if args.len() == 3 => {
            let id = args[2]
                .parse::<i64>()
                .with_context(|| format!("'{}' is not a client id", args[2]))?;
            run_report(&config, id)
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn open(config: &AppConfig) -> Result<Database> {
    let db = Database::open(&config.db_path, config.zone())
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    db.setup_schema().context("failed to set up schema")?;
    Ok(db)
}

fn run_init(config: &AppConfig) -> Result<()> {
    println!("🔧 Setting up database...");
    let db = open(config)?;
    db.close();
    println!("✓ Schema ready in {} (WAL mode)", config.db_path.display());
    Ok(())
}

fn run_import(config: &AppConfig, clients: &str, houses: &str, rentals: &str) -> Result<()> {
    println!("🗄️  Seed import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db = open(config)?;
    let session = db.open_session()?;
    let now = SystemClock::new(config.zone()).now();

    if let Some(file) = source(clients)? {
        report_counts("clients", import_clients(&session, file)?);
    }
    if let Some(file) = source(houses)? {
        report_counts("houses", import_houses(&session, file, now)?);
    }
    if let Some(file) = source(rentals)? {
        report_counts("rentals", import_rentals(&session, file)?);
    }

    drop(session);
    db.close();
    Ok(())
}

fn source(path: &str) -> Result<Option<File>> {
    if path == "-" {
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("Failed to open CSV file {}", path))?;
    Ok(Some(file))
}

fn report_counts(what: &str, stats: ImportStats) {
    println!("✓ {}: {} inserted", what, stats.inserted);
    if stats.duplicates > 0 {
        println!("  Duplicates skipped: {}", stats.duplicates);
    }
}

fn run_report(config: &AppConfig, id: i64) -> Result<()> {
    let db = Arc::new(open(config)?);
    let report = ClientAnalyticsAggregator::new(db.clone()).report(id);
    println!("{}", serde_json::to_string_pretty(&report)?);
    db.close();
    Ok(())
}
