use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use table_importer::{ConnectionConfig, CsvOptions, ImportReport, Importer};

#[derive(Parser)]
#[command(name = "table-importer")]
#[command(about = "Import CSV files into a database table, all rows or none")]
#[command(version)]
#[command(long_about = "Imports one or more CSV files into a single table. The first row of each file names the target columns; every following row is inserted through one prepared statement inside a single transaction per file. Any failure rolls the whole file back.")]
#[command(after_help = "EXAMPLES:
    # Import one file
    table-importer --host db_host --database inventory_db --user db_user --table product_catalog import_inventory_2026.csv

    # Semicolon-separated file, JSON report on stdout
    table-importer --host db_host --database inventory_db --user db_user --table product_catalog --delimiter ';' --format json items.csv")]
struct Cli {
    /// Database host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long, default_value = "5432")]
    port: u16,

    /// Database name
    #[arg(short, long)]
    database: String,

    /// Database user
    #[arg(short, long)]
    user: String,

    /// Database password
    #[arg(long, env = "IMPORTER_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Target table; taken verbatim as an SQL identifier
    #[arg(short, long)]
    table: String,

    /// Connection timeout in seconds
    #[arg(long, default_value = "30")]
    connect_timeout: u64,

    /// Field delimiter (single ASCII character)
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Output format for import reports
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// CSV files to import, each in its own transaction
    #[arg(value_name = "FILE", required = true)]
    sources: Vec<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Set log level explicitly
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Output logs in JSON format
    #[arg(long)]
    json_logs: bool,
}

#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(format!("delimiter must be a single ASCII character, got {:?}", value)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    initialize_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting table-importer v{}", env!("CARGO_PKG_VERSION"));

    let config = ConnectionConfig::new(&cli.host, &cli.database, &cli.user, &cli.password)
        .with_port(cli.port)
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout));
    let csv_options = CsvOptions {
        delimiter: cli.delimiter,
        ..CsvOptions::default()
    };

    let mut importer = Importer::connect(&config, &cli.table)
        .await?
        .with_csv_options(csv_options);

    for source in &cli.sources {
        let report = importer.import(source).await?;
        print_report(&report, cli.format)?;
    }

    Ok(())
}

fn print_report(report: &ImportReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
    }
    Ok(())
}

/// Initialize logging based on CLI configuration.
///
/// `--log-level` and `--verbose` win over `RUST_LOG`; with neither, `RUST_LOG`
/// is used when set and `info` otherwise.
fn initialize_logging(cli: &Cli) {
    let filter = log_filter(cli, std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(cli.verbose)
        .with_file(cli.verbose)
        .with_line_number(cli.verbose);

    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn log_filter(cli: &Cli, rust_log: Option<&str>) -> EnvFilter {
    let explicit = if let Some(level) = &cli.log_level {
        Some(Level::from(level.clone()))
    } else if cli.verbose {
        Some(Level::DEBUG)
    } else {
        None
    };

    match (explicit, rust_log) {
        (Some(level), _) => EnvFilter::default().add_directive(level.into()),
        (None, Some(directives)) => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into())),
        (None, None) => EnvFilter::default().add_directive(Level::INFO.into()),
    }
}
