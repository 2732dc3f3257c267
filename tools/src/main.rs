//! kpi-runner: headless batch runner for the order KPI pipeline.
//!
//! Usage:
//!   kpi-runner
//!   kpi-runner --backend memory --out-dir outputs
//!   kpi-runner --db run.db --as-of 2024-06-30T00:00:00Z --summary-json

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use order_kpi_core::{
    config::{
        BackendConfig, EtlConfig, DEFAULT_CUSTOMERS_PATH, DEFAULT_ORDERS_PATH, DEFAULT_OUT_DIR,
    },
    error::EtlResult,
    kpi::{KpiParams, DEFAULT_TOP_N, DEFAULT_WINDOW_DAYS},
    pipeline::{KpiOutcome, Pipeline, RunSummary},
};
use std::{env, fs::OpenOptions, io::Write, process::ExitCode};

const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Parser, Debug)]
#[command(name = "kpi-runner", version, about = "Compute order KPIs from a customer CSV and an order XML")]
struct Args {
    /// Customer table (CSV with a header row)
    #[arg(long, default_value = DEFAULT_CUSTOMERS_PATH)]
    customers: String,

    /// Order collection (XML, repeated <order> elements)
    #[arg(long, default_value = DEFAULT_ORDERS_PATH)]
    orders: String,

    /// Directory for the KPI CSV files
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    out_dir: String,

    /// sqlite | memory | mysql (overrides DB_TYPE)
    #[arg(long)]
    backend: Option<String>,

    /// SQLite database file (overrides DB_NAME)
    #[arg(long)]
    db: Option<String>,

    /// Anchor of the top-spenders window, RFC 3339. Defaults to now.
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<DateTime<Utc>>,

    /// Top-spenders window in days, up to 100 years
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS, value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOW_DAYS))]
    window_days: i64,

    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Append-only run log. Defaults to etl_database.log or etl_inmemory.log.
    #[arg(long)]
    log_file: Option<String>,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    summary_json: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    match run(&args) {
        Ok(summary) if summary.all_written() => {
            println!("KPIs generated successfully! Check the '{}' folder.", args.out_dir);
            ExitCode::SUCCESS
        }
        Ok(_) => {
            eprintln!("Some KPIs could not be exported. Check logs for details.");
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("ETL failed: {e:#}");
            eprintln!("Error during ETL: {e:#}. Check logs for details.");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunSummary> {
    let backend = BackendConfig::from_lookup(|key| match key {
        "DB_TYPE" => args.backend.clone().or_else(|| env::var(key).ok()),
        "DB_NAME" => args.db.clone().or_else(|| env::var(key).ok()),
        _ => env::var(key).ok(),
    });

    // Logging starts before the backend setting is checked.
    init_logging(&log_file_for(args, &backend))?;
    let backend = backend?;

    let params = KpiParams {
        as_of: args.as_of.unwrap_or_else(Utc::now),
        window_days: args.window_days,
        top_n: args.top_n,
    };
    let config = EtlConfig {
        customers_path: args.customers.clone(),
        orders_path: args.orders.clone(),
        out_dir: args.out_dir.clone(),
        backend,
        params,
    };

    if !args.summary_json {
        println!("kpi-runner: order KPI pipeline");
        println!("  customers: {}", config.customers_path);
        println!("  orders:    {}", config.orders_path);
        println!("  backend:   {}", config.backend.kind_name());
        println!("  out_dir:   {}", config.out_dir);
        println!("  as_of:     {}", params.as_of.to_rfc3339());
        println!();
    }

    let mut pipeline = Pipeline::build(config)?;
    let summary = pipeline.run()?;
    log::info!("ETL process completed");

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary)
}

/// `--log-file`, or the per-backend default. An unusable backend setting
/// still gets a log file.
fn log_file_for(args: &Args, backend: &EtlResult<BackendConfig>) -> String {
    args.log_file.clone().unwrap_or_else(|| match backend {
        Ok(BackendConfig::InMemory) => "etl_inmemory.log".into(),
        _ => "etl_database.log".into(),
    })
}

/// Route the `log` facade into an append-only file. RUST_LOG overrides the
/// default `info` level.
fn init_logging(path: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file {path}"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .context("Logger already initialised")?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  customers read:  {}", summary.customers_read);
    println!("  customers kept:  {}", summary.customers_kept);
    println!("  valid orders:    {}", summary.orders_valid);
    println!("  skipped orders:  {}", summary.orders_skipped);
    println!("  dropped orders:  {}", summary.orders_dropped);
    println!();
    println!("=== KPI EXPORTS ===");
    for outcome in &summary.outcomes {
        match outcome {
            KpiOutcome::Written { kpi, rows, path } => {
                println!("  {:<17} {rows:>5} rows -> {path}", kpi.name());
            }
            KpiOutcome::Failed { kpi, error, .. } => {
                println!("  {:<17} FAILED: {error}", kpi.name());
            }
        }
    }
}

fn parse_as_of(text: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}
