use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vigil_core::config::StorageConfig;
use vigil_core::point::TraceRecord;
use vigil_core::query::{PointQuery, StringComparator};
use vigil_core::store::TraceStore;
use vigil_core::time::{SystemTimeSource, TimeSource};
use vigil_query::TracePointService;
use vigil_storage::FjallTraceStore;
use vigil_transaction::{TraceCollector, TransactionRegistry};

// ─────────────────────────────────────────────────────────────────────────────
// CLI
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "vigil",
    about = "In-process transaction observability agent",
    version
)]
struct Cli {
    /// Directory for trace storage.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Hours a stored trace is retained before query windows count as expired.
    #[arg(long)]
    retention_hours: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest completed trace records as JSON Lines on stdin.
    Ingest,
    /// Query stored trace points and print the response object as JSON.
    Query(QueryArgs),
}

/// Mirror of a decoded point query, one flag per request parameter.
#[derive(Debug, Args)]
struct QueryArgs {
    /// Start of the window (unix millis).
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// End of the window (unix millis, 0 = open-ended).
    #[arg(long, default_value_t = 0)]
    to: u64,

    /// Lower duration bound in nanoseconds.
    #[arg(long, default_value_t = 0)]
    duration_low: u64,

    /// Upper duration bound in nanoseconds.
    #[arg(long)]
    duration_high: Option<u64>,

    #[arg(long)]
    transaction_type: Option<String>,

    /// Only transactions that qualified as slow.
    #[arg(long)]
    slow_only: bool,

    /// Only transactions that recorded an error.
    #[arg(long)]
    error_only: bool,

    #[arg(long)]
    headline: Option<String>,
    #[arg(long, value_enum)]
    headline_comparator: Option<ComparatorArg>,

    #[arg(long)]
    transaction_name: Option<String>,
    #[arg(long, value_enum)]
    transaction_name_comparator: Option<ComparatorArg>,

    #[arg(long)]
    error: Option<String>,
    #[arg(long, value_enum)]
    error_comparator: Option<ComparatorArg>,

    #[arg(long)]
    user: Option<String>,
    #[arg(long, value_enum)]
    user_comparator: Option<ComparatorArg>,

    #[arg(long)]
    custom_attribute_name: Option<String>,
    #[arg(long)]
    custom_attribute_value: Option<String>,
    #[arg(long, value_enum)]
    custom_attribute_value_comparator: Option<ComparatorArg>,

    /// Maximum number of points to return (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    limit: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ComparatorArg {
    Equals,
    Contains,
    NotContains,
    BeginsWith,
    EndsWith,
}

impl From<ComparatorArg> for StringComparator {
    fn from(arg: ComparatorArg) -> Self {
        match arg {
            ComparatorArg::Equals => Self::Equals,
            ComparatorArg::Contains => Self::Contains,
            ComparatorArg::NotContains => Self::NotContains,
            ComparatorArg::BeginsWith => Self::BeginsWith,
            ComparatorArg::EndsWith => Self::EndsWith,
        }
    }
}

impl QueryArgs {
    fn to_query(&self) -> PointQuery {
        PointQuery {
            from: self.from,
            to: self.to,
            duration_low: self.duration_low,
            duration_high: self.duration_high,
            transaction_type: self.transaction_type.clone(),
            slow_only: self.slow_only,
            error_only: self.error_only,
            headline: self.headline.clone(),
            headline_comparator: self.headline_comparator.map(Into::into),
            transaction_name: self.transaction_name.clone(),
            transaction_name_comparator: self.transaction_name_comparator.map(Into::into),
            error: self.error.clone(),
            error_comparator: self.error_comparator.map(Into::into),
            user: self.user.clone(),
            user_comparator: self.user_comparator.map(Into::into),
            custom_attribute_name: self.custom_attribute_name.clone(),
            custom_attribute_value: self.custom_attribute_value.clone(),
            custom_attribute_value_comparator: self
                .custom_attribute_value_comparator
                .map(Into::into),
            limit: self.limit,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vigil")
        .join("data")
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vigil=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let store = Arc::new(FjallTraceStore::open(&data_dir)?);

    let mut config = StorageConfig::default();
    if let Some(hours) = cli.retention_hours {
        config.retention_hours = hours;
    }

    match cli.command {
        Command::Ingest => run_ingest(store),
        Command::Query(args) => run_query(&args, store, config),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

fn run_ingest(store: Arc<FjallTraceStore>) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut ingested = 0u64;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(&line)
            .map_err(|e| anyhow::anyhow!("malformed trace record: {e}"))?;
        store.insert(&record)?;
        ingested += 1;
    }
    eprintln!("vigil: ingested {ingested} trace records");
    Ok(())
}

fn run_query(
    args: &QueryArgs,
    store: Arc<FjallTraceStore>,
    config: StorageConfig,
) -> anyhow::Result<()> {
    let query = args.to_query();
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::new());

    // The CLI process has no in-flight transactions of its own; the registry
    // and pending buffer exist so the engine runs its full pipeline.
    let registry = Arc::new(TransactionRegistry::new());
    let collector = Arc::new(TraceCollector::new(config.clone(), Arc::clone(&time)));

    let service = TracePointService::new(store, registry, collector, config, time);
    let response = service.query_points(&query)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
