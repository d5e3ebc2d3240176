//! Bookmirror command-line interface
//!
//! - Run the storage-layout comparison at one or more scales
//! - Show the index catalog
//! - Walk through a synchronized author update
//! - Print the effective configuration
//!
//! # Examples
//!
//! ```bash
//! # Compare at the configured scales
//! bookmirror bench
//!
//! # Compare at 1000 and 10000 books, 50 calls per query
//! bookmirror bench --scale 1000 --scale 10000 --iterations 50
//!
//! # Run the author fan-out walkthrough and dump metrics
//! bookmirror --metrics demo
//! ```

use bookmirror::bench::Harness;
use bookmirror::index::IndexCatalog;
use bookmirror::model::{AuthorCommand, BookCommand};
use bookmirror::{metrics, DocumentStore, MirrorConfig, RelationalStore, SyncService};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bookmirror - relational catalog mirrored into document layouts
#[derive(Parser, Debug)]
#[command(name = "bookmirror")]
#[command(version = bookmirror::VERSION)]
#[command(about = "Compare relational, referencing and embedding storage layouts", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "BOOKMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "BOOKMIRROR_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the comparison harness
    Bench(BenchArgs),

    /// Show the index catalog
    Indexes,

    /// Create an author and a book, then update the author's email
    Demo,

    /// Print the effective configuration as TOML
    Config,

    /// Show version
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct BenchArgs {
    /// Book count to compare at (repeatable); defaults to bench.scales
    #[arg(short, long = "scale")]
    scales: Vec<usize>,

    /// Calls per query and store
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Seed of the synthetic data
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;
    metrics::init_metrics();

    let config = MirrorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Bench(args) => bench_command(config, args).await?,
        Commands::Indexes => indexes_command(&config),
        Commands::Demo => demo_command(config).await?,
        Commands::Config => print!("{}", config.to_toml()?),
        Commands::Version => println!("bookmirror {}", bookmirror::VERSION),
    }

    if cli.metrics {
        print!("{}", metrics::export_metrics());
    }
    Ok(())
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "bookmirror.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .pretty(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

async fn bench_command(mut config: MirrorConfig, args: BenchArgs) -> anyhow::Result<()> {
    if let Some(iterations) = args.iterations {
        config.bench.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.bench.seed = seed;
    }
    let scales = if args.scales.is_empty() {
        config.bench.scales.clone()
    } else {
        args.scales
    };
    config.validate()?;

    info!(?scales, iterations = config.bench.iterations, "Starting comparison");
    let harness = Harness::in_memory(config);
    let reports = harness.run_scales(&scales).await?;

    match args.format {
        OutputFormat::Text => {
            for report in &reports {
                println!("{}", report.render());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }
    Ok(())
}

fn indexes_command(config: &MirrorConfig) {
    let catalog = IndexCatalog::standard(&config.collections);
    for collection in catalog.collections() {
        println!("{}", collection);
        for descriptor in catalog
            .descriptors()
            .iter()
            .filter(|d| d.collection == collection)
        {
            println!("  {}", descriptor);
        }
    }
}

async fn demo_command(config: MirrorConfig) -> anyhow::Result<()> {
    let relational = Arc::new(RelationalStore::new());
    let documents = Arc::new(DocumentStore::in_memory());
    bookmirror::IndexManager::new(documents.clone(), &config.collections)
        .ensure_indexes()
        .await?;
    let sync = SyncService::new(relational, documents, config);

    let author = sync
        .create_author(&AuthorCommand {
            first_name: "Dora".into(),
            last_name: "Dada".into(),
            email: "mail@mail.com".into(),
            penname: "dada".into(),
            ..Default::default()
        })
        .await?
        .value;
    println!("created author {} ({})", author.api_key, author.email);

    let book = sync
        .create_book(&BookCommand {
            title: "Collected Nonsense".into(),
            isbn: "978-3-16-148410-0".into(),
            genre: "PO".into(),
            book_type: "P".into(),
            publication_date: "1916-07-14".into(),
            author_keys: vec![author.api_key.to_string()],
            ..Default::default()
        })
        .await?
        .value;
    println!("created book {} ({})", book.api_key, book.title);

    let report = sync
        .update_author(&AuthorCommand {
            api_key: Some(author.api_key.to_string()),
            first_name: "Dora".into(),
            last_name: "Dada".into(),
            email: "new@mail.com".into(),
            penname: "dada".into(),
            ..Default::default()
        })
        .await?;
    if !report.is_synchronized() {
        warn!(failures = report.failures().len(), "Author update only partially synchronized");
    }

    if let Some(embedded) = sync.find_embedded_book_document(&book.api_key).await? {
        println!("{}", serde_json::to_string_pretty(&embedded)?);
    }
    Ok(())
}
