use std::io::{stderr, stdout, BufWriter};
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use transaction_ingest::config::{IngestConfig, Settings};
use transaction_ingest::engine::{IngestEngine, RunDriver};
use transaction_ingest::service::TransactionService;
use transaction_ingest::storage::{MemoryStore, PageRequest, SqliteStore, TransactionFilter, TransactionStore, MAX_PAGE_SIZE};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: transaction-ingest [input].txt [log_level:optional] > [output].csv");
        eprintln!("Available log levels: error, warn, info, debug, trace (default: error)");
        eprintln!("Environment: INGEST_DATABASE, INGEST_CHUNK_SIZE, INGEST_CONCURRENCY, INGEST_LINES_TO_SKIP, INGEST_SKIP_LIMIT");
        exit(1);
    }

    let path = &args[1];
    let log_level = args.get(2)
        .map(|s| parse_log_level(s)).unwrap_or(LevelFilter::ERROR);

    setup_logging(log_level);

    let settings = match Settings::from_env(path) {
        Ok(settings) => settings,
        Err(error) => {
            error!("Ingestion run could not be launched: {error}");
            exit(1);
        }
    };

    match &settings.database {
        Some(database) => match SqliteStore::open(database) {
            Ok(store) => ingest(Arc::new(store), settings.ingest).await,
            Err(error) => {
                error!("Ingestion run could not be launched: database [{}] is unavailable: {error}", database.display());
                exit(1);
            }
        },
        None => ingest(Arc::new(MemoryStore::new()), settings.ingest).await
    }
}

async fn ingest<S: TransactionStore>(store: Arc<S>, config: IngestConfig) -> Result<()> {
    let driver = RunDriver::new(IngestEngine::new(store.clone(), config));

    let timer = Instant::now();
    let outcome = driver.launch().await;
    let duration = timer.elapsed();

    info!("Run [{}] finished as {} in: {duration:?}", outcome.run_id, outcome.status);

    if !outcome.was_launched() {
        exit(1);
    }

    write_results_to_stdout(&TransactionService::new(store))?;

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}

fn setup_logging(level: LevelFilter) {
    //NOTE: stdout carries the persisted records, so logging goes to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn write_results_to_stdout<S: TransactionStore>(service: &TransactionService<S>) -> Result<()> {
    let mut output = csv::Writer::from_writer(BufWriter::new(stdout().lock()));
    let filter = TransactionFilter::default();
    let mut request = PageRequest::new(0, MAX_PAGE_SIZE);

    loop {
        let page = service.list(&filter, request)?;

        for record in &page.content {
            output.serialize(record)?;
        }

        if !page.has_next() {
            break;
        }

        request = request.next();
    }

    output.flush()?;

    Ok(())
}
