//! RatingScope CLI: collection, queries and the long-running daemon.
//!
//! Commands:
//! - `collect`: run one full ranking collection and replace the dataset
//! - `query`: rating, percentile and distribution for one or more users
//! - `daemon`: background collection plus queries read line by line from stdin
//! - `store status`: report the dataset file, its metadata and summary stats

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use ratingscope_core::config::AppConfig;
use ratingscope_core::data::{RankingCollector, RatingStore, SolvedAcClient};
use ratingscope_core::stats::{Distribution, DistributionKey};
use ratingscope_core::ShutdownSignal;
use ratingscope_runner::{DistributionCache, QueryRequest, QueryResult, QueryService, Scheduler};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "ratingscope.toml";

#[derive(Parser)]
#[command(
    name = "ratingscope",
    about = "RatingScope: solved.ac rating distribution service"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./ratingscope.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full collection from the ranking API and replace the dataset.
    Collect,
    /// Look up users and report their percentile and distribution.
    Query {
        /// solved.ac handles.
        #[arg(required = true)]
        usernames: Vec<String>,

        /// Distribution kind: density or histogram.
        #[arg(long, default_value = "density")]
        kind: String,

        /// Bandwidth rule (scott, silverman, or a number) or histogram bin count.
        #[arg(long)]
        param: Option<String>,

        /// Print full JSON results, distribution included.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Collect on a schedule and answer `username [kind [param]]` lines from stdin.
    Daemon {
        /// Worker threads for query handling. Defaults to the number of CPUs.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Dataset management commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report the dataset path, metadata and summary statistics.
    Status,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Collect => run_collect(&config),
        Commands::Query {
            usernames,
            kind,
            param,
            json,
        } => run_query(&config, &usernames, &kind, param.as_deref(), json),
        Commands::Daemon { workers } => run_daemon(&config, workers),
        Commands::Store { action } => match action {
            StoreAction::Status => run_store_status(&config),
        },
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ratingscope=info,ratingscope_core=info,ratingscope_runner=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            AppConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("loading config {DEFAULT_CONFIG_FILE}"))?
        }
        None => {
            let config = AppConfig::default();
            config.validate()?;
            config
        }
    };
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn build_collector(config: &AppConfig, client: Arc<SolvedAcClient>) -> RankingCollector {
    RankingCollector::new(
        client,
        RatingStore::new(&config.store.dataset_path),
        RatingStore::new(&config.store.checkpoint_path),
        config.collector.clone(),
    )
}

fn run_collect(config: &AppConfig) -> Result<()> {
    let client = Arc::new(SolvedAcClient::new(&config.collector)?);
    let collector = build_collector(config, client);

    let report = collector
        .run(&ShutdownSignal::new())
        .context("collection failed")?;

    println!();
    println!("=== Collection Report ===");
    println!("Dataset:        {}", collector.store().path().display());
    println!("Samples:        {}", report.samples);
    println!(
        "Pages:          {} collected / {} expected",
        report.pages_collected, report.expected_pages
    );
    println!("Requests:       {}", report.requests);
    println!("Failed pages:   {}", report.pages_failed);
    println!("Rate limited:   {}", report.rate_limited);
    println!("Checkpoints:    {}", report.checkpoints);
    if report.stopped_early {
        println!("Ranking ended before the expected page count.");
    }
    Ok(())
}

fn run_query(
    config: &AppConfig,
    usernames: &[String],
    kind: &str,
    param: Option<&str>,
    json: bool,
) -> Result<()> {
    let key = DistributionKey::parse(kind, param)?;
    let client = Arc::new(SolvedAcClient::new(&config.collector)?);
    let cache = Arc::new(DistributionCache::new(RatingStore::new(
        &config.store.dataset_path,
    )));
    let service = QueryService::new(client, cache, config.query.clone());

    let results: Vec<_> = usernames
        .par_iter()
        .map(|name| (name, service.query(name, key)))
        .collect();

    for (name, result) in results {
        match result {
            Ok(r) if json => println!("{}", serde_json::to_string(&r)?),
            Ok(r) => print_result(&r),
            Err(e) => eprintln!("Error for {name}: {e}"),
        }
    }
    Ok(())
}

fn print_result(r: &QueryResult) {
    let rating = if r.rating_known {
        r.rating.to_string()
    } else {
        format!("{} (unknown user)", r.rating)
    };
    println!();
    println!("=== {} ===", r.username);
    println!("Rating:         {rating}");
    println!("Percentile:     {:.2}%", r.percentile);
    println!("Top:            {:.2}%", 100.0 - r.percentile);
    match &*r.distribution {
        Distribution::Density(curve) => {
            println!(
                "Density:        {:.6e} (bandwidth {:.2}, rule {})",
                r.density_at_rating, curve.bandwidth, curve.rule
            );
        }
        Distribution::Histogram(h) => {
            println!(
                "Density:        {:.6e} ({} bins, width {:.2})",
                r.density_at_rating,
                h.bins(),
                h.bin_width()
            );
        }
    }
    println!("Generation:     {}", r.generation);
}

fn run_daemon(config: &AppConfig, workers: Option<usize>) -> Result<()> {
    let client = Arc::new(SolvedAcClient::new(&config.collector)?);
    let cache = Arc::new(DistributionCache::new(RatingStore::new(
        &config.store.dataset_path,
    )));

    let scheduler = Scheduler::new(
        Arc::new(build_collector(config, Arc::clone(&client))),
        Arc::clone(&cache),
        config.schedule.clone(),
    )
    .spawn()
    .context("failed to start scheduler thread")?;

    let service = Arc::new(QueryService::new(client, cache, config.query.clone()));
    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ratingscope-query-{i}"));
    if let Some(n) = workers {
        builder = builder.num_threads(n);
    }
    let pool = builder.build().context("failed to build query pool")?;

    tracing::info!("daemon ready, reading queries from stdin");

    // Results funnel through one writer so output lines never interleave.
    let (tx, rx) = mpsc::channel::<String>();
    let printer = std::thread::Builder::new()
        .name("ratingscope-output".into())
        .spawn(move || {
            let stdout = io::stdout();
            for line in rx {
                let mut out = stdout.lock();
                if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
                    break;
                }
            }
        })
        .context("failed to start output thread")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let service = Arc::clone(&service);
        let tx = tx.clone();
        pool.spawn(move || {
            let answer = QueryRequest::parse_line(&line).and_then(|req| service.handle(&req));
            let reply = match answer {
                Ok(result) => serde_json::to_string(&result)
                    .unwrap_or_else(|e| error_json(&line, &e.to_string())),
                Err(e) => error_json(&line, &e.to_string()),
            };
            let _ = tx.send(reply);
        });
    }

    tracing::info!("stdin closed, shutting down");
    drop(tx);
    drop(pool);
    scheduler.stop();
    if printer.join().is_err() {
        tracing::error!("output thread panicked");
    }
    Ok(())
}

fn error_json(request: &str, error: &str) -> String {
    serde_json::json!({ "request": request, "error": error }).to_string()
}

fn run_store_status(config: &AppConfig) -> Result<()> {
    let store = RatingStore::new(&config.store.dataset_path);
    println!("Dataset:        {}", store.path().display());

    if !store.exists() {
        println!("Status:         missing (queries use bootstrap samples)");
        return Ok(());
    }

    let samples = store.read().context("dataset is unreadable")?;
    let bytes = std::fs::metadata(store.path())?.len();
    println!("Size:           {}", format_size(bytes));
    println!("Origin:         {:?}", samples.origin());
    println!("Samples:        {}", samples.len());
    if let (Some(min), Some(max)) = (samples.min(), samples.max()) {
        println!("Range:          {min} to {max}");
    }

    match store.meta() {
        Some(meta) => {
            println!("Written at:     {}", meta.written_at.to_rfc3339());
            println!("Data hash:      {}", meta.data_hash);
            if !samples.is_bootstrap() && !meta.describes(samples.values()) {
                println!(
                    "WARNING: metadata is stale ({} samples listed, file has {})",
                    meta.sample_count,
                    samples.len()
                );
            }
        }
        None => println!("Metadata:       (none)"),
    }

    let leftovers = store.temp_paths();
    if !leftovers.is_empty() {
        println!("Temp files:     {} (in flight or abandoned)", leftovers.len());
    }

    let checkpoint = RatingStore::new(&config.store.checkpoint_path);
    if checkpoint.exists() {
        println!("Checkpoint:     {}", checkpoint.path().display());
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
