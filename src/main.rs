// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (tracing, to stderr, filtered by RUST_LOG)
// 2. Parse command-line arguments using clap
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = success, 1 = some pages failed, 2 = error)
//
// Records go to stdout (or --output); logs and the summary go to stderr, so
// `rule-crawler crawl config.json > records.jsonl` does the right thing.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use rule_crawler::config::CrawlConfig;
use rule_crawler::crawl::{CrawlDriver, CrawlSummary, HttpFetcher, JsonLinesSink, Rule, StopSignal};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// Returns:
//   Ok(0) = crawl finished, every page fetched
//   Ok(1) = crawl finished, some pages failed
//   Err   = config or setup error (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            config,
            output,
            max_pages,
            concurrency,
            json,
        } => handle_crawl(&config, output, max_pages, concurrency, json).await,
        Commands::Check { config } => handle_check(&config),
    }
}

async fn handle_crawl(
    config_path: &Path,
    output: Option<PathBuf>,
    max_pages: Option<usize>,
    concurrency: Option<usize>,
    json: bool,
) -> Result<i32> {
    let mut config = CrawlConfig::load(config_path)?;
    if max_pages.is_some() {
        config.max_pages = max_pages;
    }
    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency;
    }

    let plan = config
        .compile()
        .with_context(|| format!("invalid config {}", config_path.display()))?;

    info!(
        seeds = plan.start_urls.len(),
        rules = plan.rules.len(),
        domains = ?plan.allowed_domains,
        "starting crawl"
    );

    let fetcher = HttpFetcher::new(plan.fetch.clone(), plan.allowed_domains.clone())
        .context("failed to build HTTP client")?;

    // Ctrl-C: stop popping new pages, finish the ones in flight
    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing in-flight pages");
                stop.stop();
            }
        });
    }

    let driver = CrawlDriver::new(plan).with_stop_signal(stop);

    let summary = match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("could not create {}", path.display()))?;
            let mut sink = JsonLinesSink::new(BufWriter::new(file));
            let summary = driver.run(&fetcher, &mut sink).await;
            sink.into_inner();
            summary
        }
        None => {
            let mut sink = JsonLinesSink::new(io::stdout().lock());
            let summary = driver.run(&fetcher, &mut sink).await;
            sink.into_inner();
            summary
        }
    };

    print_summary(&summary, json)?;

    if summary.failed > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn handle_check(config_path: &Path) -> Result<i32> {
    let config = CrawlConfig::load(config_path)?;
    let plan = config
        .compile()
        .with_context(|| format!("invalid config {}", config_path.display()))?;

    println!("✅ {} is valid", config_path.display());
    println!("   Allowed domains: {}", plan.allowed_domains.join(", "));
    println!("   Start URLs: {}", plan.start_urls.len());
    println!();
    println!("{:<4} {:<12} {:<30} {:<30}", "#", "KIND", "PATTERN", "FIELDS");
    println!("{}", "=".repeat(76));

    for rule in plan.rules.iter() {
        let fields = match rule {
            Rule::Navigation(_) => "-".to_string(),
            Rule::Extraction(extraction) => extraction
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        };
        println!(
            "{:<4} {:<12} {:<30} {:<30}",
            rule.index(),
            rule.kind(),
            rule.pattern().as_str(),
            fields
        );
    }

    Ok(0)
}

// Prints the summary to stderr, as a table or as JSON
fn print_summary(summary: &CrawlSummary, json: bool) -> Result<()> {
    let mut err = io::stderr().lock();

    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        writeln!(err, "{}", json_output)?;
        return Ok(());
    }

    writeln!(err)?;
    writeln!(err, "📊 Summary:")?;
    writeln!(err, "   📄 Visited: {}", summary.visited)?;
    writeln!(err, "   ❌ Failed: {}", summary.failed)?;
    writeln!(err, "   📦 Records: {}", summary.records)?;
    writeln!(err, "   ⏳ Still queued: {}", summary.pending)?;
    writeln!(err, "   🏁 Stopped because: {:?}", summary.stop_reason)?;
    Ok(())
}
