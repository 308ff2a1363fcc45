mod catalog;
mod config;
mod crawl;
mod db;
mod fetch;
mod parser;
mod tables;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{Mutex, Semaphore};
use tracing::warn;

use crate::config::Config;
use crate::db::TranslationStore;
use crate::fetch::{FetchOutcome, HttpFetcher, PageFetcher};
use crate::parser::TranslationRow;

#[derive(Parser)]
#[command(
    name = "multitran_scraper",
    about = "English-Russian dictionary scraper for multitran.com"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate words from a tab-delimited table
    Translate {
        /// Input table, one word per row
        #[arg(short, long, default_value = "tables/input.tsv")]
        input: String,
        /// Output table
        #[arg(short, long, default_value = "tables/output.tsv")]
        output: String,
        /// Zero-based column holding the word to translate
        #[arg(short, long, default_value = "0")]
        column: usize,
        /// Keep only the recommended row of each block
        #[arg(short, long)]
        recommended_only: bool,
        /// Dictionary label to skip (repeatable; default: разг.)
        #[arg(short, long)]
        exclude: Option<Vec<String>>,
        /// Concurrent page fetches
        #[arg(long, default_value = "8")]
        concurrency: usize,
        /// Per-request timeout in seconds
        #[arg(long, default_value = "90")]
        timeout_secs: u64,
        /// Mirror host to scrape
        #[arg(long, default_value = config::DEFAULT_HOST)]
        host: String,
    },
    /// Crawl the full dictionary catalog into a local store
    Crawl {
        /// SQLite database path
        #[arg(long, default_value = "data/multitran.sqlite")]
        db: String,
        /// Write rows to a flat TSV file instead of SQLite
        #[arg(long)]
        flat: Option<String>,
        /// Concurrent dictionary crawls
        #[arg(long, default_value = "8")]
        concurrency: usize,
        /// Per-request timeout in seconds
        #[arg(long, default_value = "90")]
        timeout_secs: u64,
        /// Mirror host to scrape
        #[arg(long, default_value = config::DEFAULT_HOST)]
        host: String,
    },
    /// Show store statistics
    Stats {
        /// SQLite database path
        #[arg(long, default_value = "data/multitran.sqlite")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Translate {
            input,
            output,
            column,
            recommended_only,
            exclude,
            concurrency,
            timeout_secs,
            host,
        } => {
            let config = Config {
                host,
                translate_column: column,
                excluded_dictionaries: exclude
                    .map(|list| list.into_iter().collect::<HashSet<_>>())
                    .unwrap_or_else(|| Config::default().excluded_dictionaries),
                recommended_only,
                concurrency,
                timeout: Duration::from_secs(timeout_secs),
            };
            run_translate(&input, &output, &config).await
        }
        Commands::Crawl {
            db,
            flat,
            concurrency,
            timeout_secs,
            host,
        } => {
            let config = Config {
                host,
                concurrency,
                timeout: Duration::from_secs(timeout_secs),
                ..Config::default()
            };
            match flat {
                Some(path) => run_crawl(db::FlatStore::create(&path)?, &config).await,
                None => run_crawl(db::SqliteStore::open(&db)?, &config).await,
            }
        }
        Commands::Stats { db } => run_stats(&db),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct FetchedPage {
    index: usize,
    input_row: Vec<String>,
    word: String,
    outcome: FetchOutcome,
}

struct ParsedPage {
    input_row: Vec<String>,
    word: String,
    /// None when the page fetch was lost.
    rows: Option<Vec<TranslationRow>>,
}

async fn run_translate(input: &str, output: &str, config: &Config) -> anyhow::Result<()> {
    let rows = tables::read_input_rows(input)?;
    if rows.is_empty() {
        println!("No input rows in {}.", input);
        return Ok(());
    }
    println!(
        "Translating {} words ({} concurrent fetches)...",
        rows.len(),
        config.concurrency
    );

    // Phase 1: Fetch (streaming)
    let t_fetch = Instant::now();
    let fetched = fetch_all(&rows, config).await?;
    println!(
        "Fetched {} pages in {:.1}s",
        fetched.len(),
        t_fetch.elapsed().as_secs_f64()
    );

    // Phase 2: Parse (CPU-bound)
    let t_parse = Instant::now();
    let parsed = parse_all(fetched, config);
    println!("Parsed in {:.1}s", t_parse.elapsed().as_secs_f64());

    // Phase 3: Write, in input order
    let with_marker = !config.recommended_only;
    let mut writer = tables::open_output_writer(output)?;
    let mut translated = 0usize;
    let mut written = 0usize;
    let mut without = 0usize;
    let mut lost = 0usize;
    for page in parsed {
        let Some(rows) = page.rows else {
            lost += 1;
            continue;
        };
        let kept: Vec<&TranslationRow> = if config.recommended_only {
            rows.iter().filter(|row| row.recommended).collect()
        } else {
            rows.iter().collect()
        };
        if kept.is_empty() {
            without += 1;
            warn!("No translations for '{}'", page.word);
            continue;
        }
        translated += 1;
        for row in kept {
            writer.write_record(tables::output_record(&page.input_row, row, with_marker))?;
            written += 1;
        }
    }
    writer.flush()?;

    println!(
        "Done: {} words translated ({} rows), {} without translations, {} lost to fetch errors.",
        translated, written, without, lost
    );
    println!("Output written to {}", output);
    Ok(())
}

/// Fetch every word's page concurrently, streaming results back as they land.
async fn fetch_all(rows: &[Vec<String>], config: &Config) -> anyhow::Result<Vec<FetchedPage>> {
    let fetcher = Arc::new(HttpFetcher::new(config.timeout)?);
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let total = rows.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<FetchedPage>(config.concurrency * 2);

    for (index, input_row) in rows.iter().enumerate() {
        let word = match input_row.get(config.translate_column) {
            Some(cell) if !cell.trim().is_empty() => cell.trim().to_string(),
            _ => {
                warn!(
                    "Row {} has no word in column {}, skipping",
                    index + 1,
                    config.translate_column
                );
                continue;
            }
        };
        let url = fetch::translation_url(&config.host, &word)?;
        let input_row = input_row.clone();
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let outcome = fetcher.fetch_page(&url).await;
            let _ = tx
                .send(FetchedPage {
                    index,
                    input_row,
                    word,
                    outcome,
                })
                .await;
        });
    }
    drop(tx);

    let mut fetched = Vec::with_capacity(total);
    while let Some(page) = rx.recv().await {
        pb.inc(1);
        fetched.push(page);
    }
    pb.finish_and_clear();
    Ok(fetched)
}

/// Parse fetched pages in parallel, restoring input order first.
fn parse_all(mut fetched: Vec<FetchedPage>, config: &Config) -> Vec<ParsedPage> {
    use rayon::prelude::*;

    fetched.sort_by_key(|page| page.index);

    let pb = ProgressBar::new(fetched.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut parsed = Vec::with_capacity(fetched.len());
    for chunk in fetched.chunks(500) {
        let results: Vec<ParsedPage> = chunk
            .par_iter()
            .map(|page| {
                let rows = match &page.outcome {
                    FetchOutcome::Success(body) => Some(parser::parse_translation_page(
                        body,
                        &page.word,
                        &config.excluded_dictionaries,
                    )),
                    FetchOutcome::Timeout(url) => {
                        warn!("Timeout fetching {}", url);
                        None
                    }
                    FetchOutcome::Failed(reason) => {
                        warn!("Fetch failed for '{}': {}", page.word, reason);
                        None
                    }
                };
                ParsedPage {
                    input_row: page.input_row.clone(),
                    word: page.word.clone(),
                    rows,
                }
            })
            .collect();
        parsed.extend(results);
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    parsed
}

async fn run_crawl<S>(store: S, config: &Config) -> anyhow::Result<()>
where
    S: TranslationStore + Send + 'static,
{
    let fetcher = Arc::new(HttpFetcher::new(config.timeout)?);
    let store = Arc::new(Mutex::new(store));
    println!(
        "Crawling dictionary catalog ({} concurrent dictionaries)...",
        config.concurrency
    );
    let stats = crawl::crawl_all(fetcher, store, config).await?;
    println!(
        "Done: {} dictionaries ({} complete, {} exhausted, {} lost), {} rows stored.",
        stats.dictionaries, stats.reached, stats.exhausted, stats.lost, stats.stored
    );
    Ok(())
}

fn run_stats(path: &str) -> anyhow::Result<()> {
    let conn = db::connect(path)?;
    db::init_schema(&conn)?;
    let stats = db::get_stats(&conn)?;
    println!("Translations: {}", stats.translations);
    println!("Dictionaries: {}", stats.dictionaries);
    println!("Quarantined:  {}", stats.quarantined);

    let top = db::fetch_top_dictionaries(&conn, 15)?;
    if !top.is_empty() {
        println!("\n{:>3} | {:<32} | {:>8}", "#", "Dictionary", "Rows");
        println!("{}", "-".repeat(49));
        for (i, (name, count)) in top.iter().enumerate() {
            println!("{:>3} | {:<32} | {:>8}", i + 1, truncate(name, 32), count);
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
