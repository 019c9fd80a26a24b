mod db;
mod differ;
mod engine;
mod error;
mod fetch;
mod model;
mod parser;
mod settings;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use engine::Engine;
use model::{CheckOutcome, Report};
use settings::Settings;

#[derive(Parser)]
#[command(name = "isir_monitor", about = "Watch insolvency register case pages for new documents")]
struct Cli {
    /// SQLite file holding seen identities (overrides ISIR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Fetch timeout in seconds (overrides ISIR_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check each URL once and report new records
    Check {
        urls: Vec<String>,
        /// Print the full result envelope as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-check URLs periodically until interrupted
    Watch {
        urls: Vec<String>,
        /// Seconds between checks (overrides ISIR_INTERVAL_SECS)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Print the stored seen-set of a URL as a JSON array
    Seen { url: String },
    /// Merge identities from a JSON array file into a URL's seen-set
    Import { url: String, file: String },
    /// List monitored URLs and their last check
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Check { urls, json } => {
            if urls.is_empty() {
                println!("No URLs given.");
                return Ok(());
            }
            let urls = unique_urls(&urls);
            let engines = build_engines(&conn, &settings, &urls)?;
            for (url, engine) in urls.iter().zip(&engines) {
                let pb = spinner(url);
                let result = engine.process(url).await;
                pb.finish_and_clear();
                let outcome = persist(&conn, url, engine, result)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                } else {
                    print_outcome(url, &outcome);
                }
            }
            Ok(())
        }
        Commands::Watch { urls, interval } => {
            if urls.is_empty() {
                println!("No URLs given.");
                return Ok(());
            }
            let urls = unique_urls(&urls);
            let every = Duration::from_secs(interval.unwrap_or(settings.interval_secs).max(1));
            let engines = build_engines(&conn, &settings, &urls)?;
            watch(&conn, &urls, &engines, every).await
        }
        Commands::Seen { url } => {
            let seen = db::load_seen(&conn, &url)?;
            println!("{}", serde_json::to_string_pretty(&seen)?);
            Ok(())
        }
        Commands::Import { url, file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file))?;
            let ids: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of strings", file))?;
            let engine = build_engines(&conn, &settings, std::slice::from_ref(&url))?
                .pop()
                .context("no engine built")?;
            engine.import_seen(ids);
            let added = db::save_seen(&conn, &url, &engine.export_seen())?;
            println!("Imported {} new identities for {}", added, url);
            Ok(())
        }
        Commands::Status => {
            let sources = db::list_sources(&conn)?;
            if sources.is_empty() {
                println!("No monitored URLs yet. Run 'check' first.");
                return Ok(());
            }
            println!(
                "{:<60} | {:<25} | {:>5} | {:>5} | {:>5}",
                "URL", "Last check", "New", "Total", "Seen"
            );
            println!("{}", "-".repeat(112));
            for s in &sources {
                println!(
                    "{:<60} | {:<25} | {:>5} | {:>5} | {:>5}",
                    truncate(&s.url, 60),
                    s.last_check.as_deref().unwrap_or("-"),
                    s.new_count,
                    s.total_count,
                    s.seen
                );
                if let Some(err) = &s.last_error {
                    println!("    last error: {}", err);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("done in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

/// One engine per URL, each seeded with that URL's stored seen-set.
fn build_engines(conn: &Connection, settings: &Settings, urls: &[String]) -> Result<Vec<Engine>> {
    let client = fetch::build_client(settings).context("Failed to build HTTP client")?;
    urls.iter()
        .map(|url| {
            let seen = db::load_seen(conn, url)?;
            info!(url = url.as_str(), seen = seen.len(), "loaded seen identities");
            Ok(Engine::new(client.clone(), settings).with_seen(seen))
        })
        .collect()
}

/// Store what the pass learned and turn it into the envelope.
fn persist(
    conn: &Connection,
    url: &str,
    engine: &Engine,
    result: Result<Report, error::EngineError>,
) -> Result<CheckOutcome> {
    match &result {
        Ok(report) => {
            db::save_seen(conn, url, &engine.export_seen())?;
            db::record_check(conn, report)?;
        }
        Err(e) => {
            warn!(url, error = %e, "check failed");
            db::record_failure(conn, url, &Utc::now().to_rfc3339(), &e.to_string())?;
        }
    }
    Ok(CheckOutcome::from(result))
}

async fn watch(conn: &Connection, urls: &[String], engines: &[Engine], every: Duration) -> Result<()> {
    let mut ticker = ticker(every);
    println!(
        "Watching {} URL(s) every {}s. Ctrl-C to stop.",
        urls.len(),
        every.as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => break,
        }
        for (url, engine) in urls.iter().zip(engines) {
            // a pass dropped mid-fetch has not touched the seen-set yet
            let result = tokio::select! {
                result = engine.process(url) => result,
                _ = &mut ctrl_c => {
                    println!("\nStopped.");
                    return Ok(());
                }
            };
            let outcome = persist(conn, url, engine, result)?;
            print_outcome(url, &outcome);
        }
    }

    println!("\nStopped.");
    Ok(())
}

/// Slow passes push the schedule back instead of firing a catch-up burst.
fn ticker(every: Duration) -> Interval {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn spinner(url: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("checking {}", truncate(url, 70)));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_outcome(url: &str, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Error { message } => {
            println!("{}: error: {}", url, message);
        }
        CheckOutcome::Ok(report) => {
            let title = report
                .case_info
                .case_number
                .as_deref()
                .or(report.case_info.name.as_deref())
                .unwrap_or(url);
            if report.baseline {
                println!("{}: baseline recorded ({} records)", title, report.total_count);
            } else {
                println!(
                    "{}: {} new of {} records",
                    title, report.new_count, report.total_count
                );
            }
            if !report.case_info.is_empty() {
                let info = &report.case_info;
                let parts: Vec<&str> = [&info.name, &info.status, &info.authority]
                    .into_iter()
                    .filter_map(|field| field.as_deref())
                    .collect();
                if !parts.is_empty() {
                    println!("  {}", parts.join(" | "));
                }
            }
            for (tag, reason) in &report.section_errors {
                println!("  section {} failed: {}", tag, reason);
            }
            for (tag, r) in report.new_records() {
                let marker = if r.is_muted { " (muted)" } else { "" };
                println!(
                    "  [{}] {:<10} {:<17} {}{}",
                    tag,
                    r.id,
                    r.timestamp_text,
                    truncate(&r.description, 60),
                    marker
                );
                if let Some(link) = &r.attachment_url {
                    println!("      {}", link);
                }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

/// The same page twice would mean two seen-sets for one source.
fn unique_urls(urls: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    urls.iter().filter(|u| seen.insert(u.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_passes_delay_the_next_tick() {
        let ticker = ticker(Duration::from_secs(60));
        assert_eq!(ticker.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert_eq!(ticker.period(), Duration::from_secs(60));
    }

    #[test]
    fn repeated_urls_collapse_in_order() {
        let urls = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(unique_urls(&urls), vec!["b", "a"]);
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("žluťoučký", 4), "žluť...");
        assert_eq!(truncate("kůň", 3), "kůň");
    }
}
