//! Search command

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use spotlight_query::{ChannelSink, MemoryFixture, MemorySubstrate, Spotlight, Substrate};

use crate::config::Config;
use crate::output::{format_report, OutputFormat, SearchReport};
use crate::Cli;

#[derive(Args)]
pub struct SearchArgs {
    /// Query expression, passed to the index verbatim
    pub query: String,

    /// Attribute to print for each result
    #[arg(short, long)]
    pub attribute: Option<String>,

    /// Only search under this directory
    #[arg(long)]
    pub onlyin: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Give up after this many seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Print at most this many results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Answer from a JSON fixture instead of the system index
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

fn fixture_substrate(path: &Path) -> anyhow::Result<Arc<dyn Substrate>> {
    let fixture = MemoryFixture::load(path)
        .with_context(|| format!("loading fixture {}", path.display()))?;
    tracing::debug!("Using fixture {} ({} queries)", path.display(), fixture.queries.len());
    Ok(Arc::new(MemorySubstrate::from_fixture(fixture)))
}

#[cfg(feature = "mdfind")]
fn index_substrate(args: &SearchArgs, config: &Config) -> anyhow::Result<Arc<dyn Substrate>> {
    let mut substrate = spotlight_query::MdfindSubstrate::new();
    if let Some(path) = &config.mdfind_path {
        substrate = substrate.with_mdfind(path);
    }
    if let Some(dir) = args.onlyin.as_ref().or(config.onlyin.as_ref()) {
        substrate = substrate.with_onlyin(dir);
    }
    Ok(Arc::new(substrate))
}

#[cfg(not(feature = "mdfind"))]
fn index_substrate(_args: &SearchArgs, _config: &Config) -> anyhow::Result<Arc<dyn Substrate>> {
    anyhow::bail!("built without mdfind support; use --fixture")
}

pub async fn run(args: &SearchArgs, cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let format = OutputFormat::from(cli.format.as_deref().unwrap_or(&config.format));

    let mut query_config = config.query_config();
    if let Some(attribute) = &args.attribute {
        query_config = query_config.with_attribute(attribute.clone());
    }
    if let Some(ms) = args.interval_ms {
        query_config.poll.interval_ms = ms;
    }
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.timeout_secs));

    let substrate = match &args.fixture {
        Some(path) => fixture_substrate(path)?,
        None => index_substrate(args, &config)?,
    };
    let spotlight = Spotlight::new(substrate, query_config)?;
    let (sink, mut rx) = ChannelSink::new();
    let query = spotlight.query(sink)?;

    if let Err(e) = query.search(&args.query) {
        query.stop_event_loop();
        return Err(e).with_context(|| format!("search failed: {}", args.query));
    }

    let summary = match tokio::time::timeout(timeout, query.wait()).await {
        Ok(summary) => summary.with_context(|| format!("search failed: {}", args.query))?,
        Err(_) => {
            query.stop();
            query.stop_event_loop();
            anyhow::bail!("search timed out after {}s", timeout.as_secs());
        }
    };
    if let Some(error) = &summary.error {
        tracing::warn!("Results incomplete: {}", error);
    }

    let mut results = Vec::new();
    while let Some(value) = rx.recv().await {
        results.push(value);
    }
    let limit = args.limit.unwrap_or(usize::MAX);
    let truncated = results.len().saturating_sub(limit);
    results.truncate(limit);

    tracing::info!(
        "Search returned {} results ({} updates)",
        summary.total,
        summary.updates
    );

    if results.is_empty() && format == OutputFormat::Table {
        println!("No results found for '{}'", args.query);
        return Ok(());
    }

    let report = SearchReport {
        query: &args.query,
        attribute: query.attribute(),
        results: &results,
        truncated,
        summary: &summary,
    };
    print!("{}", format_report(&report, format));
    Ok(())
}
