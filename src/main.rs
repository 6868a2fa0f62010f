mod browser;
mod cache;
mod cli;
mod config;
mod error;
mod extract;
mod model;
mod output;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::AppConfig;
use error::ShopgrabError;

use crate::browser::navigation::Navigator;
use crate::browser::session::BrowserSession;
use crate::cache::Cache;
use crate::extract::page::PageSnapshot;
use crate::extract::ExtractorRegistry;

/// Platform assumed for `parse` runs that do not pass `--url`.
const DEFAULT_PLATFORM: &str = "aliexpress";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "shopgrab=debug"
    } else {
        "shopgrab=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load(cli.no_cache, cli.delay, cli.debug);

    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted. Cleaning up...");
        std::process::exit(130);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut browser_session: Option<BrowserSession> = None;

    match cli.command {
        Commands::Extract { url, json } => {
            cmd_extract(&config, &mut browser_session, &url, json).await?;
        }
        Commands::Parse { file, url, json } => {
            cmd_parse(&file, url.as_deref(), json)?;
        }
    }

    if let Some(session) = browser_session.take() {
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
    }

    Ok(())
}

async fn cmd_extract(
    config: &AppConfig,
    browser_session: &mut Option<BrowserSession>,
    url: &str,
    json: bool,
) -> Result<()> {
    let registry = ExtractorRegistry::with_defaults();
    let extractor = registry
        .for_url(url)
        .ok_or_else(|| ShopgrabError::UnsupportedPlatform(url.to_string()))?;
    let platform = extractor.platform();

    let cache = Cache::new(config.cache_dir.clone(), config.no_cache);
    if let Some(cached) = cache.get_record::<model::ProductRecord>(platform, url) {
        print_record(&cached, json)?;
        return Ok(());
    }

    let session = get_or_launch_browser(config, browser_session).await?;
    let page = session.new_page().await?;
    let navigator = Navigator::new(config.delay_ms);

    let snapshot = extract::live::acquire_with_retry(&page, &navigator, url, 2)
        .await
        .context("Failed to load product page")?;

    if config.debug {
        extract::helpers::debug_dump_html(&snapshot.html, platform);
    }

    if extract::helpers::is_not_found_page(&snapshot.html) {
        return Err(ShopgrabError::ProductNotFound(url.to_string()).into());
    }

    let record = extractor.extract(&snapshot);

    // Catch dead listings that render without tripping 404 detection.
    if record.is_empty() {
        return Err(ShopgrabError::ProductNotFound(url.to_string()).into());
    }

    if let Err(e) = cache.set_record(platform, url, &record) {
        tracing::debug!("Failed to cache record: {}", e);
    }

    print_record(&record, json)?;
    Ok(())
}

fn cmd_parse(file: &Path, url: Option<&str>, json: bool) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let registry = ExtractorRegistry::with_defaults();
    let extractor = match url {
        Some(u) => registry
            .for_url(u)
            .ok_or_else(|| ShopgrabError::UnsupportedPlatform(u.to_string()))?,
        None => registry
            .get(DEFAULT_PLATFORM)
            .ok_or_else(|| ShopgrabError::UnsupportedPlatform(DEFAULT_PLATFORM.to_string()))?,
    };

    let snapshot = PageSnapshot::from_html(url.unwrap_or_default(), html);
    let record = extractor.extract(&snapshot);

    print_record(&record, json)?;
    Ok(())
}

fn print_record(record: &model::ProductRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!("{}", output::format_record(record));
    }
    Ok(())
}

async fn get_or_launch_browser<'a>(
    config: &AppConfig,
    session: &'a mut Option<BrowserSession>,
) -> Result<&'a BrowserSession> {
    if session.is_none() {
        let chrome_path =
            browser::resolve::resolve_chrome(config.browser_path.as_ref(), &config.data_dir)
                .await
                .context("Failed to resolve Chrome browser")?;

        let launched = BrowserSession::launch(chrome_path, config)
            .await
            .context("Failed to launch browser")?;

        *session = Some(launched);
    }
    Ok(session.as_ref().unwrap())
}
