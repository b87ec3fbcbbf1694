//! Index download command.

use console::style;

use crate::cli::helpers::format_number;
use crate::config::Settings;
use crate::index::IndexFetcher;

/// Download every missing snapshot index page.
pub async fn cmd_index(settings: &Settings, concurrency: Option<usize>) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let patterns = &settings.site.index_patterns;
    if patterns.is_empty() {
        anyhow::bail!("no index patterns configured for {}", settings.site.host);
    }

    let concurrency = concurrency.unwrap_or(settings.index_concurrency);
    println!(
        "{} Downloading index for {} patterns ({} pages at a time)",
        style("→").cyan(),
        patterns.len(),
        concurrency
    );

    let fetcher = IndexFetcher::from_settings(settings)?;
    let report = fetcher.download_index(patterns, concurrency).await?;

    for pattern in &report.patterns {
        if let Some(ref error) = pattern.error {
            println!(
                "  {} {}: {}",
                style("✗").red(),
                pattern.pattern,
                error
            );
            continue;
        }
        let marker = if pattern.failed > 0 {
            style("!").yellow()
        } else {
            style("✓").green()
        };
        println!(
            "  {} {:<40} {:>6} pages, {} new, {} present, {} failed",
            marker,
            pattern.pattern,
            format_number(pattern.total_pages as u64),
            pattern.downloaded,
            pattern.already_present,
            pattern.failed
        );
    }

    if report.is_complete() {
        println!(
            "{} Index complete: {} new pages in {}",
            style("✓").green(),
            report.downloaded(),
            fetcher.index_dir().display()
        );
    } else {
        println!(
            "{} Index incomplete ({} pages failed); run 'listing-history index' again to resume",
            style("!").yellow(),
            report.failed()
        );
    }
    Ok(())
}
