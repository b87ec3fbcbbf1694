//! Status command for showing pipeline state.

use console::style;

use crate::admin::QueueAdmin;
use crate::cli::helpers::{database_exists, format_bytes, format_number, open_database};
use crate::config::Settings;
use crate::models::WorkItemStatus;

const TOP_ERRORS: usize = 10;

/// Show queue, extraction and index statistics.
pub async fn cmd_status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    if !database_exists(settings) {
        println!(
            "{} No database yet. Run 'listing-history index' and 'listing-history queue' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let ctx = open_database(settings).await?;
    let status = QueueAdmin::new(ctx, settings.index_dir.clone())
        .status(TOP_ERRORS)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let separator = "─".repeat(60);
    println!();
    println!("{}", style("listing-history status").bold());
    println!("{}", separator);
    println!("Database: {}", settings.database_url());
    println!("Index:    {}", settings.index_dir.display());
    println!();

    println!("{}", style("QUEUE").cyan().bold());
    println!("  {:<20} {:>12}", "Total:", format_number(status.total));
    for item_status in [
        WorkItemStatus::Pending,
        WorkItemStatus::Fetched,
        WorkItemStatus::Error,
    ] {
        println!(
            "  {:<20} {:>12}",
            format!("{}:", item_status.as_str()),
            format_number(status.count(item_status))
        );
    }
    println!();

    if !status.by_category.is_empty() {
        println!(
            "{:<31} {:>10} {:>10} {:>10}",
            style("CATEGORIES").cyan().bold(),
            "Pending",
            "Fetched",
            "Error"
        );
        for (category, counts) in &status.by_category {
            let get = |s: WorkItemStatus| counts.get(s.as_str()).copied().unwrap_or(0);
            println!(
                "  {:<20} {:>10} {:>10} {:>10}",
                category,
                format_number(get(WorkItemStatus::Pending)),
                format_number(get(WorkItemStatus::Fetched)),
                format_number(get(WorkItemStatus::Error))
            );
        }
        println!();
    }

    println!("{}", style("EXTRACTED").cyan().bold());
    println!(
        "  {:<20} {:>12}",
        "Metadata:",
        format_number(status.extracted.metadata)
    );
    println!(
        "  {:<20} {:>12}",
        "Price events:",
        format_number(status.extracted.price_events)
    );
    for (source, count) in &status.events_by_source {
        println!(
            "    {:<18} {:>12}",
            style(source).dim(),
            format_number(*count)
        );
    }
    println!(
        "  {:<20} {:>12}",
        "Child URLs:",
        format_number(status.extracted.child_urls)
    );
    println!();

    if !status.index.is_empty() {
        println!("{}", style("INDEX FILES").cyan().bold());
        for pattern in &status.index {
            println!(
                "  {:<36} {:>6} pages {:>10}",
                pattern.pattern,
                format_number(pattern.files as u64),
                format_bytes(pattern.bytes)
            );
        }
        println!();
    }

    if !status.top_errors.is_empty() {
        println!("{}", style("TOP ERRORS").cyan().bold());
        for error in &status.top_errors {
            println!(
                "  {:>8}  {}",
                format_number(error.count),
                style(&error.message).red()
            );
        }
        println!();
    }

    Ok(())
}
