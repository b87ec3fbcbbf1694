//! Retry and export commands.

use std::path::Path;

use console::style;

use crate::admin::QueueAdmin;
use crate::cli::helpers::{database_exists, format_number, open_database};
use crate::config::Settings;

/// Return failed items below the attempt cap to pending.
pub async fn cmd_retry(settings: &Settings, max_attempts: Option<u32>) -> anyhow::Result<()> {
    let max_attempts = max_attempts.unwrap_or(settings.max_attempts);
    let ctx = open_database(settings).await?;
    let admin = QueueAdmin::new(ctx, settings.index_dir.clone());
    let reset = admin.retry(max_attempts).await?;

    if reset == 0 {
        println!(
            "{} No failed items with fewer than {} attempts",
            style("!").yellow(),
            max_attempts
        );
    } else {
        println!(
            "{} Returned {} items to the queue",
            style("✓").green(),
            format_number(reset as u64)
        );
        println!(
            "  {} Run 'listing-history fetch' to process them",
            style("→").dim()
        );
    }
    Ok(())
}

/// Export price events with listing metadata to CSV.
pub async fn cmd_export(settings: &Settings, output: &Path) -> anyhow::Result<()> {
    if !database_exists(settings) {
        anyhow::bail!(
            "no database at {}; run 'listing-history queue' and 'listing-history fetch' first",
            settings.database_path().display()
        );
    }
    let ctx = open_database(settings).await?;
    let admin = QueueAdmin::new(ctx, settings.index_dir.clone());
    let rows = admin.export(output).await?;

    println!(
        "{} Exported {} price events to {}",
        style("✓").green(),
        format_number(rows as u64),
        output.display()
    );
    Ok(())
}
