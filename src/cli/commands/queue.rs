//! Queue build command.

use console::style;

use crate::classify::Classifier;
use crate::cli::helpers::{format_number, open_database};
use crate::config::Settings;
use crate::queue::QueueBuilder;

/// Turn downloaded index pages into pending work items.
pub async fn cmd_queue(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let classifier = Classifier::new(&settings.site)?;
    let report = QueueBuilder::new(ctx, classifier, settings.index_dir.clone())
        .build_queue()
        .await?;

    println!("{}", style("INDEX SCAN").cyan().bold());
    println!("  {:<20} {:>12}", "Pages:", format_number(report.pages as u64));
    println!("  {:<20} {:>12}", "Records:", format_number(report.records as u64));
    println!("  {:<20} {:>12}", "Rejected:", format_number(report.rejected as u64));
    println!("  {:<20} {:>12}", "Non-200:", format_number(report.non_ok as u64));
    println!("  {:<20} {:>12}", "Duplicates:", format_number(report.duplicates as u64));
    if report.malformed_pages > 0 || report.malformed_rows > 0 {
        println!(
            "  {} skipped {} malformed pages and {} malformed rows",
            style("!").yellow(),
            report.malformed_pages,
            report.malformed_rows
        );
    }

    println!();
    println!("{}", style("QUEUE").cyan().bold());
    println!(
        "  {:<20} {:>12}",
        "Unique URLs:",
        format_number(report.unique_urls as u64)
    );
    for (category, count) in &report.by_category {
        println!(
            "  {:<20} {:>12}",
            format!("New {}:", category),
            format_number(*count as u64)
        );
    }
    if report.advanced > 0 {
        println!(
            "  {:<20} {:>12}",
            "Newer snapshot:",
            format_number(report.advanced as u64)
        );
    }

    println!(
        "{} Added {} work items",
        style("✓").green(),
        format_number(report.inserted as u64)
    );
    Ok(())
}
