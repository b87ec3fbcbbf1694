//! Snapshot fetch command.

use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use crate::cli::helpers::{format_number, open_database};
use crate::cli::progress::FetchProgress;
use crate::config::Settings;
use crate::extract::Extractor;
use crate::fetch::{ArchiveClient, FetchEvent, FetchOptions, FetchWorkerPool};
use crate::models::ContentCategory;

/// Fetch pending snapshots and persist what they contain.
pub async fn cmd_fetch(
    settings: &Settings,
    concurrency: Option<usize>,
    rate: Option<f64>,
    limit: Option<usize>,
    category: Option<ContentCategory>,
) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;

    let mut options = FetchOptions::from_settings(settings);
    if let Some(concurrency) = concurrency {
        options.concurrency = concurrency.max(1);
    }
    if let Some(rate) = rate {
        options.rate = rate;
    }
    options.limit = limit;
    options.category = category;

    let source = Arc::new(ArchiveClient::from_settings(settings)?);
    let extractor = Arc::new(Extractor::for_site(&settings.site)?);
    let pool = FetchWorkerPool::new(ctx, source, extractor, settings.retry_policy());

    println!(
        "{} Starting {} fetch workers at {} req/s",
        style("→").cyan(),
        options.concurrency,
        options.rate
    );

    let (event_tx, mut event_rx) = mpsc::channel::<FetchEvent>(100);
    let workers = options.concurrency;
    let show_progress = console::Term::stderr().is_term();

    let event_handler = tokio::spawn(async move {
        let mut progress: Option<FetchProgress> = None;
        let (mut fetched, mut failed, mut events) = (0usize, 0usize, 0usize);

        while let Some(event) = event_rx.recv().await {
            match event {
                FetchEvent::Claimed { total } => {
                    if show_progress && total > 0 {
                        progress = Some(FetchProgress::new(workers, total as u64));
                    }
                }
                FetchEvent::Started { worker_id, url } => {
                    if let Some(ref p) = progress {
                        p.start(worker_id, &url);
                    }
                }
                FetchEvent::Fetched {
                    worker_id,
                    events: n,
                    ..
                } => {
                    fetched += 1;
                    events += n;
                    if let Some(ref p) = progress {
                        p.set_summary(fetched, failed, events);
                        p.finish_item(worker_id);
                    }
                }
                FetchEvent::Failed {
                    worker_id,
                    url,
                    error,
                } => {
                    failed += 1;
                    if let Some(ref p) = progress {
                        p.println(&format!("{} {}: {}", style("✗").red(), url, error));
                        p.set_summary(fetched, failed, events);
                        p.finish_item(worker_id);
                    }
                }
                FetchEvent::Skipped { worker_id, .. } => {
                    if let Some(ref p) = progress {
                        p.finish_item(worker_id);
                    }
                }
            }
        }

        if let Some(ref p) = progress {
            p.finish();
        }
    });

    let summary = pool.run(options, Some(event_tx)).await?;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }

    if summary.claimed == 0 {
        println!("{} No pending items to fetch", style("!").yellow());
        println!(
            "  {} Run 'listing-history queue' to build the queue",
            style("→").dim()
        );
        return Ok(());
    }

    println!(
        "{} Fetched {} of {} items in {:.1}s",
        style("✓").green(),
        format_number(summary.fetched as u64),
        format_number(summary.claimed as u64),
        summary.elapsed_secs
    );
    println!(
        "  {} {} price events recorded",
        style("→").dim(),
        format_number(summary.events as u64)
    );
    if summary.failed > 0 {
        println!(
            "  {} {} items failed; see 'listing-history status' and 'listing-history retry'",
            style("!").yellow(),
            format_number(summary.failed as u64)
        );
    }
    if summary.skipped > 0 {
        println!(
            "  {} {} items were already handled elsewhere",
            style("→").dim(),
            format_number(summary.skipped as u64)
        );
    }
    Ok(())
}
