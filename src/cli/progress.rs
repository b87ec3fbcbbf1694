//! Multi-progress display for the fetch workers.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// One summary bar plus a status line per worker.
pub struct FetchProgress {
    multi: MultiProgress,
    summary: ProgressBar,
    workers: Vec<ProgressBar>,
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or(fallback)
}

impl FetchProgress {
    pub fn new(num_workers: usize, total: u64) -> Self {
        let multi = MultiProgress::new();

        let summary = multi.add(ProgressBar::new(total));
        summary.set_style(style(
            "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({eta})",
            ProgressStyle::default_bar(),
        ));
        summary.set_message("Fetching");

        let workers = (0..num_workers)
            .map(|_| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style("  {spinner:.dim} {wide_msg}", ProgressStyle::default_spinner()));
                bar.set_message("idle");
                bar
            })
            .collect();

        Self {
            multi,
            summary,
            workers,
        }
    }

    pub fn start(&self, worker_id: usize, url: &str) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.set_message(truncate_url(url, 60));
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
        }
    }

    pub fn finish_item(&self, worker_id: usize) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.disable_steady_tick();
            bar.set_message("idle");
        }
        self.summary.inc(1);
    }

    pub fn set_summary(&self, fetched: usize, failed: usize, events: usize) {
        self.summary.set_message(format!(
            "Fetched: {} | Failed: {} | Events: {}",
            fetched, failed, events
        ));
    }

    /// Print above the bars without corrupting them.
    pub fn println(&self, message: &str) {
        let _ = self.multi.println(message);
    }

    pub fn finish(&self) {
        for bar in &self.workers {
            bar.finish_and_clear();
        }
        self.summary.finish_and_clear();
    }
}

/// Shorten a URL for display, keeping its tail (the listing id) visible.
fn truncate_url(url: &str, max_len: usize) -> String {
    let count = url.chars().count();
    if count <= max_len {
        return url.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let tail: String = url.chars().skip(count - keep).collect();
    format!("...{}", tail)
}
