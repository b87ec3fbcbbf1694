//! HTML history table fallback.

use scraper::{ElementRef, Selector};

use super::events::RawEvent;
use super::text::{normalize_whitespace, parse_date, parse_price, DATE_RE};
use super::{ExtractionStrategy, Page, StrategyOutput};

pub struct HistoryTable;

fn cell_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Tables with header cells must name a date column and a price or rent column.
fn looks_like_history(headers: &[String]) -> bool {
    if headers.is_empty() {
        return true;
    }
    let joined = headers.join(" ").to_lowercase();
    joined.contains("date") && (joined.contains("price") || joined.contains("rent"))
}

fn row_event(cells: &[String]) -> RawEvent {
    let date_idx = cells.iter().position(|c| DATE_RE.is_match(c));
    let price_idx = cells.iter().position(|c| c.contains('$'));
    let label = cells
        .iter()
        .enumerate()
        .find(|(i, _)| Some(*i) != date_idx && Some(*i) != price_idx)
        .map(|(_, c)| c.clone());

    RawEvent {
        date: date_idx.and_then(|i| parse_date(&cells[i])),
        label,
        price: price_idx.and_then(|i| parse_price(&cells[i])),
        ..Default::default()
    }
}

impl ExtractionStrategy for HistoryTable {
    fn name(&self) -> &'static str {
        "html_table"
    }

    fn try_extract(&self, page: &Page) -> Option<StrategyOutput> {
        if !page.content.contains("<table") && !page.content.contains("<TABLE") {
            return None;
        }

        let table_sel = Selector::parse("table").ok()?;
        let th_sel = Selector::parse("th").ok()?;
        let tr_sel = Selector::parse("tr").ok()?;
        let td_sel = Selector::parse("td").ok()?;

        let mut events = Vec::new();
        for table in page.document().select(&table_sel) {
            let headers: Vec<String> = table.select(&th_sel).map(cell_text).collect();
            if !looks_like_history(&headers) {
                continue;
            }

            for tr in table.select(&tr_sel) {
                let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
                if cells.len() < 2 {
                    continue;
                }
                if let Some(event) = row_event(&cells).into_event(self.name()) {
                    events.push(event);
                }
            }
        }

        (!events.is_empty()).then(|| StrategyOutput {
            metadata: None,
            events,
        })
    }
}
