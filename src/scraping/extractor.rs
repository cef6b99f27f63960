//! Table Extractor — turn the rendered results table into disruption records.
//!
//! The table is client-rendered as the last step of several async filter
//! operations, so extraction first polls for row presence with a bounded
//! attempt count, then captures the page HTML once and parses it offline with
//! `scraper`. A table that never populates is `None` ("no data this cycle",
//! the caller must not touch its known state), which is distinct from
//! `Some(vec![])` — rows rendered but every one was filtered out, a valid
//! empty snapshot.

use chromiumoxide::Page;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{DisruptionCategory, DisruptionRecord};

use super::browser::eval_json;

/// Rows with fewer columns are headers or spacers, not data.
pub const MIN_COLUMNS: usize = 8;

const ROW_WAIT_ATTEMPTS: u32 = 20;
const ROW_WAIT_DELAY: Duration = Duration::from_millis(500);

/// Wait (bounded) for the table to populate, then extract records.
///
/// `None` when the table never appeared (or the HTML could not be captured)
/// within budget. The caller must treat that as "no data", not as an empty
/// snapshot, or a render hiccup would resolve every known disruption.
pub async fn extract_records(
    page: &Page,
    excluded: &[DisruptionCategory],
) -> Option<Vec<DisruptionRecord>> {
    if !wait_for_rows(page).await {
        info!("extractor: table never populated — no data this cycle");
        return None;
    }

    let html = match page.content().await {
        Ok(h) => h,
        Err(e) => {
            info!("extractor: content() failed after rows appeared: {}", e);
            return None;
        }
    };

    let records = parse_table_html(&html, excluded);
    info!("extractor: parsed {} record(s)", records.len());
    Some(records)
}

/// Poll for at least one table row, bounded by attempts × delay.
async fn wait_for_rows(page: &Page) -> bool {
    for attempt in 1..=ROW_WAIT_ATTEMPTS {
        let count = eval_json(page, "document.querySelectorAll('table tbody tr').length")
            .await
            .and_then(|j| j.as_u64())
            .unwrap_or(0);
        if count > 0 {
            debug!("extractor: {} row(s) present after {} attempt(s)", count, attempt);
            return true;
        }
        tokio::time::sleep(ROW_WAIT_DELAY).await;
    }
    false
}

/// Parse the captured HTML: positional 8-column mapping, structural
/// validation, category exclusion, deterministic first-wins dedup of ids.
///
/// Pure so the row semantics are unit-testable without a browser.
pub fn parse_table_html(html: &str, excluded: &[DisruptionCategory]) -> Vec<DisruptionRecord> {
    let document = Html::parse_document(html);

    let (Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table tbody tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for row in document.select(&row_sel) {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect();

        // Structurally invalid rows (headers, spacers) are silently skipped.
        if cells.len() < MIN_COLUMNS {
            continue;
        }

        let Some(record) = DisruptionRecord::from_cells(&cells) else {
            continue;
        };

        if excluded.contains(&record.category) {
            continue;
        }

        // First occurrence wins: with the newest-first sort applied, the
        // first rendering of a duplicated id is the freshest one.
        if seen.insert(record.id.clone()) {
            records.push(record);
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
        format!("<tr>{tds}</tr>")
    }

    fn table(rows: &[String]) -> String {
        format!(
            "<html><body><table><tbody>{}</tbody></table></body></html>",
            rows.concat()
        )
    }

    fn full_row(id: &str, category: &str) -> String {
        row(&[
            id,
            category,
            "Kassel",
            "Mitte",
            "Umleitung",
            "Oberleitungsschaden",
            "01.03.2026 08:00",
            "02.03.2026 20:00",
        ])
    }

    #[test]
    fn test_parses_valid_rows() {
        let html = table(&[full_row("ST-1", "Störung"), full_row("ST-2", "Störung")]);
        let records = parse_table_html(&html, &[]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "ST-1");
        assert_eq!(records[0].effect, "Umleitung");
        assert_eq!(records[1].id, "ST-2");
    }

    #[test]
    fn test_short_rows_contribute_nothing() {
        let html = table(&[
            row(&["nur", "drei", "zellen"]),
            full_row("ST-1", "Störung"),
            row(&[]),
        ]);
        let records = parse_table_html(&html, &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "ST-1");
    }

    #[test]
    fn test_excluded_categories_are_dropped() {
        let html = table(&[
            full_row("ST-1", "Störung"),
            full_row("BA-1", "Baustelle"),
            full_row("SR-1", "Streckenruhe"),
        ]);
        let excluded = [
            DisruptionCategory::Construction,
            DisruptionCategory::TrackPossession,
        ];
        let records = parse_table_html(&html, &excluded);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "ST-1");
    }

    #[test]
    fn test_exclusion_set_is_configuration_not_constant() {
        let html = table(&[full_row("ST-1", "Störung"), full_row("BA-1", "Baustelle")]);
        // A deployment that wants construction news keeps Baustelle rows.
        let records = parse_table_html(&html, &[DisruptionCategory::Disruption]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "BA-1");
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let mut dup = full_row("ST-1", "Störung");
        dup = dup.replace("Kassel", "Fulda");
        let html = table(&[full_row("ST-1", "Störung"), dup]);
        let records = parse_table_html(&html, &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, "Kassel");
    }

    #[test]
    fn test_empty_document_is_empty_batch() {
        assert!(parse_table_html("<html><body></body></html>", &[]).is_empty());
        assert!(parse_table_html("", &[]).is_empty());
    }
}
