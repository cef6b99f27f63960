use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used by the disruption table (German locale).
pub const TABLE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Category tag of a table row. The site labels rows in German; anything we
/// do not recognize is carried through verbatim as `Other` so new site
/// categories surface instead of silently vanishing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisruptionCategory {
    Disruption,
    Construction,
    TrackPossession,
    Other(String),
}

impl DisruptionCategory {
    /// Parse the table's category cell. Matching is case-insensitive because
    /// the site has flip-flopped between `Störung` and `STÖRUNG` over time.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "störung" | "stoerung" => Self::Disruption,
            "baustelle" => Self::Construction,
            "streckenruhe" => Self::TrackPossession,
            other => Self::Other(other.to_string()),
        }
    }

    /// Stable config-facing name (used by `excluded_categories`).
    pub fn config_name(&self) -> &str {
        match self {
            Self::Disruption => "disruption",
            Self::Construction => "construction",
            Self::TrackPossession => "track-possession",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Inverse of `config_name`, for reading the exclusion set from config.
    pub fn from_config_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "disruption" => Self::Disruption,
            "construction" => Self::Construction,
            "track-possession" | "possession" => Self::TrackPossession,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One row of the disruption table at one point in time.
///
/// Identity is the `id` field alone: two records with the same id are the
/// same disruption even when other cells changed between polls. Free-text
/// cells are kept verbatim — no normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptionRecord {
    pub id: String,
    pub category: DisruptionCategory,
    pub location: String,
    pub region: String,
    pub effect: String,
    pub cause: String,
    /// Verbatim `dd.mm.yyyy HH:MM` cell text.
    pub valid_from: String,
    pub valid_until: String,
    /// Parsed form of `valid_until`; `None` when the cell did not parse
    /// ("unknown" sentinel — never an error).
    #[serde(default)]
    pub valid_until_ts: Option<NaiveDateTime>,
}

impl DisruptionRecord {
    /// Build a record from the eight positional table cells
    /// `[id, category, location, region, effect, cause, valid_from, valid_until]`.
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 8 {
            return None;
        }
        let id = cells[0].trim().to_string();
        if id.is_empty() {
            return None;
        }
        let valid_until = cells[7].trim().to_string();
        Some(Self {
            id,
            category: DisruptionCategory::parse(&cells[1]),
            location: cells[2].trim().to_string(),
            region: cells[3].trim().to_string(),
            effect: cells[4].trim().to_string(),
            cause: cells[5].trim().to_string(),
            valid_from: cells[6].trim().to_string(),
            valid_until_ts: parse_table_time(&valid_until),
            valid_until,
        })
    }

    /// `true` when the validity window has already closed by `now`.
    /// Unparseable timestamps are never considered expired.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        matches!(self.valid_until_ts, Some(ts) if ts < now)
    }
}

/// Parse a `dd.mm.yyyy HH:MM` cell. Returns `None` on any mismatch — the
/// caller keeps the verbatim text and loses only expiry detection.
pub fn parse_table_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TABLE_TIME_FORMAT).ok()
}

/// What happened to a disruption between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    New,
    Resolved,
}

/// Transient event produced by the differ and consumed once by the
/// notification dispatcher.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub record: DisruptionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_category_parse_german_labels() {
        assert_eq!(
            DisruptionCategory::parse("Störung"),
            DisruptionCategory::Disruption
        );
        assert_eq!(
            DisruptionCategory::parse("BAUSTELLE"),
            DisruptionCategory::Construction
        );
        assert_eq!(
            DisruptionCategory::parse(" Streckenruhe "),
            DisruptionCategory::TrackPossession
        );
        assert_eq!(
            DisruptionCategory::parse("Großstörung"),
            DisruptionCategory::Other("großstörung".into())
        );
    }

    #[test]
    fn test_config_name_round_trip() {
        for c in [
            DisruptionCategory::Disruption,
            DisruptionCategory::Construction,
            DisruptionCategory::TrackPossession,
        ] {
            assert_eq!(DisruptionCategory::from_config_name(c.config_name()), c);
        }
    }

    #[test]
    fn test_record_from_cells_positional_mapping() {
        let r = DisruptionRecord::from_cells(&cells(&[
            "ST-1042",
            "Störung",
            "Hannover Hbf",
            "Nord",
            "Teilausfall",
            "Signalstörung",
            "01.03.2026 06:00",
            "01.03.2026 18:30",
        ]))
        .unwrap();
        assert_eq!(r.id, "ST-1042");
        assert_eq!(r.category, DisruptionCategory::Disruption);
        assert_eq!(r.location, "Hannover Hbf");
        assert_eq!(r.region, "Nord");
        assert_eq!(r.effect, "Teilausfall");
        assert_eq!(r.cause, "Signalstörung");
        assert!(r.valid_until_ts.is_some());
    }

    #[test]
    fn test_record_from_short_row_is_none() {
        assert!(DisruptionRecord::from_cells(&cells(&["a", "b", "c"])).is_none());
    }

    #[test]
    fn test_record_empty_id_is_none() {
        assert!(DisruptionRecord::from_cells(&cells(&[
            "  ", "Störung", "x", "x", "x", "x", "x", "x"
        ]))
        .is_none());
    }

    #[test]
    fn test_unparseable_valid_until_is_sentinel_not_error() {
        let r = DisruptionRecord::from_cells(&cells(&[
            "ST-1",
            "Störung",
            "x",
            "x",
            "x",
            "x",
            "siehe Text",
            "bis auf weiteres",
        ]))
        .unwrap();
        assert_eq!(r.valid_until, "bis auf weiteres");
        assert!(r.valid_until_ts.is_none());
        assert!(!r.is_expired(chrono::Local::now().naive_local()));
    }

    #[test]
    fn test_expiry_detection() {
        let r = DisruptionRecord::from_cells(&cells(&[
            "ST-2",
            "Störung",
            "x",
            "x",
            "x",
            "x",
            "01.01.2026 00:00",
            "02.01.2026 12:00",
        ]))
        .unwrap();
        let before = parse_table_time("02.01.2026 11:59").unwrap();
        let after = parse_table_time("02.01.2026 12:01").unwrap();
        assert!(!r.is_expired(before));
        assert!(r.is_expired(after));
    }
}
