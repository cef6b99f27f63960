//! Message rendering — verbose for chat, terse for social, plus the
//! character-budget chunking used to thread long social posts.

use crate::types::{DisruptionCategory, EventKind, NotificationEvent};

/// Hard character budget per social post.
pub const SOCIAL_POST_LIMIT: usize = 280;

fn category_label(category: &DisruptionCategory) -> &str {
    match category {
        DisruptionCategory::Disruption => "Störung",
        DisruptionCategory::Construction => "Baustelle",
        DisruptionCategory::TrackPossession => "Streckenruhe",
        DisruptionCategory::Other(s) => s.as_str(),
    }
}

/// Full-field chat message. Layout follows the bot's long-standing Discord
/// format so existing readers and pinned examples keep matching.
pub fn verbose_message(event: &NotificationEvent) -> String {
    let r = &event.record;
    let (headline, window_label) = match event.kind {
        EventKind::New => ("🚨 **Neue Bahn-Störung entdeckt!**", "Gültigkeit"),
        EventKind::Resolved => ("✅ **Bahn-Störung behoben!**", "Dauer"),
    };
    format!(
        "{headline}\n\
         🆔 ID: {id}\n\
         📌 Typ: {typ}\n\
         📍 Ort: {ort}\n\
         🗺️ Region: {region}\n\
         🚦 Wirkung: {wirkung}\n\
         📋 Ursache: {ursache}\n\
         ⏰ {window_label}: {von} → {bis}",
        id = r.id,
        typ = category_label(&r.category),
        ort = r.location,
        region = r.region,
        wirkung = r.effect,
        ursache = r.cause,
        von = r.valid_from,
        bis = r.valid_until,
    )
}

/// Reduced field set for the character-budgeted social sink.
pub fn terse_message(event: &NotificationEvent) -> String {
    let r = &event.record;
    let headline = match event.kind {
        EventKind::New => "🚨 Bahn-Störung",
        EventKind::Resolved => "✅ Störung behoben",
    };
    format!(
        "{headline}\nID: {}\nOrt: {}\nWirkung: {}\nUrsache: {}",
        r.id, r.location, r.effect, r.cause
    )
}

/// Split `text` into posts of at most `limit` characters, preserving reading
/// order. Chunks carry no added markers, so their concatenation reproduces
/// the original text exactly. Breaks prefer a newline inside the window, then
/// a space, then a hard cut.
pub fn chunk_post(text: &str, limit: usize) -> Vec<String> {
    assert!(limit > 0);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        // Byte offset just past the `limit`-th char.
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        // Split *after* the break character so nothing is dropped.
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|i| i + 1)
            .unwrap_or(window_end);

        chunks.push(rest[..split_at].to_string());
        rest = &rest[split_at..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_table_time, DisruptionRecord};

    fn event(kind: EventKind) -> NotificationEvent {
        NotificationEvent {
            kind,
            record: DisruptionRecord {
                id: "ST-77".into(),
                category: DisruptionCategory::Disruption,
                location: "Fulda".into(),
                region: "Mitte".into(),
                effect: "Totalsperrung".into(),
                cause: "Böschungsbrand".into(),
                valid_from: "03.03.2026 14:00".into(),
                valid_until: "03.03.2026 22:00".into(),
                valid_until_ts: parse_table_time("03.03.2026 22:00"),
            },
        }
    }

    #[test]
    fn test_verbose_includes_all_fields() {
        let msg = verbose_message(&event(EventKind::New));
        for needle in [
            "ST-77",
            "Störung",
            "Fulda",
            "Mitte",
            "Totalsperrung",
            "Böschungsbrand",
            "03.03.2026 14:00",
            "03.03.2026 22:00",
        ] {
            assert!(msg.contains(needle), "missing {needle} in {msg}");
        }
        assert!(msg.starts_with("🚨"));
    }

    #[test]
    fn test_resolved_marker_distinct_from_new() {
        let new = verbose_message(&event(EventKind::New));
        let resolved = verbose_message(&event(EventKind::Resolved));
        assert_ne!(new.lines().next(), resolved.lines().next());
        assert!(resolved.starts_with("✅"));
    }

    #[test]
    fn test_terse_reduced_field_set() {
        let msg = terse_message(&event(EventKind::New));
        assert!(msg.contains("ST-77"));
        assert!(msg.contains("Fulda"));
        assert!(msg.contains("Totalsperrung"));
        assert!(msg.contains("Böschungsbrand"));
        // Region and validity window are chat-only.
        assert!(!msg.contains("Mitte"));
        assert!(!msg.contains("03.03.2026"));
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_post("kurz", SOCIAL_POST_LIMIT);
        assert_eq!(chunks, vec!["kurz".to_string()]);
    }

    #[test]
    fn test_long_text_chunks_within_budget_and_reassembles() {
        let long = format!(
            "🚨 Bahn-Störung\nID: A1\nOrt: {}\nWirkung: {}\nUrsache: {}",
            "Ort ".repeat(40),
            "Wirkung ".repeat(30),
            "Ursache ".repeat(30)
        );
        assert!(long.chars().count() > SOCIAL_POST_LIMIT);

        let chunks = chunk_post(&long, SOCIAL_POST_LIMIT);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.chars().count() <= SOCIAL_POST_LIMIT, "oversized chunk");
        }
        assert_eq!(chunks.concat(), long);
    }

    #[test]
    fn test_chunking_handles_unbreakable_runs() {
        let text = "x".repeat(700);
        let chunks = chunk_post(&text, SOCIAL_POST_LIMIT);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= SOCIAL_POST_LIMIT));
    }

    #[test]
    fn test_chunking_counts_chars_not_bytes() {
        // Multi-byte chars: 300 'ä' is 600 bytes but 300 chars.
        let text = "ä".repeat(300);
        let chunks = chunk_post(&text, SOCIAL_POST_LIMIT);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), SOCIAL_POST_LIMIT);
        assert_eq!(chunks.concat(), text);
    }
}
