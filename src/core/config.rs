use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// MonitorConfig — file-based config loader (bahnwacht.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_TARGET_URL: &str = "BAHNWACHT_TARGET_URL";
pub const ENV_POLL_INTERVAL: &str = "BAHNWACHT_POLL_INTERVAL_SECS";
pub const ENV_EXCLUDED_CATEGORIES: &str = "BAHNWACHT_EXCLUDED_CATEGORIES";
pub const ENV_STATE_FILE: &str = "BAHNWACHT_STATE_FILE";
pub const ENV_X_ENABLED: &str = "BAHNWACHT_X_ENABLED";
pub const ENV_X_SESSION_FILE: &str = "X_SESSION_FILE";
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const ENV_CHANNEL_ID: &str = "CHANNEL_ID";
pub const ENV_ADMIN_ID: &str = "ADMIN_ID";

/// Top-level config loaded from `bahnwacht.json`.
///
/// Every field is optional in the file; `resolve_*` accessors apply the
/// env-var fallback and the built-in default, in that order.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct MonitorConfig {
    /// Disruption-table page. Fixed in practice.
    pub target_url: Option<String>,
    /// Seconds between poll cycles. Default: 600.
    pub poll_interval_secs: Option<u64>,
    /// Categories dropped after extraction (`disruption`, `construction`,
    /// `track-possession`). Default excludes construction and possessions.
    pub excluded_categories: Option<Vec<String>>,
    /// Desired checkbox state in the site's filter panel, keyed by the
    /// checkbox label text. Default: `Baustellen` and `Streckenruhen` off.
    pub filter_checkboxes: Option<BTreeMap<String, bool>>,
    /// Persisted known-disruption map. Default: `~/.bahnwacht/known.json`.
    pub state_file: Option<String>,
    /// Discord bot token. Usually supplied via `DISCORD_TOKEN`.
    pub discord_token: Option<String>,
    /// Discord channel receiving the notifications.
    pub discord_channel_id: Option<String>,
    /// When set, only this Discord user id may run `!status`.
    pub discord_admin_id: Option<String>,
    /// Feature toggle for the X sink. Default: false.
    pub x_enabled: Option<bool>,
    /// Persisted X session cookie blob. Default: `~/.bahnwacht/x_session.json`.
    pub x_session_file: Option<String>,
    /// Send a full-page screenshot to the chat channel when a cycle aborts.
    /// Default: true.
    pub screenshot_on_failure: Option<bool>,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn home_file(name: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bahnwacht")
        .join(name)
}

impl MonitorConfig {
    /// Target URL: JSON field → `BAHNWACHT_TARGET_URL` → `https://strecken-info.de/`.
    pub fn resolve_target_url(&self) -> String {
        self.target_url
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_nonempty(ENV_TARGET_URL))
            .unwrap_or_else(|| "https://strecken-info.de/".to_string())
    }

    /// Poll interval: JSON field → `BAHNWACHT_POLL_INTERVAL_SECS` → 600 s.
    /// Clamped to ≥ 60 s so a typo cannot hammer the site.
    pub fn resolve_poll_interval(&self) -> std::time::Duration {
        let secs = self
            .poll_interval_secs
            .or_else(|| env_nonempty(ENV_POLL_INTERVAL).and_then(|v| v.parse().ok()))
            .unwrap_or(600);
        std::time::Duration::from_secs(secs.max(60))
    }

    /// Exclusion set: JSON field → `BAHNWACHT_EXCLUDED_CATEGORIES` (comma
    /// list) → `construction,track-possession`.
    pub fn resolve_excluded_categories(&self) -> Vec<crate::types::DisruptionCategory> {
        let names: Vec<String> = self
            .excluded_categories
            .clone()
            .or_else(|| {
                env_nonempty(ENV_EXCLUDED_CATEGORIES)
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            })
            .unwrap_or_else(|| vec!["construction".into(), "track-possession".into()]);
        names
            .iter()
            .filter(|n| !n.is_empty())
            .map(|n| crate::types::DisruptionCategory::from_config_name(n))
            .collect()
    }

    /// Desired filter-panel checkbox states, keyed by label text.
    pub fn resolve_filter_checkboxes(&self) -> BTreeMap<String, bool> {
        self.filter_checkboxes.clone().unwrap_or_else(|| {
            BTreeMap::from([
                ("Baustellen".to_string(), false),
                ("Streckenruhen".to_string(), false),
            ])
        })
    }

    /// Known-state file: JSON field → `BAHNWACHT_STATE_FILE` → `~/.bahnwacht/known.json`.
    pub fn resolve_state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .or_else(|| env_nonempty(ENV_STATE_FILE))
            .map(PathBuf::from)
            .unwrap_or_else(|| home_file("known.json"))
    }

    /// Bot token: JSON field → `DISCORD_TOKEN` → `None` (chat sink disabled).
    pub fn resolve_discord_token(&self) -> Option<String> {
        self.discord_token
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_nonempty(ENV_DISCORD_TOKEN))
    }

    /// Channel id: JSON field → `CHANNEL_ID` → `None`.
    pub fn resolve_discord_channel(&self) -> Option<String> {
        self.discord_channel_id
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_nonempty(ENV_CHANNEL_ID))
    }

    /// Admin id for `!status`: JSON field → `ADMIN_ID` → `None` (anyone may ask).
    pub fn resolve_discord_admin(&self) -> Option<String> {
        self.discord_admin_id
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_nonempty(ENV_ADMIN_ID))
    }

    /// X sink toggle: JSON field → `BAHNWACHT_X_ENABLED` → false.
    pub fn resolve_x_enabled(&self) -> bool {
        if let Some(b) = self.x_enabled {
            return b;
        }
        env_nonempty(ENV_X_ENABLED)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// X session blob: JSON field → `X_SESSION_FILE` → `~/.bahnwacht/x_session.json`.
    pub fn resolve_x_session_file(&self) -> PathBuf {
        self.x_session_file
            .clone()
            .or_else(|| env_nonempty(ENV_X_SESSION_FILE))
            .map(PathBuf::from)
            .unwrap_or_else(|| home_file("x_session.json"))
    }

    pub fn resolve_screenshot_on_failure(&self) -> bool {
        self.screenshot_on_failure.unwrap_or(true)
    }
}

/// Load `bahnwacht.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `BAHNWACHT_CONFIG` env var path
/// 2. `./bahnwacht.json` (process cwd)
/// 3. `~/.bahnwacht/bahnwacht.json`
///
/// Missing file → `MonitorConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `MonitorConfig::default()`.
pub fn load_monitor_config() -> MonitorConfig {
    let mut candidates = vec![PathBuf::from("bahnwacht.json"), home_file("bahnwacht.json")];
    if let Ok(env_path) = std::env::var("BAHNWACHT_CONFIG") {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<MonitorConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("bahnwacht.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "bahnwacht.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return MonitorConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    MonitorConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DisruptionCategory;

    #[test]
    fn test_defaults() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.resolve_target_url(), "https://strecken-info.de/");
        assert_eq!(cfg.resolve_poll_interval().as_secs(), 600);
        let excluded = cfg.resolve_excluded_categories();
        assert!(excluded.contains(&DisruptionCategory::Construction));
        assert!(excluded.contains(&DisruptionCategory::TrackPossession));
        assert!(!excluded.contains(&DisruptionCategory::Disruption));
        assert!(!cfg.resolve_x_enabled());
        assert!(cfg.resolve_screenshot_on_failure());
    }

    #[test]
    fn test_interval_floor() {
        let cfg = MonitorConfig {
            poll_interval_secs: Some(5),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_poll_interval().as_secs(), 60);
    }

    #[test]
    fn test_file_fields_win_over_defaults() {
        let cfg: MonitorConfig = serde_json::from_str(
            r#"{
                "poll_interval_secs": 300,
                "excluded_categories": ["construction"],
                "filter_checkboxes": {"Baustellen": true},
                "x_enabled": true
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.resolve_poll_interval().as_secs(), 300);
        assert_eq!(
            cfg.resolve_excluded_categories(),
            vec![DisruptionCategory::Construction]
        );
        assert_eq!(
            cfg.resolve_filter_checkboxes().get("Baustellen"),
            Some(&true)
        );
        assert!(cfg.resolve_x_enabled());
    }
}
