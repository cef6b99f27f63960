//! Filter Controller — put the page's filter panel and results view into the
//! configured state.
//!
//! Only the open-panel and results-tab steps are load-bearing: without them no
//! extraction is meaningful, so they abort the cycle. Checkbox toggling and
//! the newest-first sort are best effort and degrade gracefully.

use chromiumoxide::Page;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::locator::{click_first, Locator};
use super::navigator::dismiss_overlays;
use super::retry::RetryPolicy;
use super::ScrapeError;

/// Ordered fallback chain for the filter-panel button. The markup has cycled
/// through all three of these over the observed lifetime of the site.
fn panel_chain() -> Vec<Locator> {
    vec![
        Locator::aria("Filter öffnen"),
        Locator::aria("Filter"),
        Locator::text("Filter"),
    ]
}

fn results_tab_chain() -> Vec<Locator> {
    vec![
        Locator::button_text("Einschränkungen"),
        Locator::text("Einschränkungen"),
    ]
}

/// Open the collapsible filter panel. Load-bearing: failure aborts the cycle.
///
/// Overlays are re-dismissed before each attempt because the consent stack
/// sometimes re-shows itself after the initial navigation settles.
pub async fn open_filter_panel(page: &Page) -> Result<(), ScrapeError> {
    let chain = panel_chain();
    let chain = chain.as_slice();
    let ok = RetryPolicy::load_bearing()
        .run(page, "open filter panel", || async move {
            dismiss_overlays(page, std::time::Duration::from_secs(5)).await;
            click_first(page, chain).await
        })
        .await;

    if ok {
        Ok(())
    } else {
        Err(ScrapeError::Interaction(
            "filter panel did not open with any known selector".into(),
        ))
    }
}

/// Set each configured checkbox to its desired state.
///
/// A checkbox click is a toggle, not an assignment, so the current checked
/// state is read first and checkboxes already in the desired state are left
/// alone. Missing checkboxes are logged and skipped — per-step success, not
/// an exception.
pub async fn apply_checkboxes(page: &Page, desired: &BTreeMap<String, bool>) {
    for (label, want) in desired {
        let script = checkbox_script(label, *want);
        let outcome = super::browser::eval_json(page, &script)
            .await
            .and_then(|j| j.as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "error".into());

        match outcome.as_str() {
            "toggled" => info!("filter: '{}' set to {}", label, want),
            "already" => debug!("filter: '{}' already {}", label, want),
            "missing" => warn!("filter: checkbox '{}' not found — skipping", label),
            other => warn!("filter: checkbox '{}' unexpected outcome '{}'", label, other),
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

fn checkbox_script(label: &str, want: bool) -> String {
    let lit = serde_json::to_string(label).unwrap_or_else(|_| "\"\"".into());
    format!(
        r#"(() => {{
            const want = {want};
            const labels = document.querySelectorAll('label');
            for (const lab of labels) {{
                if (!(lab.textContent || '').includes({lit})) continue;
                let cb = lab.querySelector('input[type="checkbox"]');
                if (!cb && lab.htmlFor) cb = document.getElementById(lab.htmlFor);
                if (!cb) continue;
                if (cb.checked === want) return 'already';
                try {{ cb.click(); return 'toggled'; }} catch (_) {{ return 'error'; }}
            }}
            return 'missing';
        }})()"#
    )
}

/// Activate the results tab. The table is not guaranteed visible or populated
/// until this view is active, so this step is load-bearing.
pub async fn activate_results_tab(page: &Page) -> Result<(), ScrapeError> {
    let chain = results_tab_chain();
    let chain = chain.as_slice();
    let ok = RetryPolicy::interaction()
        .run(page, "activate results tab", || async move {
            dismiss_overlays(page, std::time::Duration::from_secs(3)).await;
            click_first(page, chain).await
        })
        .await;

    if ok {
        // Let the tab switch kick off its table render before the extractor
        // starts polling for rows.
        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        Ok(())
    } else {
        Err(ScrapeError::Interaction(
            "results tab could not be activated".into(),
        ))
    }
}

/// Best-effort sort by the validity-start column, descending, so newly
/// discovered records surface newest-first in notifications. Not required for
/// correctness — the differ is order-independent — so failure only logs.
pub async fn sort_newest_first(page: &Page) {
    let script = r#"(() => {
        const headers = document.querySelectorAll('th');
        for (const th of headers) {
            if (!(th.textContent || '').includes('Gültig von')) continue;
            if (th.getAttribute('aria-sort') === 'descending') return 'done';
            const target = th.querySelector('button, [role="button"]') || th;
            try { target.click(); return th.getAttribute('aria-sort') || 'clicked'; }
            catch (_) { return 'error'; }
        }
        return 'missing';
    })()"#;

    // Two clicks at most: ascending first, descending second.
    for _ in 0..2 {
        let state = super::browser::eval_json(page, script)
            .await
            .and_then(|j| j.as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "error".into());
        match state.as_str() {
            "done" | "descending" => {
                debug!("filter: sort column is descending");
                return;
            }
            "missing" | "error" => {
                debug!("filter: sort header unavailable ({}) — continuing unsorted", state);
                return;
            }
            _ => tokio::time::sleep(std::time::Duration::from_millis(300)).await,
        }
    }
}
