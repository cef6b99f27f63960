//! Page Navigator — load the target page and get it into a quiescent,
//! overlay-free state.
//!
//! The site injects consent and promo dialogs non-deterministically and
//! sometimes re-shows them after further interaction, so overlay dismissal is
//! structured as "dismiss until quiescent": repeated passes that each try
//! several independent strategies, exiting when a pass removes nothing or the
//! wall-clock budget runs out. Calling it on an overlay-free page is a no-op.

use chromiumoxide::Page;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::browser::{eval_json, wait_until_stable, BrowserSession};
use super::ScrapeError;

/// Generous budget for the initial SPA load.
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(80);
/// Overall wall-clock budget for the overlay-dismissal loop.
pub const OVERLAY_MAX_WAIT: Duration = Duration::from_secs(25);

const VIEWPORT_WIDTH: u32 = 1366;
const VIEWPORT_HEIGHT: u32 = 900;

/// Open the disruption page in a fresh headless session and bring it to a
/// ready state: navigated, network-idle, overlays dismissed.
///
/// On failure the session is closed before the error is returned — the caller
/// never has to clean up a half-open browser.
pub async fn open_disruption_page(url: &str) -> Result<BrowserSession, ScrapeError> {
    let session = BrowserSession::launch(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
        .await
        .map_err(|e| ScrapeError::Navigation(e.to_string()))?;

    let navigated = tokio::time::timeout(PAGE_LOAD_TIMEOUT, session.page.goto(url)).await;
    match navigated {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            session.close().await;
            return Err(ScrapeError::Navigation(format!("goto({url}) failed: {e}")));
        }
        Err(_) => {
            session.close().await;
            return Err(ScrapeError::Navigation(format!(
                "goto({url}) exceeded {}s",
                PAGE_LOAD_TIMEOUT.as_secs()
            )));
        }
    }

    // Network idle is a heuristic for "initial render complete"; downstream
    // steps still wait for their own element-level preconditions.
    let _ = wait_until_stable(&session.page, 1500, 20_000).await;
    tokio::time::sleep(Duration::from_millis(1000)).await;

    dismiss_overlays(&session.page, OVERLAY_MAX_WAIT).await;

    Ok(session)
}

/// One dismissal pass: click consent/close buttons matched by visible text or
/// ARIA label, then force-remove known consent containers. Evaluates to the
/// number of elements acted on.
fn overlay_pass_script() -> &'static str {
    r#"
(() => {
    let acted = 0;

    const needles = [
        'ablehnen',
        'alles akzeptieren',
        'alle akzeptieren',
        'akzeptieren',
        'schließen',
        'close',
        'verstanden',
        'ok'
    ];

    const isVisible = (el) => {
        const style = window.getComputedStyle(el);
        if (!style || style.display === 'none' || style.visibility === 'hidden') return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 1 && rect.height > 1;
    };

    const candidates = document.querySelectorAll(
        'button, [role="button"], input[type="button"], input[type="submit"]'
    );
    for (const el of candidates) {
        if (!isVisible(el)) continue;
        const text = (el.innerText || el.value || el.getAttribute('aria-label') || '').trim().toLowerCase();
        if (!text) continue;
        if (!needles.some(n => text === n)) continue;
        try { el.click(); acted++; } catch (_) {}
    }

    // Known consent containers that sometimes render without a reachable
    // dismiss button. Narrow selectors only — generic overlay classes would
    // take the app shell with them.
    const containers = document.querySelectorAll(
        '#usercentrics-root, [id*="cookie-consent"], [class*="cookie-banner"], [data-testid="uc-container"]'
    );
    for (const el of containers) {
        try { el.remove(); acted++; } catch (_) {}
    }

    return acted;
})()
"#
}

/// Repeatedly run dismissal passes until one removes nothing or `budget`
/// elapses. Returns the total number of elements acted on — 0 means the page
/// was already clean.
pub async fn dismiss_overlays(page: &Page, budget: Duration) -> u64 {
    let start = Instant::now();
    let mut total = 0u64;

    loop {
        let acted = eval_json(page, overlay_pass_script())
            .await
            .and_then(|j| j.as_u64())
            .unwrap_or(0);
        total += acted;

        if acted == 0 || start.elapsed() > budget {
            break;
        }
        // Give the consent stack a beat to re-render before the next pass.
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    if total > 0 {
        info!(
            "navigator: dismissed {} overlay element(s) in {:?}",
            total,
            start.elapsed()
        );
    }
    total
}

/// Capture a full-page PNG for the failure-diagnostic path. Errors are
/// reported, not propagated — a failed screenshot must never mask the
/// original cycle failure.
pub async fn capture_screenshot(page: &Page) -> Option<Vec<u8>> {
    use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
    use chromiumoxide::page::ScreenshotParams;

    match page
        .screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build(),
        )
        .await
    {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("navigator: screenshot capture failed: {}", e);
            None
        }
    }
}
