//! Bounded retry for flaky UI steps.
//!
//! One reusable policy instead of copy-pasted attempt loops at every call
//! site. The optional reload escalation exists because the SPA occasionally
//! wedges itself into a state where no selector resolves until the page is
//! reloaded; firing it on the penultimate attempt leaves one clean attempt
//! against the fresh DOM.

use chromiumoxide::Page;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::browser::wait_until_stable;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Reload the page before the final attempt.
    pub reload_on_penultimate: bool,
}

impl RetryPolicy {
    /// Default for interactive steps: 3 attempts, 500 ms apart, no reload.
    pub fn interaction() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            reload_on_penultimate: false,
        }
    }

    /// For load-bearing steps where a wedged DOM is worth one reload.
    pub fn load_bearing() -> Self {
        Self {
            max_attempts: 4,
            delay: Duration::from_millis(750),
            reload_on_penultimate: true,
        }
    }

    /// Run `op` until it reports success or attempts are exhausted.
    ///
    /// `op` must be idempotent-on-failure: a failed attempt must leave the
    /// page in a state where trying again is safe.
    pub async fn run<F, Fut>(&self, page: &Page, what: &str, mut op: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for attempt in 1..=self.max_attempts {
            if op().await {
                if attempt > 1 {
                    debug!("retry: '{}' succeeded on attempt {}", what, attempt);
                }
                return true;
            }

            if attempt == self.max_attempts {
                break;
            }

            if self.reload_on_penultimate && attempt == self.max_attempts - 1 {
                warn!("retry: '{}' still failing — reloading page before final attempt", what);
                if let Err(e) = page.reload().await {
                    warn!("retry: reload failed: {}", e);
                }
                let _ = wait_until_stable(page, 1500, 15_000).await;
            }

            tokio::time::sleep(self.delay).await;
        }
        warn!(
            "retry: '{}' exhausted {} attempts",
            what, self.max_attempts
        );
        false
    }
}
