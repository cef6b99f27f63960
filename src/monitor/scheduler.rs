//! The poll loop: drive the page, extract, diff, commit, notify.
//!
//! One cycle is all-or-nothing up to the commit point. Any scrape failure
//! aborts the cycle before the store is touched, so the next cycle re-diffs
//! against the same known state and nothing is silently dropped.

use chrono::Local;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::notify::chat::DiscordSink;
use crate::notify::Dispatcher;
use crate::scraping::extractor::extract_records;
use crate::scraping::filter::{
    activate_results_tab, apply_checkboxes, open_filter_panel, sort_newest_first,
};
use crate::scraping::navigator::{capture_screenshot, open_disruption_page};
use crate::scraping::ScrapeError;
use crate::types::DisruptionRecord;

use super::differ::diff;
use super::store::KnownStore;
use super::StatusBoard;

pub struct Monitor {
    config: MonitorConfig,
    store: KnownStore,
    dispatcher: Dispatcher,
    status: StatusBoard,
    /// Separate diagnostic channel so a failing cycle can still report
    /// itself with a screenshot. Same channel as the chat sink in practice.
    diagnostics: Option<DiscordSink>,
}

enum CycleReport {
    /// Table never populated. Valid outcome, state untouched.
    NoData,
    Diffed {
        new_count: usize,
        resolved_count: usize,
        batch_size: usize,
    },
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        store: KnownStore,
        dispatcher: Dispatcher,
        status: StatusBoard,
        diagnostics: Option<DiscordSink>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            status,
            diagnostics,
        }
    }

    /// Main loop. Runs until the shutdown flag flips to true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.resolve_poll_interval();
        info!(
            "monitor: polling {} every {}s, {} known disruption(s) at boot",
            self.config.resolve_target_url(),
            interval.as_secs(),
            self.store.len()
        );

        loop {
            let started = Instant::now();
            match self.cycle().await {
                Ok(report) => {
                    self.status
                        .record_success(Local::now().naive_local(), self.store.len());
                    match report {
                        CycleReport::NoData => {
                            info!("monitor: cycle ok — no data, {} known carried over", self.store.len())
                        }
                        CycleReport::Diffed {
                            new_count,
                            resolved_count,
                            batch_size,
                        } => info!(
                            "monitor: cycle ok — {} row(s), {} new, {} resolved, {} known",
                            batch_size,
                            new_count,
                            resolved_count,
                            self.store.len()
                        ),
                    }
                }
                Err(e) => {
                    self.status.record_failure();
                    error!("monitor: cycle aborted: {} — state untouched", e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed > interval {
                warn!(
                    "monitor: cycle took {}s, longer than the {}s interval — polling back-to-back",
                    elapsed.as_secs(),
                    interval.as_secs()
                );
            }
            let pause = interval.saturating_sub(elapsed);

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("monitor: shutdown requested, leaving poll loop");
                        return;
                    }
                }
            }
        }
    }

    /// One poll cycle. Scrape failures and a never-populated table both
    /// return before any state mutation.
    async fn cycle(&mut self) -> Result<CycleReport, ScrapeError> {
        let Some(batch) = self.scrape_snapshot().await? else {
            return Ok(CycleReport::NoData);
        };

        let now = Local::now().naive_local();
        let outcome = diff(self.store.records(), &batch, now);
        let report = CycleReport::Diffed {
            new_count: outcome.new_events.len(),
            resolved_count: outcome.resolved_events.len(),
            batch_size: batch.len(),
        };

        // Commit before dispatch: delivery is at-most-once, a crashed sink
        // must not cause the same event to fire again next cycle.
        self.store.commit(outcome.next_store);

        let mut events = outcome.new_events;
        events.extend(outcome.resolved_events);
        self.dispatcher.dispatch(&events).await;

        Ok(report)
    }

    /// Drive the page through the interaction sequence and pull the table.
    /// The browser is always closed, on success and on every error path.
    async fn scrape_snapshot(&self) -> Result<Option<Vec<DisruptionRecord>>, ScrapeError> {
        let session = open_disruption_page(&self.config.resolve_target_url()).await?;

        let result = async {
            open_filter_panel(&session.page).await?;
            apply_checkboxes(&session.page, &self.config.resolve_filter_checkboxes()).await;
            activate_results_tab(&session.page).await?;
            sort_newest_first(&session.page).await;

            let excluded = self.config.resolve_excluded_categories();
            Ok(extract_records(&session.page, &excluded).await)
        }
        .await;

        if result.is_err() && self.config.resolve_screenshot_on_failure() {
            self.report_failure(&session.page, result.as_ref().err()).await;
        }

        session.close().await;
        result
    }

    /// Ship a full-page screenshot of the stuck page to the chat channel.
    /// Best effort in every direction.
    async fn report_failure(
        &self,
        page: &chromiumoxide::page::Page,
        err: Option<&ScrapeError>,
    ) {
        let Some(sink) = &self.diagnostics else {
            return;
        };
        let Some(png) = capture_screenshot(page).await else {
            warn!("monitor: failure screenshot could not be captured");
            return;
        };
        let caption = format!(
            "⚠️ Prüfzyklus abgebrochen: {}",
            err.map(|e| e.to_string()).unwrap_or_else(|| "unbekannt".into())
        );
        if let Err(e) = sink
            .send_with_attachment(&caption, png, "bahnwacht-failure.png")
            .await
        {
            warn!("monitor: diagnostic screenshot delivery failed: {}", e);
        }
    }
}
