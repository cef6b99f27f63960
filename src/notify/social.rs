//! X (Twitter) sink — posts terse updates through a real browser session.
//!
//! The platform has no usable free write API, so posting drives the web
//! compose dialog over CDP with cookies captured once by [`login_once`].
//! Posts longer than the platform limit are split by
//! [`super::format::chunk_post`] and published as consecutive posts.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::scraping::browser::{eval_json, BrowserSession};
use crate::types::NotificationEvent;

use super::format::{chunk_post, terse_message, SOCIAL_POST_LIMIT};
use super::{NotificationSink, SinkError};

const COMPOSE_URL: &str = "https://x.com/compose/post";
const LOGIN_URL: &str = "https://x.com/i/flow/login";
const COMPOSE_WAIT_ATTEMPTS: u32 = 30;

pub struct XSink {
    session_file: PathBuf,
}

impl XSink {
    pub fn new(session_file: PathBuf) -> Self {
        Self { session_file }
    }

    /// Load the cookie blob written by [`login_once`]. A missing or garbled
    /// file is a [`SinkError::Session`] so the caller can tell the operator
    /// to re-run the login flow.
    fn load_cookies(&self) -> Result<Vec<CookieParam>, SinkError> {
        let raw = std::fs::read_to_string(&self.session_file).map_err(|e| {
            SinkError::Session(format!(
                "cannot read {} ({}), run with --x-login first",
                self.session_file.display(),
                e
            ))
        })?;
        let blob: Vec<serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|e| SinkError::Session(format!("corrupt session file: {e}")))?;

        let mut cookies = Vec::new();
        for entry in &blob {
            let (Some(name), Some(value)) = (
                entry.get("name").and_then(|v| v.as_str()),
                entry.get("value").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            let mut builder = CookieParam::builder().name(name).value(value);
            if let Some(domain) = entry.get("domain").and_then(|v| v.as_str()) {
                builder = builder.domain(domain);
            }
            if let Some(path) = entry.get("path").and_then(|v| v.as_str()) {
                builder = builder.path(path);
            }
            if let Some(secure) = entry.get("secure").and_then(|v| v.as_bool()) {
                builder = builder.secure(secure);
            }
            match builder.build() {
                Ok(c) => cookies.push(c),
                Err(e) => debug!("x: skipping cookie {}: {}", name, e),
            }
        }
        if cookies.is_empty() {
            return Err(SinkError::Session("session file holds no cookies".into()));
        }
        Ok(cookies)
    }

    /// Wait for the compose textarea to appear, then type and submit.
    async fn publish_one(&self, page: &Page, text: &str) -> Result<(), SinkError> {
        let mut ready = false;
        for _ in 0..COMPOSE_WAIT_ATTEMPTS {
            let found = eval_json(
                page,
                r#"(() => !!(document.querySelector('div[data-testid="tweetTextarea_0"]')
                    || document.querySelector('div[contenteditable="true"]')))()"#,
            )
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
            if found {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        if !ready {
            return Err(SinkError::Session(
                "compose box never appeared, session cookies are likely stale".into(),
            ));
        }

        // insertText goes through the editor's input events, so the draft
        // state updates the same way it would for a real keyboard.
        let fill = format!(
            r#"(() => {{
                const box = document.querySelector('div[data-testid="tweetTextarea_0"]')
                    || document.querySelector('div[contenteditable="true"]');
                if (!box) return false;
                box.focus();
                document.execCommand('insertText', false, {text});
                return true;
            }})()"#,
            text = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".into()),
        );
        let filled = eval_json(page, &fill)
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !filled {
            return Err(SinkError::Delivery("could not fill compose box".into()));
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        let clicked = eval_json(
            page,
            r#"(() => {
                const btn = document.querySelector('[data-testid="tweetButtonInline"]')
                    || document.querySelector('[data-testid="tweetButton"]');
                if (!btn || btn.disabled) return false;
                btn.click();
                return true;
            })()"#,
        )
        .await
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
        if !clicked {
            return Err(SinkError::Delivery("post button missing or disabled".into()));
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;
        Ok(())
    }

    async fn post_thread(&self, text: &str) -> Result<(), SinkError> {
        let cookies = self.load_cookies()?;
        let session = BrowserSession::launch(1280, 900)
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;

        let result = async {
            session
                .page
                .set_cookies(cookies)
                .await
                .map_err(|e| SinkError::Session(format!("cookie injection failed: {e}")))?;

            let chunks = chunk_post(text, SOCIAL_POST_LIMIT);
            for (i, chunk) in chunks.iter().enumerate() {
                session
                    .page
                    .goto(COMPOSE_URL)
                    .await
                    .map_err(|e| SinkError::Delivery(e.to_string()))?;
                self.publish_one(&session.page, chunk).await?;
                debug!("x: published part {}/{}", i + 1, chunks.len());
            }
            Ok(())
        }
        .await;

        session.close().await;
        result
    }
}

#[async_trait]
impl NotificationSink for XSink {
    fn name(&self) -> &'static str {
        "x"
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        self.post_thread(&terse_message(event)).await
    }
}

/// One-shot interactive login: drives the login flow with the given
/// credentials and writes the resulting cookies to `session_file`. Run this
/// once on a trusted machine; the monitor only ever replays the cookies.
pub async fn login_once(
    username: &str,
    password: &str,
    session_file: &Path,
) -> Result<(), SinkError> {
    let session = BrowserSession::launch(1280, 900)
        .await
        .map_err(|e| SinkError::Delivery(e.to_string()))?;

    let result = async {
        session
            .page
            .goto(LOGIN_URL)
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        tokio::time::sleep(Duration::from_secs(4)).await;

        type_into(&session.page, r#"input[autocomplete="username"]"#, username).await?;
        press_enter(&session.page).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;

        type_into(&session.page, r#"input[name="password"]"#, password).await?;
        press_enter(&session.page).await?;
        tokio::time::sleep(Duration::from_secs(6)).await;

        let cookies = session
            .page
            .get_cookies()
            .await
            .map_err(|e| SinkError::Session(format!("cookie export failed: {e}")))?;
        if cookies.is_empty() {
            return Err(SinkError::Session(
                "no cookies after login, credentials or challenge step failed".into(),
            ));
        }

        let json = serde_json::to_string_pretty(&cookies)
            .map_err(|e| SinkError::Session(e.to_string()))?;
        if let Some(parent) = session_file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::Session(format!("cannot create {parent:?}: {e}")))?;
        }
        std::fs::write(session_file, json)
            .map_err(|e| SinkError::Session(format!("cannot write session file: {e}")))?;

        info!(
            "x: session saved to {} ({} cookies)",
            session_file.display(),
            cookies.len()
        );
        Ok(())
    }
    .await;

    session.close().await;
    result
}

async fn type_into(page: &Page, selector: &str, text: &str) -> Result<(), SinkError> {
    for _ in 0..20 {
        if let Ok(element) = page.find_element(selector).await {
            element
                .click()
                .await
                .map_err(|e| SinkError::Delivery(e.to_string()))?;
            element
                .type_str(text)
                .await
                .map_err(|e| SinkError::Delivery(e.to_string()))?;
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    warn!("x login: field {} never appeared", selector);
    Err(SinkError::Session(format!("login field {selector} not found")))
}

async fn press_enter(page: &Page) -> Result<(), SinkError> {
    let script = r#"(() => {
        const el = document.activeElement;
        if (!el) return false;
        const ev = { key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true };
        el.dispatchEvent(new KeyboardEvent('keydown', ev));
        el.dispatchEvent(new KeyboardEvent('keyup', ev));
        return true;
    })()"#;
    // Synthetic events cover the SPA login form; the fallback click handles
    // layouts where Enter is ignored and only the button advances the flow.
    let ok = eval_json(page, script)
        .await
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !ok {
        let _ = eval_json(
            page,
            r#"(() => {
                const btns = Array.from(document.querySelectorAll('div[role="button"], button'));
                const next = btns.find(b => /weiter|next|anmelden|log in/i.test(b.textContent || ''));
                if (next) { next.click(); return true; }
                return false;
            })()"#,
        )
        .await;
    }
    Ok(())
}
