//! Selector-fallback chains for logical UI targets.
//!
//! The site's markup and ARIA attributes have changed repeatedly over the
//! scraper's lifetime, so no single locator is reliable long-term. Each
//! logical target (filter button, results tab, …) is an ordered list of
//! [`Locator`] strategies tried in sequence; the first one that resolves and
//! clicks wins.

use chromiumoxide::Page;
use tracing::debug;

use super::browser::eval_json;

/// One strategy for finding a clickable element.
#[derive(Debug, Clone)]
pub enum Locator {
    /// Plain CSS selector, clicked as-is.
    Css(String),
    /// Element with an exact `aria-label` value.
    AriaLabel(String),
    /// Button-like element (`button`, `[role=button]`, submit inputs) whose
    /// visible text matches (trimmed, case-insensitive).
    ButtonText(String),
    /// Any visible element whose trimmed text matches exactly — the bluntest
    /// strategy, kept last in every chain.
    Text(String),
}

impl Locator {
    pub fn css(s: &str) -> Self {
        Self::Css(s.to_string())
    }
    pub fn aria(s: &str) -> Self {
        Self::AriaLabel(s.to_string())
    }
    pub fn button_text(s: &str) -> Self {
        Self::ButtonText(s.to_string())
    }
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }

    /// JS that locates the element per this strategy and clicks it.
    /// Evaluates to `true` when something was clicked.
    fn click_script(&self) -> String {
        // serde_json gives us a correctly escaped JS string literal.
        let lit = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into());
        let finder = match self {
            Self::Css(sel) => format!("document.querySelector({})", lit(sel)),
            Self::AriaLabel(label) => format!(
                "document.querySelector('[aria-label=' + JSON.stringify({}) + ']')",
                lit(label)
            ),
            Self::ButtonText(text) => format!(
                r#"(() => {{
                    const want = {}.trim().toLowerCase();
                    const candidates = document.querySelectorAll(
                        'button, [role="button"], input[type="button"], input[type="submit"]'
                    );
                    for (const el of candidates) {{
                        const t = (el.innerText || el.value || '').trim().toLowerCase();
                        if (t === want) return el;
                    }}
                    return null;
                }})()"#,
                lit(text)
            ),
            Self::Text(text) => format!(
                r#"(() => {{
                    const want = {}.trim();
                    const all = document.querySelectorAll('body *');
                    for (const el of all) {{
                        if (el.children.length > 0) continue;
                        if ((el.textContent || '').trim() !== want) continue;
                        const style = window.getComputedStyle(el);
                        if (style.display === 'none' || style.visibility === 'hidden') continue;
                        return el;
                    }}
                    return null;
                }})()"#,
                lit(text)
            ),
        };
        format!(
            r#"(() => {{
                const el = {finder};
                if (!el) return false;
                try {{ el.click(); return true; }} catch (_) {{ return false; }}
            }})()"#
        )
    }

    /// Try to click per this strategy. `false` means "not found", not an error.
    pub async fn try_click(&self, page: &Page) -> bool {
        let clicked = eval_json(page, &self.click_script())
            .await
            .and_then(|j| j.as_bool())
            .unwrap_or(false);
        if clicked {
            debug!("locator: clicked via {:?}", self);
        }
        clicked
    }
}

/// First-success composition: try each locator in order, return `true` as soon
/// as one clicks.
pub async fn click_first(page: &Page, chain: &[Locator]) -> bool {
    for loc in chain {
        if loc.try_click(page).await {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_script_escapes_quotes() {
        let loc = Locator::button_text("Alles \"akzeptieren\"");
        let js = loc.click_script();
        assert!(js.contains(r#"\"akzeptieren\""#));
    }

    #[test]
    fn test_aria_script_uses_attribute_selector() {
        let js = Locator::aria("Filter öffnen").click_script();
        assert!(js.contains("aria-label"));
        assert!(js.contains("Filter öffnen"));
    }
}
