//! Cookie/GDPR consent-overlay dismissal.
//!
//! Consent overlays appear on their own schedule, vary by tenant and block
//! everything underneath, so dismissal is a strategy cascade rather than a
//! single selector: probe the known modal shapes in priority order, click
//! the first accept control that shows up, fall back to Escape and close
//! icons, and never fail the calling flow. A lingering banner surfaces
//! later through the caller's own waits.

use crate::driver::{ElementState, VitrinaDriver};
use crate::result::VitrinaResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Known consent modal containers, most specific first
const MODAL_SELECTORS: &[&str] = &[
    ".fc-consent-root",
    "[role=\"dialog\"]",
    ".cookie-consent",
    ".consent-banner",
    ".gdpr-modal",
    ".privacy-modal",
    "div[class*=\"consent\"]",
    "div[class*=\"cookie\"]",
];

/// Accept/consent controls, most specific first
const ACCEPT_SELECTORS: &[&str] = &[
    ".fc-button.fc-cta-consent",
    "[data-testid=\"consent-accept\"]",
    "[data-testid=\"uc-accept-all-button\"]",
    "button[class*=\"consent\"]",
    "button[class*=\"accept\"]",
    ".consent-accept",
    ".accept-all",
    ".btn-consent",
];

/// "Manage options" controls for the preferences-first variant
const MANAGE_SELECTORS: &[&str] = &[
    ".fc-button.fc-secondary-button",
    "[data-testid=\"manage-options\"]",
    "button[class*=\"manage\"]",
];

/// Generic close controls for modals without an accept button
const CLOSE_SELECTORS: &[&str] = &[
    ".fc-close",
    "[aria-label=\"Close\"]",
    ".close",
    ".modal-close",
];

/// URL patterns of consent tooling, for the request-blocking strategy
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "**/consent**",
    "**/cookie-banner**",
    "**/gdpr**",
    "**/cookielaw**",
];

const MODAL_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const BUTTON_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const HIDE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_POLL: Duration = Duration::from_millis(100);

/// How to neutralize consent overlays for a session.
///
/// `BlockRequests` and the click-based strategies are mutually exclusive
/// within one test: blocking changes what the page loads, clicking changes
/// what the page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentStrategy {
    /// Click the accept control (default)
    #[default]
    Accept,
    /// Open "manage options" first, then accept
    ManageOptions,
    /// Abort consent-tooling requests so the overlay never mounts
    BlockRequests,
}

/// Detects and dismisses consent overlays; tolerates their absence
#[derive(Clone)]
pub struct ConsentDismisser {
    driver: Arc<dyn VitrinaDriver>,
}

impl std::fmt::Debug for ConsentDismisser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentDismisser").finish_non_exhaustive()
    }
}

impl ConsentDismisser {
    /// Create a dismisser over a driver handle
    pub fn new(driver: Arc<dyn VitrinaDriver>) -> Self {
        Self { driver }
    }

    /// Apply a consent strategy. Only `BlockRequests` can fail (the route
    /// installation itself); the click strategies always resolve.
    pub async fn apply(&self, strategy: ConsentStrategy) -> VitrinaResult<bool> {
        match strategy {
            ConsentStrategy::Accept => Ok(self.dismiss().await),
            ConsentStrategy::ManageOptions => Ok(self.dismiss_managing_options().await),
            ConsentStrategy::BlockRequests => {
                self.block_requests().await?;
                Ok(true)
            }
        }
    }

    /// Dismiss any visible consent modal.
    ///
    /// Returns whether the overlay ended up hidden. Never returns an error:
    /// detection failures, click failures and a lingering modal are all
    /// logged and swallowed.
    pub async fn dismiss(&self) -> bool {
        let Some(modal) = self.first_visible(MODAL_SELECTORS, MODAL_PROBE_TIMEOUT).await else {
            tracing::debug!("no consent modal present");
            return false;
        };
        tracing::info!(modal, "consent modal detected");

        if let Some(button) = self.first_visible(ACCEPT_SELECTORS, BUTTON_PROBE_TIMEOUT).await {
            if let Err(err) = self.driver.click(button).await {
                tracing::warn!(button, error = %err, "consent accept click failed");
                return false;
            }
            tracing::debug!(button, "consent accepted");
            self.await_hidden(modal).await
        } else {
            tracing::debug!("no accept control matched, trying secondary dismissal");
            let _ = self.driver.press_key("Escape").await;
            if let Some(close) = self.first_visible(CLOSE_SELECTORS, BUTTON_PROBE_TIMEOUT).await {
                if let Err(err) = self.driver.click(close).await {
                    tracing::warn!(close, error = %err, "close-icon click failed");
                }
            }
            self.await_hidden(modal).await
        }
    }

    /// Variant for tenants that route acceptance through a preferences
    /// panel: open "manage options" when offered, then accept.
    pub async fn dismiss_managing_options(&self) -> bool {
        let Some(modal) = self
            .first_visible(&MODAL_SELECTORS[..2], MODAL_PROBE_TIMEOUT)
            .await
        else {
            tracing::debug!("no consent modal present");
            return false;
        };

        if let Some(manage) = self.first_visible(MANAGE_SELECTORS, BUTTON_PROBE_TIMEOUT).await {
            if let Err(err) = self.driver.click(manage).await {
                tracing::warn!(manage, error = %err, "manage-options click failed");
            }
        }
        // The preferences panel re-renders before the accept control is
        // clickable again.
        if let Some(button) = self.first_visible(ACCEPT_SELECTORS, MODAL_PROBE_TIMEOUT).await {
            if let Err(err) = self.driver.click(button).await {
                tracing::warn!(button, error = %err, "consent accept click failed");
                return false;
            }
        }
        self.await_hidden(modal).await
    }

    /// Abort consent-tooling requests so the overlay never mounts.
    pub async fn block_requests(&self) -> VitrinaResult<()> {
        tracing::info!(patterns = ?BLOCKED_URL_PATTERNS, "blocking consent requests");
        self.driver.block_requests(BLOCKED_URL_PATTERNS).await
    }

    /// Poll the candidates in priority order until one is visible or the
    /// bound elapses. Probe errors count as "not visible".
    async fn first_visible<'a>(
        &self,
        candidates: &'a [&'a str],
        bound: Duration,
    ) -> Option<&'a str> {
        let start = Instant::now();
        loop {
            for &selector in candidates {
                if self.driver.is_visible(selector).await.unwrap_or(false) {
                    return Some(selector);
                }
            }
            if start.elapsed() >= bound {
                return None;
            }
            tokio::time::sleep(PROBE_POLL).await;
        }
    }

    /// Bounded wait for the modal to hide; a timeout is logged, not fatal.
    async fn await_hidden(&self, modal: &str) -> bool {
        match self
            .driver
            .wait_for(modal, ElementState::Hidden, HIDE_TIMEOUT)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(modal, error = %err, "consent modal still visible, continuing");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Effect, El, SimPage};

    fn dismisser_over(page: &SimPage) -> ConsentDismisser {
        ConsentDismisser::new(Arc::new(page.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn absent_modal_is_a_cheap_no_op_twice() {
        let page = SimPage::new();
        let consent = dismisser_over(&page);
        assert!(!consent.dismiss().await);
        assert!(!consent.dismiss().await);
    }

    #[tokio::test(start_paused = true)]
    async fn accept_button_dismisses_the_modal() {
        let page = SimPage::new();
        page.mount(vec![
            El::new(".fc-consent-root").text("We value your privacy"),
            El::new(".fc-button.fc-cta-consent")
                .text("Consent")
                .on_click_after(150, Effect::Hide(".fc-consent-root".to_string())),
        ]);
        let consent = dismisser_over(&page);
        assert!(consent.dismiss().await);
        assert!(!page.is_visible(".fc-consent-root").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn late_modal_is_still_caught_by_the_probe_window() {
        let page = SimPage::new();
        page.mount(vec![
            El::new(".gdpr-modal").hidden(),
            El::new(".accept-all")
                .hidden()
                .on_click(Effect::Hide(".gdpr-modal".to_string())),
        ]);
        // The overlay mounts a moment after navigation.
        page.schedule(
            Duration::from_millis(700),
            Effect::Show(".gdpr-modal".to_string()),
        );
        page.schedule(
            Duration::from_millis(700),
            Effect::Show(".accept-all".to_string()),
        );
        let consent = dismisser_over(&page);
        assert!(consent.dismiss().await);
    }

    #[tokio::test(start_paused = true)]
    async fn buttonless_modal_falls_back_to_escape_and_close() {
        let page = SimPage::new();
        page.mount(vec![
            El::new(".privacy-modal"),
            El::new(".fc-close").on_click(Effect::Hide(".privacy-modal".to_string())),
        ]);
        page.set_escape_effects(vec![]);
        let consent = dismisser_over(&page);
        assert!(consent.dismiss().await);
        assert!(!page.is_visible(".privacy-modal").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn lingering_modal_is_swallowed_not_fatal() {
        let page = SimPage::new();
        page.mount(vec![
            El::new(".cookie-consent"),
            // The click lands but the overlay never actually hides.
            El::new(".btn-consent").text("OK"),
        ]);
        let consent = dismisser_over(&page);
        assert!(!consent.dismiss().await);
    }

    #[tokio::test(start_paused = true)]
    async fn manage_options_path_accepts_after_the_panel() {
        let page = SimPage::new();
        page.mount(vec![
            El::new(".fc-consent-root"),
            El::new(".fc-button.fc-secondary-button").text("Manage options"),
            El::new(".fc-button.fc-cta-consent")
                .hidden()
                .on_click(Effect::Hide(".fc-consent-root".to_string())),
        ]);
        // Accept appears once the preferences panel has rendered.
        page.schedule(
            Duration::from_millis(300),
            Effect::Show(".fc-button.fc-cta-consent".to_string()),
        );
        let consent = dismisser_over(&page);
        assert!(consent.dismiss_managing_options().await);
    }

    #[tokio::test(start_paused = true)]
    async fn block_strategy_installs_route_patterns() {
        let page = SimPage::new();
        let consent = dismisser_over(&page);
        consent
            .apply(ConsentStrategy::BlockRequests)
            .await
            .unwrap();
        assert!(!page.simulate_request("https://cdn.tenant.example/gdpr/loader.js"));
        assert!(page.simulate_request("https://cdn.tenant.example/theme.css"));
    }
}
