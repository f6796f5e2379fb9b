//! Deterministic in-memory driver.
//!
//! [`SimPage`] models just enough of a live document for the suite's waits
//! and page objects to be exercised without a browser: elements addressed by
//! selector aliases, visibility and enablement, select options, bounding
//! boxes that wobble until a settle deadline, and timed mutations that land
//! after a delay. These are the ingredients of every race the real storefront
//! exhibits. All timing runs on `tokio::time`, so paused-clock tests are
//! instant and exact.
//!
//! [`Storefront`] (in `storefront`) scripts a whole shop on top of this.

mod storefront;

pub use storefront::{Storefront, StorefrontBuilder};

use crate::driver::{
    url_matches, BoundingBox, ElementState, LoadState, SelectBy, SelectChoice, VitrinaDriver,
};
use crate::result::{VitrinaError, VitrinaResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Poll interval for driver-level waits
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Latency from navigation commit to `DOMContentLoaded`
const DCL_LATENCY: Duration = Duration::from_millis(20);
/// Latency from navigation commit to `load`
const LOAD_LATENCY: Duration = Duration::from_millis(50);
/// Latency from navigation commit to network idle
const IDLE_LATENCY: Duration = Duration::from_millis(120);

/// A deferred or immediate DOM mutation
#[derive(Debug, Clone)]
pub enum Effect {
    /// Make the element visible
    Show(String),
    /// Hide the element
    Hide(String),
    /// Replace the element's text content
    SetText(String, String),
    /// Replace the element's value
    SetValue(String, String),
    /// Replace a select's option set
    ReplaceOptions(String, Vec<SelectChoice>),
}

/// Element builder for mounting into a [`SimPage`]
#[derive(Debug, Clone)]
pub struct El {
    aliases: Vec<String>,
    visible: bool,
    enabled: bool,
    text: String,
    value: String,
    checked: bool,
    options: Vec<SelectChoice>,
    rect: Option<BoundingBox>,
    settle_after: Option<Duration>,
    tag: Option<String>,
    on_click: Vec<(Duration, Effect)>,
}

impl El {
    /// New visible, enabled element addressed by `selector`
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            aliases: vec![selector.into()],
            visible: true,
            enabled: true,
            text: String::new(),
            value: String::new(),
            checked: false,
            options: Vec::new(),
            rect: None,
            settle_after: None,
            tag: None,
            on_click: Vec::new(),
        }
    }

    /// Additional selector that resolves to this element
    pub fn alias(mut self, selector: impl Into<String>) -> Self {
        self.aliases.push(selector.into());
        self
    }

    /// Mount hidden
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mount disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Text content
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Input value
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Select options as (value, label) pairs
    pub fn options(mut self, choices: &[(&str, &str)]) -> Self {
        self.options = choices
            .iter()
            .map(|(value, label)| SelectChoice::new(*value, *label))
            .collect();
        self
    }

    /// Layout rectangle
    pub fn rect(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.rect = Some(BoundingBox::new(x, y, width, height));
        self
    }

    /// Keep the bounding box moving until this long after mount
    pub fn settles_after_ms(mut self, ms: u64) -> Self {
        self.settle_after = Some(Duration::from_millis(ms));
        self
    }

    /// Opaque action tag consumed by a scripting layer
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Apply an effect immediately when clicked
    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push((Duration::ZERO, effect));
        self
    }

    /// Apply an effect some time after the click
    pub fn on_click_after(mut self, ms: u64, effect: Effect) -> Self {
        self.on_click.push((Duration::from_millis(ms), effect));
        self
    }
}

#[derive(Debug)]
struct SimElement {
    aliases: Vec<String>,
    visible: bool,
    enabled: bool,
    text: String,
    value: String,
    checked: bool,
    options: Vec<SelectChoice>,
    rect: Option<BoundingBox>,
    born: Instant,
    settle_after: Option<Duration>,
    samples: u32,
    tag: Option<String>,
    on_click: Vec<(Duration, Effect)>,
}

impl SimElement {
    fn from_builder(el: El, now: Instant) -> Self {
        Self {
            aliases: el.aliases,
            visible: el.visible,
            enabled: el.enabled,
            text: el.text,
            value: el.value,
            checked: el.checked,
            options: el.options,
            rect: el.rect,
            born: now,
            settle_after: el.settle_after,
            samples: 0,
            tag: el.tag,
            on_click: el.on_click,
        }
    }

    fn matches(&self, selector: &str) -> bool {
        self.aliases.iter().any(|a| a == selector)
    }
}

#[derive(Debug)]
struct PageState {
    url: String,
    committed: Instant,
    never_idle: bool,
    elements: Vec<SimElement>,
    pending: Vec<(Instant, Effect)>,
    blocked: Vec<String>,
    requests: Vec<(String, bool)>,
    escape_effects: Vec<Effect>,
}

impl PageState {
    fn tick(&mut self) {
        let now = Instant::now();
        let due: Vec<Effect> = {
            let mut due = Vec::new();
            self.pending.retain(|(at, effect)| {
                if *at <= now {
                    due.push(effect.clone());
                    false
                } else {
                    true
                }
            });
            due
        };
        for effect in due {
            self.apply(effect);
        }
    }

    fn find(&self, selector: &str) -> Option<&SimElement> {
        self.elements.iter().find(|e| e.matches(selector))
    }

    fn find_mut(&mut self, selector: &str) -> Option<&mut SimElement> {
        self.elements.iter_mut().find(|e| e.matches(selector))
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Show(sel) => {
                if let Some(el) = self.find_mut(&sel) {
                    el.visible = true;
                }
            }
            Effect::Hide(sel) => {
                if let Some(el) = self.find_mut(&sel) {
                    el.visible = false;
                }
            }
            Effect::SetText(sel, text) => {
                if let Some(el) = self.find_mut(&sel) {
                    el.text = text;
                }
            }
            Effect::SetValue(sel, value) => {
                if let Some(el) = self.find_mut(&sel) {
                    el.value = value;
                }
            }
            Effect::ReplaceOptions(sel, options) => {
                if let Some(el) = self.find_mut(&sel) {
                    el.options = options;
                }
            }
        }
    }

    fn load_state_reached(&self, state: LoadState) -> bool {
        let elapsed = self.committed.elapsed();
        match state {
            LoadState::DomContentLoaded => elapsed >= DCL_LATENCY,
            LoadState::Load => elapsed >= LOAD_LATENCY,
            LoadState::NetworkIdle => !self.never_idle && elapsed >= IDLE_LATENCY,
        }
    }

    fn snapshot_json(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url,
            "elements": self
                .elements
                .iter()
                .map(|el| {
                    serde_json::json!({
                        "selector": el.aliases.first().cloned().unwrap_or_default(),
                        "visible": el.visible,
                        "enabled": el.enabled,
                        "checked": el.checked,
                        "value": el.value,
                        "text": el.text,
                    })
                })
                .collect::<Vec<_>>(),
        })
    }
}

/// Scriptable in-memory document implementing [`VitrinaDriver`]
#[derive(Clone)]
pub struct SimPage {
    state: Arc<Mutex<PageState>>,
}

impl Default for SimPage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimPage")
            .field("url", &state.url)
            .field("elements", &state.elements.len())
            .finish_non_exhaustive()
    }
}

impl SimPage {
    /// Empty page at `about:blank`
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState {
                url: "about:blank".to_string(),
                committed: Instant::now(),
                never_idle: false,
                elements: Vec::new(),
                pending: Vec::new(),
                blocked: Vec::new(),
                requests: Vec::new(),
                escape_effects: Vec::new(),
            })),
        }
    }

    /// Replace the whole element tree (a fresh render)
    pub fn mount(&self, elements: Vec<El>) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.elements = elements
            .into_iter()
            .map(|el| SimElement::from_builder(el, now))
            .collect();
    }

    /// Set the document URL and restart the load clocks, dropping mutations
    /// scheduled against the previous document
    pub fn commit_navigation(&self, url: &str) {
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.committed = Instant::now();
        state.pending.clear();
    }

    /// Make `networkidle` unreachable (a page that never settles)
    pub fn set_never_idle(&self, never_idle: bool) {
        self.state.lock().never_idle = never_idle;
    }

    /// Apply a mutation immediately
    pub fn apply(&self, effect: Effect) {
        self.state.lock().apply(effect);
    }

    /// Schedule a mutation to land after a delay
    pub fn schedule(&self, after: Duration, effect: Effect) {
        let mut state = self.state.lock();
        let due = Instant::now() + after;
        state.pending.push((due, effect));
    }

    /// Effects applied when Escape is pressed
    pub fn set_escape_effects(&self, effects: Vec<Effect>) {
        self.state.lock().escape_effects = effects;
    }

    /// Action tag of the first element matching the selector
    pub fn tag_of(&self, selector: &str) -> Option<String> {
        let mut state = self.state.lock();
        state.tick();
        state.find(selector).and_then(|el| el.tag.clone())
    }

    /// Record a subresource request; returns false when a block pattern
    /// matched and the request was aborted
    pub fn simulate_request(&self, url: &str) -> bool {
        let mut state = self.state.lock();
        let allowed = !state.blocked.iter().any(|p| url_matches(p, url));
        state.requests.push((url.to_string(), allowed));
        allowed
    }

    /// Current value of an element, without going through the driver trait
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let mut state = self.state.lock();
        state.tick();
        state.find(selector).map(|el| el.value.clone())
    }

    /// URLs of requests that were aborted by a block pattern
    pub fn aborted_requests(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(_, allowed)| !allowed)
            .map(|(url, _)| url.clone())
            .collect()
    }

    fn missing(selector: &str) -> VitrinaError {
        VitrinaError::driver(format!("no element matches selector '{selector}'"))
    }

    fn not_actionable(selector: &str) -> VitrinaError {
        VitrinaError::driver(format!("element '{selector}' is not interactable"))
    }
}

#[async_trait]
impl VitrinaDriver for SimPage {
    async fn navigate(&self, url: &str) -> VitrinaResult<()> {
        self.simulate_request(url);
        self.commit_navigation(url);
        Ok(())
    }

    async fn current_url(&self) -> VitrinaResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> VitrinaResult<()> {
        let start = Instant::now();
        loop {
            {
                let mut page = self.state.lock();
                page.tick();
                if page.load_state_reached(state) {
                    return Ok(());
                }
            }
            if start.elapsed() >= timeout {
                return Err(VitrinaError::timeout(
                    timeout.as_millis() as u64,
                    format!("load state '{state}'"),
                ));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn count(&self, selector: &str) -> VitrinaResult<usize> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.elements.iter().filter(|e| e.matches(selector)).count())
    }

    async fn is_visible(&self, selector: &str) -> VitrinaResult<bool> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.find(selector).is_some_and(|el| el.visible))
    }

    async fn is_enabled(&self, selector: &str) -> VitrinaResult<bool> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.find(selector).is_some_and(|el| el.enabled))
    }

    async fn text_content(&self, selector: &str) -> VitrinaResult<Option<String>> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.find(selector).map(|el| el.text.clone()))
    }

    async fn input_value(&self, selector: &str) -> VitrinaResult<String> {
        let mut state = self.state.lock();
        state.tick();
        state
            .find(selector)
            .map(|el| el.value.clone())
            .ok_or_else(|| Self::missing(selector))
    }

    async fn options(&self, selector: &str) -> VitrinaResult<Vec<SelectChoice>> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state
            .find(selector)
            .map(|el| el.options.clone())
            .unwrap_or_default())
    }

    async fn bounding_box(&self, selector: &str) -> VitrinaResult<Option<BoundingBox>> {
        let mut state = self.state.lock();
        state.tick();
        let Some(el) = state.find_mut(selector) else {
            return Ok(None);
        };
        if !el.visible {
            return Ok(None);
        }
        let Some(base) = el.rect else {
            return Ok(None);
        };
        if let Some(settle) = el.settle_after {
            if el.born.elapsed() < settle {
                el.samples += 1;
                let drift = el.samples as f32;
                return Ok(Some(BoundingBox::new(
                    base.x + drift,
                    base.y + drift,
                    base.width,
                    base.height,
                )));
            }
        }
        Ok(Some(base))
    }

    async fn click(&self, selector: &str) -> VitrinaResult<()> {
        let effects: Vec<(Duration, Effect)> = {
            let mut state = self.state.lock();
            state.tick();
            let el = state.find(selector).ok_or_else(|| Self::missing(selector))?;
            if !el.visible || !el.enabled {
                return Err(Self::not_actionable(selector));
            }
            el.on_click.clone()
        };
        let now = Instant::now();
        let mut state = self.state.lock();
        for (delay, effect) in effects {
            if delay.is_zero() {
                state.apply(effect);
            } else {
                state.pending.push((now + delay, effect));
            }
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> VitrinaResult<()> {
        let mut state = self.state.lock();
        state.tick();
        let el = state
            .find_mut(selector)
            .ok_or_else(|| Self::missing(selector))?;
        if !el.visible || !el.enabled {
            return Err(Self::not_actionable(selector));
        }
        el.value = text.to_string();
        Ok(())
    }

    async fn select_option(&self, selector: &str, by: SelectBy) -> VitrinaResult<String> {
        let mut state = self.state.lock();
        state.tick();
        let el = state
            .find_mut(selector)
            .ok_or_else(|| Self::missing(selector))?;
        if el.options.is_empty() {
            return Err(VitrinaError::driver(format!(
                "element '{selector}' is not a select control"
            )));
        }
        let choice = match &by {
            SelectBy::Label(label) => el.options.iter().find(|c| &c.label == label),
            SelectBy::Value(value) => el.options.iter().find(|c| &c.value == value),
        };
        let Some(choice) = choice.cloned() else {
            return Err(VitrinaError::InvalidOption {
                control: selector.to_string(),
                requested: by.to_string(),
            });
        };
        el.value = choice.value.clone();
        el.text = choice.label;
        Ok(choice.value)
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> VitrinaResult<()> {
        let mut state = self.state.lock();
        state.tick();
        let el = state
            .find_mut(selector)
            .ok_or_else(|| Self::missing(selector))?;
        if !el.visible || !el.enabled {
            return Err(Self::not_actionable(selector));
        }
        el.checked = checked;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> VitrinaResult<()> {
        if key == "Escape" {
            let effects = self.state.lock().escape_effects.clone();
            let mut state = self.state.lock();
            for effect in effects {
                state.apply(effect);
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> VitrinaResult<()> {
        let mut state = self.state.lock();
        state.tick();
        if state.find(selector).is_none() {
            return Err(Self::missing(selector));
        }
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &str,
        target: ElementState,
        timeout: Duration,
    ) -> VitrinaResult<()> {
        let start = Instant::now();
        loop {
            {
                let mut state = self.state.lock();
                state.tick();
                let el = state.find(selector);
                let reached = match target {
                    ElementState::Attached => el.is_some(),
                    ElementState::Visible => el.is_some_and(|e| e.visible),
                    ElementState::Hidden => !el.is_some_and(|e| e.visible),
                };
                if reached {
                    return Ok(());
                }
            }
            if start.elapsed() >= timeout {
                tracing::debug!(
                    page = %self.state.lock().snapshot_json(),
                    selector,
                    state = %target,
                    "element wait timed out"
                );
                return Err(VitrinaError::timeout(
                    timeout.as_millis() as u64,
                    format!("'{selector}' to be {target}"),
                ));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> VitrinaResult<()> {
        let start = Instant::now();
        loop {
            {
                let mut state = self.state.lock();
                state.tick();
                if url_matches(pattern, &state.url) {
                    return Ok(());
                }
            }
            if start.elapsed() >= timeout {
                return Err(VitrinaError::timeout(
                    timeout.as_millis() as u64,
                    format!("URL matching '{pattern}'"),
                ));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn block_requests(&self, patterns: &[&str]) -> VitrinaResult<()> {
        let mut state = self.state.lock();
        state
            .blocked
            .extend(patterns.iter().map(|p| (*p).to_string()));
        Ok(())
    }

    async fn screenshot(&self) -> VitrinaResult<Vec<u8>> {
        // PNG signature followed by nothing: enough for callers that only
        // persist the artifact
        Ok(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scheduled_effects_land_on_time() {
        let page = SimPage::new();
        page.mount(vec![El::new(".message-success").hidden()]);
        page.schedule(
            Duration::from_millis(120),
            Effect::Show(".message-success".to_string()),
        );

        assert!(!page.is_visible(".message-success").await.unwrap());
        page.wait_for(
            ".message-success",
            ElementState::Visible,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn click_effects_fire_with_their_delay() {
        let page = SimPage::new();
        page.mount(vec![
            El::new(".fc-button").on_click_after(150, Effect::Hide(".fc-consent-root".into())),
            El::new(".fc-consent-root"),
        ]);
        page.click(".fc-button").await.unwrap();
        assert!(page.is_visible(".fc-consent-root").await.unwrap());
        page.wait_for(
            ".fc-consent-root",
            ElementState::Hidden,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn select_rejects_unknown_labels() {
        let page = SimPage::new();
        page.mount(vec![El::new("select[name=\"region_id\"]")
            .options(&[("AL", "Alabama"), ("AK", "Alaska")])]);
        let err = page
            .select_option("select[name=\"region_id\"]", SelectBy::label("Cluj"))
            .await
            .unwrap_err();
        assert!(matches!(err, VitrinaError::InvalidOption { .. }));

        let value = page
            .select_option("select[name=\"region_id\"]", SelectBy::label("Alaska"))
            .await
            .unwrap();
        assert_eq!(value, "AK");
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_requests_are_recorded_as_aborted() {
        let page = SimPage::new();
        page.block_requests(&["**/consent**", "**/gdpr**"])
            .await
            .unwrap();
        assert!(!page.simulate_request("https://cdn.example/consent/loader.js"));
        assert!(page.simulate_request("https://cdn.example/app.js"));
        assert_eq!(
            page.aborted_requests(),
            vec!["https://cdn.example/consent/loader.js".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_elements_have_no_bounding_box() {
        let page = SimPage::new();
        page.mount(vec![El::new(".hero").rect(0.0, 0.0, 10.0, 10.0).hidden()]);
        assert!(page.bounding_box(".hero").await.unwrap().is_none());
        page.apply(Effect::Show(".hero".to_string()));
        assert!(page.bounding_box(".hero").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn escape_applies_registered_effects() {
        let page = SimPage::new();
        page.mount(vec![El::new(".gdpr-modal")]);
        page.set_escape_effects(vec![Effect::Hide(".gdpr-modal".to_string())]);
        page.press_key("Escape").await.unwrap();
        assert!(!page.is_visible(".gdpr-modal").await.unwrap());
    }
}
