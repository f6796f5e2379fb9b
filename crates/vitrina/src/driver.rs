//! Abstract browser-automation driver.
//!
//! The storefront pages never talk to a browser directly; they talk to this
//! trait. Swapping implementations is the point: the simulated storefront
//! (`sim`) runs the suite deterministically, while the `browser` feature
//! provides a real Chromium over CDP.

use crate::result::VitrinaResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Page load states, weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// `DOMContentLoaded` fired
    DomContentLoaded,
    /// The `load` event fired
    #[default]
    Load,
    /// No network activity for the idle threshold
    NetworkIdle,
}

impl LoadState {
    /// Event name for this load state
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::DomContentLoaded => "domcontentloaded",
            Self::Load => "load",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// Element states a wait can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// Present in the DOM, visible or not
    Attached,
    /// Present and visible
    Visible,
    /// Absent or invisible
    Hidden,
}

impl ElementState {
    /// State name for diagnostics
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for ElementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How to resolve an `<option>` within a select control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectBy {
    /// Match the visible option label
    Label(String),
    /// Match the option value attribute
    Value(String),
}

impl SelectBy {
    /// Select by visible label
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }

    /// Select by value attribute
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }
}

impl std::fmt::Display for SelectBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Label(label) => write!(f, "label '{label}'"),
            Self::Value(value) => write!(f, "value '{value}'"),
        }
    }
}

/// One `<option>` of a select control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectChoice {
    /// Value attribute
    pub value: String,
    /// Visible label
    pub label: String,
}

impl SelectChoice {
    /// Create a choice
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Bounding rectangle of a rendered element at one sampling instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f32,
    /// Y position
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Browser/driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// User agent override
    pub user_agent: Option<String>,
    /// Timeout for navigation
    pub navigation_timeout: Duration,
    /// Timeout for element queries
    pub element_timeout: Duration,
    /// Browser executable override
    pub executable_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: None,
            navigation_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(10),
            executable_path: None,
            sandbox: true,
        }
    }
}

impl DriverConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    pub const fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set navigation timeout
    pub const fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set browser executable path
    pub fn executable_path(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    pub const fn no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// The automation capability the suite consumes.
///
/// Every operation resolves a selector lazily at call time and returns a
/// typed error rather than panicking. Waits carry explicit timeouts; an
/// unbounded wait is a defect.
#[async_trait]
pub trait VitrinaDriver: Send + Sync {
    /// Navigate to an absolute URL
    async fn navigate(&self, url: &str) -> VitrinaResult<()>;

    /// Current document URL
    async fn current_url(&self) -> VitrinaResult<String>;

    /// Wait for the document to reach a load state
    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> VitrinaResult<()>;

    /// Number of elements matching the selector
    async fn count(&self, selector: &str) -> VitrinaResult<usize>;

    /// Whether the first match is visible
    async fn is_visible(&self, selector: &str) -> VitrinaResult<bool>;

    /// Whether the first match is enabled
    async fn is_enabled(&self, selector: &str) -> VitrinaResult<bool>;

    /// Text content of the first match, `None` when absent
    async fn text_content(&self, selector: &str) -> VitrinaResult<Option<String>>;

    /// Current value of the first matching input/select
    async fn input_value(&self, selector: &str) -> VitrinaResult<String>;

    /// Options of the first matching select; empty when the element is
    /// absent or not a select
    async fn options(&self, selector: &str) -> VitrinaResult<Vec<SelectChoice>>;

    /// Bounding box of the first match, `None` when not rendered
    async fn bounding_box(&self, selector: &str) -> VitrinaResult<Option<BoundingBox>>;

    /// Click the first match
    async fn click(&self, selector: &str) -> VitrinaResult<()>;

    /// Replace the value of the first matching input
    async fn fill(&self, selector: &str, text: &str) -> VitrinaResult<()>;

    /// Select an option; returns the resolved option value
    async fn select_option(&self, selector: &str, by: SelectBy) -> VitrinaResult<String>;

    /// Check or uncheck the first matching checkbox/radio
    async fn set_checked(&self, selector: &str, checked: bool) -> VitrinaResult<()>;

    /// Press a key on the focused document
    async fn press_key(&self, key: &str) -> VitrinaResult<()>;

    /// Scroll the first match into view
    async fn scroll_into_view(&self, selector: &str) -> VitrinaResult<()>;

    /// Wait for the first match to reach an element state
    async fn wait_for(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> VitrinaResult<()>;

    /// Wait for the document URL to match a glob pattern
    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> VitrinaResult<()>;

    /// Abort any request whose URL matches one of the glob patterns
    async fn block_requests(&self, patterns: &[&str]) -> VitrinaResult<()>;

    /// Capture a screenshot of the current viewport as PNG bytes
    async fn screenshot(&self) -> VitrinaResult<Vec<u8>>;
}

/// Match a URL against a glob pattern (`*` within a path segment, `**`
/// across segments), the pattern dialect the original suite's URL waits use.
pub fn url_matches(pattern: &str, url: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() * 2);
    regex.push('^');
    regex.push_str(
        &regex::escape(pattern)
            .replace(r"\*\*", ".*")
            .replace(r"\*", "[^/]*"),
    );
    regex.push('$');
    regex::Regex::new(&regex).map(|re| re.is_match(url)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod url_pattern_tests {
        use super::*;

        #[test]
        fn double_star_spans_segments() {
            assert!(url_matches(
                "**/checkout/onepage/success/**",
                "https://shop.example/checkout/onepage/success/"
            ));
            assert!(url_matches(
                "**/checkout/onepage/success/**",
                "https://shop.example/eu/checkout/onepage/success/?order=42"
            ));
            assert!(!url_matches(
                "**/checkout/onepage/success/**",
                "https://shop.example/checkout/cart/"
            ));
        }

        #[test]
        fn single_star_stays_in_segment() {
            assert!(url_matches(
                "https://shop.example/product/*",
                "https://shop.example/product/cronus-yoga-pant"
            ));
            assert!(!url_matches(
                "https://shop.example/product/*",
                "https://shop.example/product/men/0"
            ));
        }

        #[test]
        fn anchored_pattern_rejects_suffixes() {
            assert!(url_matches(
                "**/checkout/",
                "https://shop.example/checkout/"
            ));
            assert!(!url_matches(
                "**/checkout/",
                "https://shop.example/checkout/cart/"
            ));
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn builder_overrides_defaults() {
            let config = DriverConfig::new()
                .headless(false)
                .viewport(1280, 720)
                .no_sandbox();
            assert!(!config.headless);
            assert_eq!(config.viewport_width, 1280);
            assert_eq!(config.viewport_height, 720);
            assert!(!config.sandbox);
        }
    }

    mod select_tests {
        use super::*;

        #[test]
        fn select_by_formats_for_diagnostics() {
            assert_eq!(SelectBy::label("Romania").to_string(), "label 'Romania'");
            assert_eq!(SelectBy::value("RO").to_string(), "value 'RO'");
        }
    }
}
