//! Storefront landing page.

use crate::page::{Navigator, PageObject};
use crate::result::VitrinaResult;

pub(crate) const SEARCH_BOX: &str = "#search";
pub(crate) const SEARCH_BUTTON: &str = "button[title=\"Search\"]";
pub(crate) const NAV_MEN: &str = "#ui-id-5";
pub(crate) const NAV_WOMEN: &str = "#ui-id-4";
pub(crate) const CART_ICON: &str = ".showcart";

/// Landing page: category navigation, search, minicart toggle
#[derive(Debug, Clone)]
pub struct HomePage {
    nav: Navigator,
}

impl PageObject for HomePage {
    fn url_pattern(&self) -> &str {
        "**/"
    }

    fn name(&self) -> &'static str {
        "home"
    }
}

impl HomePage {
    /// Create the page object
    pub fn new(nav: Navigator) -> Self {
        Self { nav }
    }

    /// Navigate to the storefront root
    pub async fn open(&self) -> VitrinaResult<()> {
        self.nav.open("/").await
    }

    /// Open the Men category listing
    pub async fn go_to_men(&self) -> VitrinaResult<()> {
        self.nav.driver().click(NAV_MEN).await?;
        self.nav.wait_for_page_load().await
    }

    /// Open the Women category listing
    pub async fn go_to_women(&self) -> VitrinaResult<()> {
        self.nav.driver().click(NAV_WOMEN).await?;
        self.nav.wait_for_page_load().await
    }

    /// Search the catalog
    pub async fn search(&self, term: &str) -> VitrinaResult<()> {
        self.nav.driver().fill(SEARCH_BOX, term).await?;
        self.nav.driver().click(SEARCH_BUTTON).await?;
        self.nav.wait_for_page_load().await
    }

    /// Toggle the minicart overlay from the header
    pub async fn open_minicart(&self) -> VitrinaResult<()> {
        self.nav.driver().click(CART_ICON).await
    }
}
