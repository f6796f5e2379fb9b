//! Category/product listing page.

use super::nth;
use crate::driver::{ElementState, SelectBy};
use crate::page::{Navigator, PageObject};
use crate::result::VitrinaResult;
use crate::wait::StabilityWaiter;
use std::time::Duration;

pub(crate) const PRODUCT_ITEM: &str = ".product-item";
pub(crate) const PRODUCT_LINK: &str = ".product-item-link";
pub(crate) const PRICE: &str = ".price";
pub(crate) const SORTER: &str = "#sorter";

const LINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Product grid with sorting; entries may animate in, so selection waits
/// for the target link to hold still before clicking
#[derive(Debug, Clone)]
pub struct ProductListPage {
    nav: Navigator,
}

impl PageObject for ProductListPage {
    fn url_pattern(&self) -> &str {
        "**/*.html"
    }

    fn name(&self) -> &'static str {
        "product-list"
    }
}

impl ProductListPage {
    /// Create the page object
    pub fn new(nav: Navigator) -> Self {
        Self { nav }
    }

    /// Number of products in the grid
    pub async fn product_count(&self) -> VitrinaResult<usize> {
        self.nav.driver().count(PRODUCT_ITEM).await
    }

    /// Open a product by grid position.
    ///
    /// Grid entries animate in on some themes; clicking a moving link lands
    /// on the wrong product or nothing, so this waits for visibility,
    /// scrolls and then demands a stable bounding box.
    pub async fn select_product_by_index(&self, index: usize) -> VitrinaResult<()> {
        let link = format!("{} {}", nth(PRODUCT_ITEM, index), PRODUCT_LINK);
        let driver = self.nav.driver();
        driver
            .wait_for(&link, ElementState::Visible, LINK_TIMEOUT)
            .await?;
        driver.scroll_into_view(&link).await?;
        StabilityWaiter::new()
            .wait_until_stable(driver.as_ref(), &link)
            .await?;
        driver.click(&link).await?;
        self.nav.wait_for_page_load().await
    }

    /// Open a product by (partial) title
    pub async fn select_product_by_name(&self, name: &str) -> VitrinaResult<()> {
        let link = format!("{PRODUCT_LINK}[title*=\"{name}\"]");
        let driver = self.nav.driver();
        driver
            .wait_for(&link, ElementState::Visible, LINK_TIMEOUT)
            .await?;
        driver.click(&link).await?;
        self.nav.wait_for_page_load().await
    }

    /// Title of the product at a grid position
    pub async fn product_name(&self, index: usize) -> VitrinaResult<String> {
        let link = format!("{} {}", nth(PRODUCT_ITEM, index), PRODUCT_LINK);
        Ok(self
            .nav
            .driver()
            .text_content(&link)
            .await?
            .unwrap_or_default())
    }

    /// Price label of the product at a grid position
    pub async fn product_price(&self, index: usize) -> VitrinaResult<String> {
        let price = format!("{} {}", nth(PRODUCT_ITEM, index), PRICE);
        Ok(self
            .nav
            .driver()
            .text_content(&price)
            .await?
            .unwrap_or_default())
    }

    /// Re-sort the grid by the sorter's visible option label
    pub async fn sort_by(&self, label: &str) -> VitrinaResult<()> {
        self.nav
            .driver()
            .select_option(SORTER, SelectBy::label(label))
            .await?;
        self.nav.wait_for_page_load().await
    }
}
