//! Product detail page.

use super::nth;
use crate::driver::ElementState;
use crate::page::{Navigator, PageObject};
use crate::result::{VitrinaError, VitrinaResult};
use std::time::Duration;

pub(crate) const PRODUCT_NAME: &str = ".page-title";
pub(crate) const PRODUCT_PRICE: &str = ".price-final_price .price";
pub(crate) const QTY_INPUT: &str = "#qty";
pub(crate) const SIZE_OPTION: &str = ".swatch-attribute.size .swatch-option";
pub(crate) const COLOR_OPTION: &str = ".swatch-attribute.color .swatch-option";
pub(crate) const ADD_TO_CART: &str = "#product-addtocart-button";
pub(crate) const SUCCESS_MESSAGE: &str = ".message-success";

const SUCCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Product detail: option swatches, quantity, add-to-cart
#[derive(Debug, Clone)]
pub struct ProductDetailPage {
    nav: Navigator,
}

impl PageObject for ProductDetailPage {
    fn url_pattern(&self) -> &str {
        "**/product/**"
    }

    fn name(&self) -> &'static str {
        "product-detail"
    }
}

impl ProductDetailPage {
    /// Create the page object
    pub fn new(nav: Navigator) -> Self {
        Self { nav }
    }

    /// Product title
    pub async fn product_name(&self) -> VitrinaResult<String> {
        Ok(self
            .nav
            .driver()
            .text_content(PRODUCT_NAME)
            .await?
            .unwrap_or_default())
    }

    /// Price label
    pub async fn product_price(&self) -> VitrinaResult<String> {
        Ok(self
            .nav
            .driver()
            .text_content(PRODUCT_PRICE)
            .await?
            .unwrap_or_default())
    }

    /// Size labels currently offered
    pub async fn available_sizes(&self) -> VitrinaResult<Vec<String>> {
        let driver = self.nav.driver();
        let count = driver.count(SIZE_OPTION).await?;
        let mut sizes = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(label) = driver.text_content(&nth(SIZE_OPTION, index)).await? {
                if !label.trim().is_empty() {
                    sizes.push(label);
                }
            }
        }
        Ok(sizes)
    }

    /// Pick a size swatch by label
    pub async fn select_size(&self, size: &str) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        let count = driver.count(SIZE_OPTION).await?;
        for index in 0..count {
            let swatch = nth(SIZE_OPTION, index);
            if driver.text_content(&swatch).await?.as_deref() == Some(size) {
                return driver.click(&swatch).await;
            }
        }
        Err(VitrinaError::InvalidOption {
            control: SIZE_OPTION.to_string(),
            requested: size.to_string(),
        })
    }

    /// Pick a color swatch by (partial) aria label
    pub async fn select_color(&self, color: &str) -> VitrinaResult<()> {
        let swatch = format!("{COLOR_OPTION}[aria-label*=\"{color}\"]");
        self.nav.driver().click(&swatch).await
    }

    /// Set the order quantity
    pub async fn set_quantity(&self, quantity: u32) -> VitrinaResult<()> {
        self.nav
            .driver()
            .fill(QTY_INPUT, &quantity.to_string())
            .await
    }

    /// Whether the add-to-cart control is enabled
    pub async fn is_add_to_cart_enabled(&self) -> VitrinaResult<bool> {
        self.nav.driver().is_enabled(ADD_TO_CART).await
    }

    /// Click add-to-cart and wait for the success toast
    pub async fn add_to_cart(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver.click(ADD_TO_CART).await?;
        driver
            .wait_for(SUCCESS_MESSAGE, ElementState::Visible, SUCCESS_TIMEOUT)
            .await
    }

    /// Add to cart with explicit options; anything left `None` keeps the
    /// page's current selection
    pub async fn add_to_cart_with_options(
        &self,
        size: Option<&str>,
        color: Option<&str>,
        quantity: Option<u32>,
    ) -> VitrinaResult<()> {
        if let Some(size) = size {
            self.select_size(size).await?;
        }
        if let Some(color) = color {
            self.select_color(color).await?;
        }
        if let Some(quantity) = quantity {
            self.set_quantity(quantity).await?;
        }
        self.add_to_cart().await
    }

    /// Add to cart picking the first available size and color, if the
    /// product has such options at all
    pub async fn add_to_cart_with_defaults(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        if driver.count(SIZE_OPTION).await? > 0 {
            driver.click(&nth(SIZE_OPTION, 0)).await?;
        }
        if driver.count(COLOR_OPTION).await? > 0 {
            driver.click(&nth(COLOR_OPTION, 0)).await?;
        }
        self.add_to_cart().await
    }
}
