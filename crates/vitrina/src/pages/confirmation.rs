//! Order confirmation page.

use crate::driver::ElementState;
use crate::page::{Navigator, PageObject};
use crate::result::VitrinaResult;
use std::time::Duration;

pub(crate) const THANK_YOU: &str = ".checkout-success h1";
pub(crate) const ORDER_NUMBER: &str = ".checkout-success .order-number";
pub(crate) const CONTINUE_SHOPPING: &str = ".checkout-success .continue";
pub(crate) const SUCCESS_URL: &str = "**/checkout/onepage/success/**";

const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Post-order confirmation page
#[derive(Debug, Clone)]
pub struct OrderConfirmationPage {
    nav: Navigator,
}

impl PageObject for OrderConfirmationPage {
    fn url_pattern(&self) -> &str {
        SUCCESS_URL
    }

    fn name(&self) -> &'static str {
        "order-confirmation"
    }
}

impl OrderConfirmationPage {
    /// Create the page object
    pub fn new(nav: Navigator) -> Self {
        Self { nav }
    }

    /// Wait until the confirmation page has committed and shows its message
    pub async fn wait_for_confirmation(&self) -> VitrinaResult<()> {
        self.nav.wait_for_page(self, CONFIRMATION_TIMEOUT).await?;
        self.nav
            .driver()
            .wait_for(THANK_YOU, ElementState::Visible, MESSAGE_TIMEOUT)
            .await
    }

    /// The order number, digits only
    pub async fn order_number(&self) -> VitrinaResult<String> {
        let text = self
            .nav
            .driver()
            .text_content(ORDER_NUMBER)
            .await?
            .unwrap_or_default();
        Ok(text.chars().filter(char::is_ascii_digit).collect())
    }

    /// The thank-you headline
    pub async fn thank_you_message(&self) -> VitrinaResult<String> {
        Ok(self
            .nav
            .driver()
            .text_content(THANK_YOU)
            .await?
            .unwrap_or_default())
    }

    /// Whether both the message and the order number are on screen
    pub async fn is_order_confirmed(&self) -> VitrinaResult<bool> {
        let driver = self.nav.driver();
        Ok(driver.is_visible(THANK_YOU).await? && driver.is_visible(ORDER_NUMBER).await?)
    }

    /// Back to the catalog
    pub async fn continue_shopping(&self) -> VitrinaResult<()> {
        self.nav.driver().click(CONTINUE_SHOPPING).await?;
        self.nav.wait_for_page_load().await
    }
}
