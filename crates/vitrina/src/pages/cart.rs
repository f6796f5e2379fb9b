//! Shopping cart: the transient minicart overlay, the full cart page, and
//! the resolution between them on the way to checkout.

use super::nth;
use crate::driver::ElementState;
use crate::page::{Navigator, PageObject};
use crate::result::VitrinaResult;
use crate::wait::StabilityWaiter;
use std::time::Duration;

pub(crate) const CART_ITEM: &str = ".cart-item";
pub(crate) const ITEM_NAME: &str = ".product-item-name a";
pub(crate) const QTY_INPUT: &str = ".qty input";
pub(crate) const REMOVE_BUTTON: &str = ".action-delete";
pub(crate) const UPDATE_CART: &str = "[name=\"update_cart_action\"]";
pub(crate) const SUBTOTAL: &str = ".totals .sub .price";
pub(crate) const GRAND_TOTAL: &str = ".grand.totals .price";
pub(crate) const CART_CHECKOUT: &str = ".checkout-methods-items .action.primary.checkout";
pub(crate) const EMPTY_CART: &str = ".cart-empty";
pub(crate) const COUPON_INPUT: &str = "#coupon_code";
pub(crate) const APPLY_COUPON: &str = "#discount-coupon-form button";
pub(crate) const CONTINUE_SHOPPING: &str = ".continue-shopping-link";

pub(crate) const MINICART_TOGGLE: &str = ".showcart";
pub(crate) const MINICART: &str = ".block-minicart";
pub(crate) const MINICART_COUNTER: &str = ".counter-number";
pub(crate) const MINICART_CHECKOUT: &str = "#top-cart-btn-checkout";
pub(crate) const MINICART_SUBTOTAL: &str = ".block-minicart .subtotal .price";
pub(crate) const MINICART_VIEW_CART: &str = ".block-minicart .action.viewcart";

/// URL of the full cart page
pub(crate) const CART_PATH: &str = "/checkout/cart/";
/// Anchored pattern for the checkout page itself (the cart page would also
/// match an unanchored `**/checkout/**`)
const CHECKOUT_URL: &str = "**/checkout/";
const CART_URL: &str = "**/checkout/cart/";

/// Bound for the minicart's checkout control to materialize before the
/// full-page fallback kicks in
const MINICART_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);
const OVERLAY_TIMEOUT: Duration = Duration::from_secs(5);
const URL_TIMEOUT: Duration = Duration::from_secs(30);

/// Cart surfaces and the checkout hand-off
#[derive(Debug, Clone)]
pub struct ShoppingCartPage {
    nav: Navigator,
}

impl PageObject for ShoppingCartPage {
    fn url_pattern(&self) -> &str {
        CART_URL
    }

    fn name(&self) -> &'static str {
        "shopping-cart"
    }
}

impl ShoppingCartPage {
    /// Create the page object
    pub fn new(nav: Navigator) -> Self {
        Self { nav }
    }

    // --- full cart page ---

    /// Navigate to the full cart page
    pub async fn open_cart_page(&self) -> VitrinaResult<()> {
        self.nav.open(CART_PATH).await
    }

    /// Number of line items
    pub async fn item_count(&self) -> VitrinaResult<usize> {
        self.nav.driver().count(CART_ITEM).await
    }

    /// Name of the line item at an index
    pub async fn item_name(&self, index: usize) -> VitrinaResult<String> {
        let selector = format!("{} {}", nth(CART_ITEM, index), ITEM_NAME);
        Ok(self
            .nav
            .driver()
            .text_content(&selector)
            .await?
            .unwrap_or_default())
    }

    /// Change a line item's quantity and submit the update
    pub async fn update_quantity(&self, index: usize, quantity: u32) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        let input = format!("{} {}", nth(CART_ITEM, index), QTY_INPUT);
        driver.fill(&input, &quantity.to_string()).await?;
        driver.click(UPDATE_CART).await?;
        self.nav.wait_for_page_load().await
    }

    /// Remove a line item
    pub async fn remove_item(&self, index: usize) -> VitrinaResult<()> {
        let button = format!("{} {}", nth(CART_ITEM, index), REMOVE_BUTTON);
        self.nav.driver().click(&button).await?;
        self.nav.wait_for_page_load().await
    }

    /// Whether the cart shows its empty state
    pub async fn is_cart_empty(&self) -> VitrinaResult<bool> {
        self.nav.driver().is_visible(EMPTY_CART).await
    }

    /// Subtotal label
    pub async fn subtotal(&self) -> VitrinaResult<String> {
        Ok(self
            .nav
            .driver()
            .text_content(SUBTOTAL)
            .await?
            .unwrap_or_default())
    }

    /// Grand total label
    pub async fn grand_total(&self) -> VitrinaResult<String> {
        Ok(self
            .nav
            .driver()
            .text_content(GRAND_TOTAL)
            .await?
            .unwrap_or_default())
    }

    /// Apply a coupon code
    pub async fn apply_coupon(&self, code: &str) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver.fill(COUPON_INPUT, code).await?;
        driver.click(APPLY_COUPON).await?;
        self.nav.wait_for_page_load().await
    }

    /// Leave the cart and keep shopping
    pub async fn continue_shopping(&self) -> VitrinaResult<()> {
        self.nav.driver().click(CONTINUE_SHOPPING).await?;
        self.nav.wait_for_page_load().await
    }

    // --- minicart overlay ---

    /// Open the minicart overlay; a no-op when already open
    pub async fn open_minicart(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        if driver.is_visible(MINICART).await? {
            return Ok(());
        }
        driver.click(MINICART_TOGGLE).await?;
        driver
            .wait_for(MINICART, ElementState::Visible, OVERLAY_TIMEOUT)
            .await
    }

    /// Whether the minicart overlay is open
    pub async fn is_minicart_open(&self) -> VitrinaResult<bool> {
        self.nav.driver().is_visible(MINICART).await
    }

    /// Item count shown on the minicart badge
    pub async fn minicart_item_count(&self) -> VitrinaResult<usize> {
        let text = self
            .nav
            .driver()
            .text_content(MINICART_COUNTER)
            .await?
            .unwrap_or_default();
        Ok(text.trim().parse().unwrap_or(0))
    }

    /// Subtotal shown in the minicart overlay
    pub async fn minicart_subtotal(&self) -> VitrinaResult<String> {
        self.open_minicart().await?;
        Ok(self
            .nav
            .driver()
            .text_content(MINICART_SUBTOTAL)
            .await?
            .unwrap_or_default())
    }

    /// Wait for the minicart badge to reflect a just-added item: the badge
    /// re-renders asynchronously after the add-to-cart round trip
    pub async fn wait_for_minicart_update(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver
            .wait_for(MINICART_COUNTER, ElementState::Visible, OVERLAY_TIMEOUT)
            .await?;
        StabilityWaiter::new()
            .wait_until_stable(driver.as_ref(), MINICART_COUNTER)
            .await
    }

    /// Jump from the minicart overlay to the full cart page
    pub async fn view_cart_from_minicart(&self) -> VitrinaResult<()> {
        self.open_minicart().await?;
        self.nav.driver().click(MINICART_VIEW_CART).await?;
        self.nav.driver().wait_for_url(CART_URL, URL_TIMEOUT).await?;
        self.nav.wait_for_page_load().await
    }

    // --- checkout hand-off ---

    /// Reach the checkout page, whatever the UI offers.
    ///
    /// The minicart overlay is the fast path but is built as a transient
    /// fragment that may never mount its checkout control; when that
    /// control stays invisible past its bound, fall back to the full cart
    /// page exactly once. The fallback's own failure propagates verbatim;
    /// there is no third route.
    pub async fn proceed_to_checkout(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver().clone();

        self.open_minicart().await?;
        match driver
            .wait_for(
                MINICART_CHECKOUT,
                ElementState::Visible,
                MINICART_CHECKOUT_TIMEOUT,
            )
            .await
        {
            Ok(()) => {
                tracing::debug!("checking out via the minicart overlay");
                driver.click(MINICART_CHECKOUT).await?;
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(
                    error = %err,
                    "minicart checkout control never materialized, falling back to the cart page"
                );
                self.open_cart_page().await?;
                driver
                    .wait_for(CART_CHECKOUT, ElementState::Visible, OVERLAY_TIMEOUT)
                    .await?;
                driver.click(CART_CHECKOUT).await?;
            }
            Err(err) => return Err(err),
        }

        driver.wait_for_url(CHECKOUT_URL, URL_TIMEOUT).await?;
        self.nav.wait_for_page_load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::VitrinaDriver;
    use crate::sim::Storefront;
    use std::sync::Arc;

    async fn cart_with_one_item(store: &Storefront) -> ShoppingCartPage {
        let driver: Arc<dyn VitrinaDriver> = Arc::new(store.clone());
        let nav = Navigator::new(driver, store.base_url());
        let home = crate::pages::HomePage::new(nav.clone());
        let listing = crate::pages::ProductListPage::new(nav.clone());
        let detail = crate::pages::ProductDetailPage::new(nav.clone());
        home.open().await.unwrap();
        home.go_to_men().await.unwrap();
        listing.select_product_by_index(0).await.unwrap();
        detail.add_to_cart_with_defaults().await.unwrap();
        ShoppingCartPage::new(nav)
    }

    #[tokio::test(start_paused = true)]
    async fn minicart_is_the_primary_checkout_route() {
        let store = Storefront::builder().build();
        let cart = cart_with_one_item(&store).await;
        cart.proceed_to_checkout().await.unwrap();
        assert!(store.dispatched("checkout:minicart"));
        assert!(!store.dispatched("checkout:cart"));
    }

    #[tokio::test(start_paused = true)]
    async fn unmountable_minicart_falls_back_to_the_cart_page_once() {
        let store = Storefront::builder().with_flaky_minicart().build();
        let cart = cart_with_one_item(&store).await;
        cart.proceed_to_checkout().await.unwrap();
        assert!(!store.dispatched("checkout:minicart"));
        assert_eq!(store.dispatch_count("checkout:cart"), 1);

        let url = cart.nav.current_url().await.unwrap();
        assert!(url.ends_with("/checkout/"));
    }

    #[tokio::test(start_paused = true)]
    async fn removing_the_only_item_empties_the_cart() {
        let store = Storefront::builder().build();
        let cart = cart_with_one_item(&store).await;
        cart.open_cart_page().await.unwrap();
        assert_eq!(cart.item_count().await.unwrap(), 1);
        assert!(!cart.is_cart_empty().await.unwrap());

        cart.remove_item(0).await.unwrap();
        assert_eq!(cart.item_count().await.unwrap(), 0);
        assert!(cart.is_cart_empty().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn quantity_updates_survive_the_cart_reload() {
        let store = Storefront::builder().build();
        let cart = cart_with_one_item(&store).await;
        cart.open_cart_page().await.unwrap();
        cart.update_quantity(0, 3).await.unwrap();

        let driver = cart.nav.driver();
        let input = format!("{} {}", nth(CART_ITEM, 0), QTY_INPUT);
        assert_eq!(driver.input_value(&input).await.unwrap(), "3");
        assert_eq!(cart.minicart_item_count().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn minicart_surface_reports_contents() {
        let store = Storefront::builder().build();
        let cart = cart_with_one_item(&store).await;
        cart.wait_for_minicart_update().await.unwrap();
        cart.open_minicart().await.unwrap();
        assert!(cart.is_minicart_open().await.unwrap());
        assert_eq!(cart.minicart_item_count().await.unwrap(), 1);
        assert!(!cart.minicart_subtotal().await.unwrap().is_empty());

        cart.view_cart_from_minicart().await.unwrap();
        let url = cart.nav.current_url().await.unwrap();
        assert!(url.ends_with("/checkout/cart/"));
    }
}
