//! Checkout page: the multi-step shipping form protocol.
//!
//! The form is stateful in an awkward way: picking a country makes the
//! storefront repopulate the region control over an asynchronous side
//! channel, and some countries swap the region dropdown for a free-text
//! input altogether. The protocol here sequences those dependencies and
//! observes the repopulation instead of sleeping through it.

use crate::data::{customer, Locale, ShippingDetails};
use crate::driver::{ElementState, SelectBy, VitrinaDriver};
use crate::page::{Navigator, PageObject};
use crate::result::{VitrinaError, VitrinaResult};
use crate::wait::{wait_until, StabilityWaiter, WaitOptions};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const EMAIL: &str = "#customer-email";
pub(crate) const FIRST_NAME: &str = "input[name=\"firstname\"]";
pub(crate) const LAST_NAME: &str = "input[name=\"lastname\"]";
pub(crate) const COMPANY: &str = "input[name=\"company\"]";
pub(crate) const STREET: &str = "input[name=\"street[0]\"]";
pub(crate) const STREET_LINE2: &str = "input[name=\"street[1]\"]";
pub(crate) const CITY: &str = "input[name=\"city\"]";
pub(crate) const COUNTRY: &str = "select[name=\"country_id\"]";
pub(crate) const REGION_SELECT: &str = "select[name=\"region_id\"]";
pub(crate) const REGION_TEXT: &str = "input[name=\"region\"]";
pub(crate) const ZIP_CODE: &str = "input[name=\"postcode\"]";
pub(crate) const PHONE: &str = "input[name=\"telephone\"]";

pub(crate) const SHIPPING_METHODS: &str = ".shipping-method";
pub(crate) const SHIPPING_RADIO: &str = ".shipping-method input[type=\"radio\"]";
pub(crate) const NEXT_BUTTON: &str = ".continue";
pub(crate) const PAYMENT_RADIO: &str = ".payment-methods input[type=\"radio\"]";
pub(crate) const PLACE_ORDER: &str = ".action.primary.checkout";
pub(crate) const ORDER_SUMMARY_TOTAL: &str = ".opc-summary-wrapper .grand.totals .price";
pub(crate) const CREATE_ACCOUNT: &str = "#create_account";
pub(crate) const PASSWORD: &str = "#customer-password";
pub(crate) const CONFIRM_PASSWORD: &str = "#password-confirmation";

/// Bound for a required field to become actionable
const FIELD_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound for the region control to visibly repopulate after a country
/// change. The repopulation has no completion signal of its own; polling
/// the option set replaces the fixed settle sleep this bound descends from.
const REGION_SETTLE_TIMEOUT_MS: u64 = 1_500;
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Checkout page object
#[derive(Debug, Clone)]
pub struct CheckoutPage {
    nav: Navigator,
}

impl PageObject for CheckoutPage {
    fn url_pattern(&self) -> &str {
        "**/checkout/"
    }

    fn name(&self) -> &'static str {
        "checkout"
    }
}

impl CheckoutPage {
    /// Create the page object
    pub fn new(nav: Navigator) -> Self {
        Self { nav }
    }

    /// Wait until the shipping form is actionable
    pub async fn wait_for_shipping_form_ready(&self) -> VitrinaResult<()> {
        self.nav
            .driver()
            .wait_for(EMAIL, ElementState::Visible, FIELD_TIMEOUT)
            .await
            .map_err(|err| field_not_found("email", EMAIL, &err))?;
        self.nav.wait_for_spinner_hidden(STEP_TIMEOUT).await
    }

    /// Fill the shipping address.
    ///
    /// Partial-update semantics: optional fields absent from `details` are
    /// left at whatever the form currently holds, never cleared. Country is
    /// selected by visible label; the region is only touched after the
    /// country-driven repopulation has been observed (or its bound spent).
    pub async fn fill_shipping_address(&self, details: &ShippingDetails) -> VitrinaResult<()> {
        self.wait_for_shipping_form_ready().await?;

        self.fill_field("email", EMAIL, &details.email).await?;
        self.fill_field("first name", FIRST_NAME, &details.first_name)
            .await?;
        self.fill_field("last name", LAST_NAME, &details.last_name)
            .await?;
        if let Some(company) = &details.company {
            self.fill_field("company", COMPANY, company).await?;
        }
        self.fill_field("street", STREET, &details.street).await?;
        if let Some(line2) = &details.street_line2 {
            self.fill_field("street line 2", STREET_LINE2, line2).await?;
        }
        self.fill_field("city", CITY, &details.city).await?;

        self.select_country(&details.country).await?;
        if let Some(state) = &details.state {
            self.select_region(state).await?;
        }

        if let Some(zip) = &details.zip_code {
            self.fill_field("zip code", ZIP_CODE, zip).await?;
        }
        if let Some(phone) = &details.phone {
            self.fill_field("phone", PHONE, phone).await?;
        }
        Ok(())
    }

    /// Fill the shipping address entirely from generated data
    pub async fn fill_shipping_defaults(&self, locale: Locale) -> VitrinaResult<()> {
        self.fill_shipping_address(&customer(locale)).await
    }

    /// Romanian checkout: country is pinned, every unset field is derived
    /// from generated Romanian data, and the state stays overridable
    pub async fn fill_romanian_address(&self, overrides: ShippingDetails) -> VitrinaResult<()> {
        let mut details = overrides.or_defaults(Locale::Romania);
        details.country = Locale::Romania.country_label().to_string();
        self.fill_shipping_address(&details).await
    }

    /// Select the country by visible label, then watch the dependent region
    /// control repopulate.
    ///
    /// Returns the resolved country value. The repopulation poll accepts
    /// either a changed option set or the free-text region input appearing;
    /// spending the whole bound is logged but not fatal; a stale region
    /// list then surfaces as `InvalidOption` on the state selection, never
    /// as a silently wrong region.
    pub async fn select_country(&self, label: &str) -> VitrinaResult<String> {
        let driver = self.nav.driver();
        driver
            .wait_for(COUNTRY, ElementState::Visible, FIELD_TIMEOUT)
            .await
            .map_err(|err| field_not_found("country", COUNTRY, &err))?;

        let previous = driver.input_value(COUNTRY).await.unwrap_or_default();
        let options_before = driver.options(REGION_SELECT).await.unwrap_or_default();
        let resolved = driver
            .select_option(COUNTRY, SelectBy::label(label))
            .await?;
        tracing::debug!(country = label, value = %resolved, "country selected");
        if resolved == previous {
            // Same country, nothing will repopulate
            return Ok(resolved);
        }

        let poll = WaitOptions::new()
            .with_timeout(REGION_SETTLE_TIMEOUT_MS)
            .with_poll_interval(100);
        let probe_driver: Arc<dyn VitrinaDriver> = driver.clone();
        let settled = wait_until("region control to repopulate", &poll, move || {
            let driver = probe_driver.clone();
            let before = options_before.clone();
            async move {
                if driver.is_visible(REGION_TEXT).await.unwrap_or(false) {
                    return Ok(true);
                }
                let now = driver.options(REGION_SELECT).await.unwrap_or_default();
                Ok(!now.is_empty() && now != before)
            }
        })
        .await;
        match settled {
            Ok(_) => {}
            Err(err) if err.is_timeout() => {
                tracing::warn!(country = label, "region control did not visibly repopulate");
            }
            Err(err) => return Err(err),
        }
        Ok(resolved)
    }

    /// Select the state/region, against whichever control the storefront
    /// rendered for the chosen country: dropdown themes get a label
    /// selection, free-text themes get the value typed in.
    ///
    /// Returns the resolved region value (the region code for dropdowns).
    pub async fn select_region(&self, region: &str) -> VitrinaResult<String> {
        let driver = self.nav.driver();
        if driver.is_visible(REGION_SELECT).await.unwrap_or(false) {
            driver
                .select_option(REGION_SELECT, SelectBy::label(region))
                .await
        } else if driver.is_visible(REGION_TEXT).await.unwrap_or(false) {
            driver.fill(REGION_TEXT, region).await?;
            Ok(region.to_string())
        } else {
            Err(VitrinaError::FieldNotFound {
                field: "state".to_string(),
                selector: REGION_SELECT.to_string(),
            })
        }
    }

    /// Pick a shipping method; `None` takes the first one offered.
    ///
    /// The method list re-sorts itself while rates stream in, so the
    /// section must hold still before anything is clicked.
    pub async fn select_shipping_method(&self, method: Option<&str>) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        StabilityWaiter::new()
            .wait_until_stable(driver.as_ref(), SHIPPING_METHODS)
            .await?;
        match method {
            Some(name) => {
                let radio = format!(".shipping-method input[value=\"{name}\"]");
                driver
                    .wait_for(&radio, ElementState::Visible, STEP_TIMEOUT)
                    .await?;
                driver.set_checked(&radio, true).await?;
            }
            None => {
                if driver.count(SHIPPING_RADIO).await? == 0 {
                    tracing::warn!("no shipping methods offered, continuing");
                    return Ok(());
                }
                driver.set_checked(SHIPPING_RADIO, true).await?;
            }
        }
        self.nav.wait_for_spinner_hidden(STEP_TIMEOUT).await
    }

    /// Advance from the shipping step to the payment step
    pub async fn proceed_to_payment(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver.click(NEXT_BUTTON).await?;
        self.nav.wait_for_spinner_hidden(STEP_TIMEOUT).await?;
        driver
            .wait_for(PAYMENT_RADIO, ElementState::Visible, STEP_TIMEOUT)
            .await
    }

    /// Pick a payment method; `None` takes the first one offered
    pub async fn select_payment_method(&self, method: Option<&str>) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        match method {
            Some(name) => {
                let radio = format!(".payment-methods input[value=\"{name}\"]");
                driver.set_checked(&radio, true).await?;
            }
            None => {
                if driver.count(PAYMENT_RADIO).await? == 0 {
                    tracing::warn!("no payment methods offered, continuing");
                    return Ok(());
                }
                driver.set_checked(PAYMENT_RADIO, true).await?;
            }
        }
        Ok(())
    }

    /// Opt into account creation during checkout
    pub async fn enable_create_account(
        &self,
        enabled: bool,
        password: Option<&str>,
    ) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver.set_checked(CREATE_ACCOUNT, enabled).await?;
        if enabled {
            if let Some(password) = password {
                driver.fill(PASSWORD, password).await?;
                driver.fill(CONFIRM_PASSWORD, password).await?;
            }
        }
        Ok(())
    }

    /// Grand total shown in the order summary
    pub async fn order_summary_total(&self) -> VitrinaResult<String> {
        Ok(self
            .nav
            .driver()
            .text_content(ORDER_SUMMARY_TOTAL)
            .await?
            .unwrap_or_default())
    }

    /// Whether the place-order control is enabled
    pub async fn is_place_order_enabled(&self) -> VitrinaResult<bool> {
        self.nav.driver().is_enabled(PLACE_ORDER).await
    }

    /// Place the order and wait out the resulting navigation
    pub async fn place_order(&self) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver
            .wait_for(PLACE_ORDER, ElementState::Visible, STEP_TIMEOUT)
            .await?;
        driver.click(PLACE_ORDER).await?;
        self.nav.wait_for_page_load().await
    }

    async fn fill_field(
        &self,
        field: &'static str,
        selector: &str,
        value: &str,
    ) -> VitrinaResult<()> {
        let driver = self.nav.driver();
        driver
            .wait_for(selector, ElementState::Visible, FIELD_TIMEOUT)
            .await
            .map_err(|err| field_not_found(field, selector, &err))?;
        driver
            .fill(selector, value)
            .await
            .map_err(|err| field_not_found(field, selector, &err))
    }
}

/// A required locator that never became actionable is a structural
/// mismatch, not a timing problem: map it to the structural error.
fn field_not_found(field: &str, selector: &str, err: &VitrinaError) -> VitrinaError {
    tracing::debug!(field, selector, error = %err, "field never became actionable");
    VitrinaError::FieldNotFound {
        field: field.to_string(),
        selector: selector.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Storefront;

    async fn checkout_page(store: &Storefront) -> CheckoutPage {
        let driver: Arc<dyn VitrinaDriver> = Arc::new(store.clone());
        let nav = Navigator::new(driver.clone(), store.base_url());
        driver
            .navigate(&format!("{}/checkout/", store.base_url()))
            .await
            .unwrap();
        CheckoutPage::new(nav)
    }

    fn romanian_customer() -> ShippingDetails {
        ShippingDetails {
            email: "razvan.test@example.com".to_string(),
            first_name: "Razvan".to_string(),
            last_name: "Hodisan".to_string(),
            street: "Strada Principala 123".to_string(),
            city: "Cluj-Napoca".to_string(),
            country: "Romania".to_string(),
            state: Some("Cluj".to_string()),
            zip_code: Some("400000".to_string()),
            phone: Some("+40722123456".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cluj_resolves_to_its_region_code() {
        let store = Storefront::builder().build();
        let page = checkout_page(&store).await;
        page.fill_shipping_address(&romanian_customer()).await.unwrap();

        let driver = page.nav.driver();
        assert_eq!(driver.input_value(COUNTRY).await.unwrap(), "RO");
        assert_eq!(driver.input_value(REGION_SELECT).await.unwrap(), "CJ");
        assert_eq!(driver.input_value(EMAIL).await.unwrap(), "razvan.test@example.com");
        assert_eq!(driver.input_value(CITY).await.unwrap(), "Cluj-Napoca");
    }

    #[tokio::test(start_paused = true)]
    async fn state_before_repopulation_is_rejected_not_misselected() {
        let store = Storefront::builder().with_region_repopulation_delay_ms(800).build();
        let page = checkout_page(&store).await;
        page.wait_for_shipping_form_ready().await.unwrap();

        let driver = page.nav.driver();
        driver
            .select_option(COUNTRY, SelectBy::label("Romania"))
            .await
            .unwrap();
        // The region list still holds the previous country's options.
        let err = driver
            .select_option(REGION_SELECT, SelectBy::label("Cluj"))
            .await
            .unwrap_err();
        assert!(matches!(err, VitrinaError::InvalidOption { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn optional_fields_absent_from_data_are_left_alone() {
        let store = Storefront::builder().build();
        let page = checkout_page(&store).await;
        let driver = page.nav.driver().clone();

        // The form arrives with a company already present (autofill, a
        // previous attempt); a required-only fill must not clear it.
        driver.fill(COMPANY, "Preexisting LLC").await.unwrap();
        driver.fill(ZIP_CODE, "99999").await.unwrap();

        let details = ShippingDetails {
            email: "only.required@example.com".to_string(),
            first_name: "Only".to_string(),
            last_name: "Required".to_string(),
            street: "1 Short Form".to_string(),
            city: "Phoenix".to_string(),
            country: "United States".to_string(),
            ..Default::default()
        };
        page.fill_shipping_address(&details).await.unwrap();

        assert_eq!(driver.input_value(COMPANY).await.unwrap(), "Preexisting LLC");
        assert_eq!(driver.input_value(ZIP_CODE).await.unwrap(), "99999");
    }

    #[tokio::test(start_paused = true)]
    async fn free_text_region_countries_are_detected() {
        let store = Storefront::builder().build();
        let page = checkout_page(&store).await;
        page.wait_for_shipping_form_ready().await.unwrap();

        page.select_country("Germany").await.unwrap();
        let value = page.select_region("Bavaria").await.unwrap();
        assert_eq!(value, "Bavaria");
        assert_eq!(
            page.nav.driver().input_value(REGION_TEXT).await.unwrap(),
            "Bavaria"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_country_label_is_invalid_option() {
        let store = Storefront::builder().build();
        let page = checkout_page(&store).await;
        page.wait_for_shipping_form_ready().await.unwrap();
        let err = page.select_country("Atlantis").await.unwrap_err();
        assert!(matches!(err, VitrinaError::InvalidOption { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_page_surfaces_field_not_found() {
        let store = Storefront::builder().build();
        let driver: Arc<dyn VitrinaDriver> = Arc::new(store.clone());
        let nav = Navigator::new(driver.clone(), store.base_url());
        // Still on the home page, no shipping form anywhere.
        driver.navigate(&format!("{}/", store.base_url())).await.unwrap();
        let page = CheckoutPage::new(nav);
        let err = page
            .fill_shipping_address(&romanian_customer())
            .await
            .unwrap_err();
        assert!(matches!(err, VitrinaError::FieldNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn romanian_checkout_pins_country_and_keeps_state_override() {
        let store = Storefront::builder().build();
        let page = checkout_page(&store).await;
        page.fill_romanian_address(ShippingDetails {
            state: Some("Timis".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        let driver = page.nav.driver();
        assert_eq!(driver.input_value(COUNTRY).await.unwrap(), "RO");
        assert_eq!(driver.input_value(REGION_SELECT).await.unwrap(), "TM");
    }
}
