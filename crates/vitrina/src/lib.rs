//! Vitrina: page-object end-to-end testing for storefront UIs.
//!
//! A storefront's UI is asynchronous in every direction (network latency,
//! animation timing, dynamic DOM insertion) and offers no authoritative
//! "done" signal. Vitrina reconciles "the action is logically complete"
//! with "the DOM has caught up" through observation: bounded waits,
//! bounding-box stability sampling, consent-overlay dismissal cascades and
//! a minicart-or-cart-page checkout fallback.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      VITRINA Architecture                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────┐   ┌────────────────────┐  │
//! │  │ Scenario  │──►│ Page objects     │──►│ VitrinaDriver      │  │
//! │  │ (test)    │   │ + Navigator      │   │  ├─ Storefront sim │  │
//! │  └───────────┘   │ + waits/consent  │   │  └─ CDP (feature)  │  │
//! │                  └──────────────────┘   └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No component caches DOM state; all state lives in the live document and
//! is re-observed on every read. One scenario drives one driver instance;
//! parallel scenarios get independent drivers and share nothing.

#![warn(missing_docs)]

pub mod consent;
pub mod data;
pub mod driver;
pub mod page;
pub mod pages;
pub mod result;
pub mod sim;
pub mod telemetry;
pub mod wait;

#[cfg(feature = "browser")]
pub mod cdp;

pub use consent::{ConsentDismisser, ConsentStrategy};
pub use data::{customer, unique_email, Locale, ShippingDetails};
pub use driver::{
    BoundingBox, DriverConfig, ElementState, LoadState, SelectBy, SelectChoice, VitrinaDriver,
};
pub use page::{Navigator, PageObject};
pub use pages::{
    CheckoutPage, HomePage, OrderConfirmationPage, ProductDetailPage, ProductListPage,
    ShoppingCartPage,
};
pub use result::{VitrinaError, VitrinaResult};
pub use wait::{Retry, StabilityWaiter, WaitOptions};

#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

#[cfg(test)]
mod order_flow_tests {
    use super::*;
    use crate::pages::checkout as checkout_sel;
    use crate::sim::Storefront;
    use std::sync::Arc;

    struct Suite {
        store: Storefront,
        nav: Navigator,
        home: HomePage,
        listing: ProductListPage,
        detail: ProductDetailPage,
        cart: ShoppingCartPage,
        checkout: CheckoutPage,
        confirmation: OrderConfirmationPage,
    }

    fn suite(store: Storefront) -> Suite {
        let driver: Arc<dyn VitrinaDriver> = Arc::new(store.clone());
        let nav = Navigator::new(driver, store.base_url());
        Suite {
            store,
            home: HomePage::new(nav.clone()),
            listing: ProductListPage::new(nav.clone()),
            detail: ProductDetailPage::new(nav.clone()),
            cart: ShoppingCartPage::new(nav.clone()),
            checkout: CheckoutPage::new(nav.clone()),
            confirmation: OrderConfirmationPage::new(nav.clone()),
            nav,
        }
    }

    async fn add_product(s: &Suite, category: &str, index: usize) {
        s.home.open().await.unwrap();
        match category {
            "men" => s.home.go_to_men().await.unwrap(),
            _ => s.home.go_to_women().await.unwrap(),
        }
        s.listing.select_product_by_index(index).await.unwrap();
        s.detail.add_to_cart_with_defaults().await.unwrap();
    }

    async fn complete_checkout(s: &Suite) {
        s.checkout.select_shipping_method(None).await.unwrap();
        s.checkout.proceed_to_payment().await.unwrap();
        s.checkout.select_payment_method(None).await.unwrap();
        s.checkout.place_order().await.unwrap();
        s.confirmation.wait_for_confirmation().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn single_item_order_with_romanian_address() {
        let store = Storefront::builder()
            .with_consent_banner()
            .with_listing_animation_ms(300)
            .build();
        let s = suite(store);

        s.home.open().await.unwrap();
        let dismissed = ConsentDismisser::new(s.nav.driver().clone()).dismiss().await;
        assert!(dismissed);

        s.home.go_to_men().await.unwrap();
        s.listing.select_product_by_index(0).await.unwrap();
        s.detail.add_to_cart_with_defaults().await.unwrap();

        s.cart.wait_for_minicart_update().await.unwrap();
        assert_eq!(s.cart.minicart_item_count().await.unwrap(), 1);

        s.cart.proceed_to_checkout().await.unwrap();
        s.checkout
            .fill_shipping_address(&ShippingDetails {
                email: unique_email(),
                first_name: "Razvan".to_string(),
                last_name: "Hodisan".to_string(),
                street: "Strada Principala 123".to_string(),
                city: "Cluj-Napoca".to_string(),
                country: "Romania".to_string(),
                state: Some("Cluj".to_string()),
                zip_code: Some("400000".to_string()),
                phone: Some("+40722123456".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let driver = s.nav.driver();
        assert_eq!(
            driver.input_value(checkout_sel::COUNTRY).await.unwrap(),
            "RO"
        );
        assert_eq!(
            driver.input_value(checkout_sel::REGION_SELECT).await.unwrap(),
            "CJ"
        );

        complete_checkout(&s).await;

        let order_number = s.confirmation.order_number().await.unwrap();
        assert!(!order_number.is_empty());
        assert!(order_number.chars().all(|c| c.is_ascii_digit()));
        let message = s.confirmation.thank_you_message().await.unwrap();
        assert!(message.contains("Thank you for your purchase!"));
        assert!(s.confirmation.is_order_confirmed().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn three_items_across_two_categories_check_out() {
        let store = Storefront::builder().build();
        let s = suite(store);

        add_product(&s, "men", 0).await;
        add_product(&s, "men", 1).await;
        add_product(&s, "women", 0).await;

        s.cart.open_cart_page().await.unwrap();
        assert_eq!(s.cart.item_count().await.unwrap(), 3);
        assert!(!s.cart.grand_total().await.unwrap().is_empty());

        s.cart.proceed_to_checkout().await.unwrap();
        s.checkout
            .fill_romanian_address(ShippingDetails::default())
            .await
            .unwrap();
        s.checkout
            .enable_create_account(true, Some(&crate::data::password()))
            .await
            .unwrap();
        complete_checkout(&s).await;

        assert!(!s.confirmation.order_number().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hostile_storefront_still_checks_out() {
        // Everything flaky at once: consent overlay, a minicart whose
        // checkout control never mounts, a page that never reaches network
        // idle, and animated grid entries.
        crate::telemetry::init_with_default("warn");
        let store = Storefront::builder()
            .with_consent_banner()
            .with_flaky_minicart()
            .with_never_network_idle()
            .with_listing_animation_ms(400)
            .build();
        let s = suite(store);

        s.home.open().await.unwrap();
        ConsentDismisser::new(s.nav.driver().clone()).dismiss().await;

        s.home.go_to_men().await.unwrap();
        s.listing.select_product_by_index(2).await.unwrap();
        s.detail.add_to_cart_with_defaults().await.unwrap();

        s.cart.proceed_to_checkout().await.unwrap();
        assert_eq!(s.store.dispatch_count("checkout:cart"), 1);

        s.checkout
            .fill_shipping_defaults(Locale::Romania)
            .await
            .unwrap();
        complete_checkout(&s).await;

        assert!(!s.confirmation.order_number().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_consent_requests_keeps_the_overlay_out() {
        let store = Storefront::builder().with_consent_banner().build();
        let s = suite(store);

        let consent = ConsentDismisser::new(s.nav.driver().clone());
        consent.apply(ConsentStrategy::BlockRequests).await.unwrap();

        s.home.open().await.unwrap();
        assert!(!s.nav.driver().is_visible(".fc-consent-root").await.unwrap());
        // With the loader aborted there is nothing to dismiss.
        assert!(!consent.dismiss().await);
        assert!(!s.store.page().aborted_requests().is_empty());
    }
}
