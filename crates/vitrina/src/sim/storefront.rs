//! Scripted storefront over [`SimPage`].
//!
//! Implements the driver trait as a whole shop: routes, a cart, order
//! numbers, a consent banner and the asynchronous behaviors the suite's
//! resilience layer exists for: late-mounting overlays, region lists that
//! repopulate after a delay, grid entries that animate in. Knobs on the
//! builder dial each fragility up or down per test.

use super::{Effect, El, SimPage};
use crate::driver::{
    BoundingBox, ElementState, LoadState, SelectBy, SelectChoice, VitrinaDriver,
};
use crate::page::LOADING_SPINNER;
use crate::pages::{cart as cart_sel, checkout as co, confirmation as conf, home, listing, nth, product};
use crate::result::{VitrinaError, VitrinaResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://demo.vitrina.store";
const CONSENT_SCRIPT_URL: &str = "https://cdn.tenant.example/consent/loader.js";

const MEN_PRODUCTS: &[(&str, f32)] = &[
    ("Cronus Yoga Pant", 48.0),
    ("Caesar Warm-Up Pant", 35.0),
    ("Viktor LumaTech Pant", 46.0),
    ("Geo Insulated Jogging Pant", 51.0),
];
const WOMEN_PRODUCTS: &[(&str, f32)] = &[
    ("Karmen Yoga Jacket", 39.0),
    ("Breathe-Easy Tank", 34.0),
    ("Nora Practice Tank", 39.0),
    ("Maya Tunic", 29.0),
];

const COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("RO", "Romania"),
    ("DE", "Germany"),
];
const US_REGIONS: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("CA", "California"),
    ("IL", "Illinois"),
    ("NY", "New York"),
    ("TX", "Texas"),
];
const RO_REGIONS: &[(&str, &str)] = &[
    ("AB", "Alba"),
    ("BV", "Brasov"),
    ("B", "Bucuresti"),
    ("CJ", "Cluj"),
    ("IS", "Iasi"),
    ("TM", "Timis"),
];

const SHIPPING_METHODS: &[(&str, &str)] = &[
    ("flatrate", "Flat Rate"),
    ("tablerate", "Best Way"),
];
const PAYMENT_METHODS: &[&str] = &["checkmo", "banktransfer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Men,
    Women,
}

impl Category {
    fn products(self) -> &'static [(&'static str, f32)] {
        match self {
            Self::Men => MEN_PRODUCTS,
            Self::Women => WOMEN_PRODUCTS,
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Women => "women",
        }
    }

    fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "men" => Some(Self::Men),
            "women" => Some(Self::Women),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Blank,
    Home,
    Listing(Category),
    Product(Category, usize),
    Cart,
    Checkout,
    Success,
}

#[derive(Debug, Clone)]
struct CartItem {
    name: String,
    price: f32,
    qty: u32,
}

#[derive(Debug)]
struct ShopState {
    base: String,
    route: Route,
    cart: Vec<CartItem>,
    order_seq: u32,
    consent_banner: bool,
    consent_close_only: bool,
    consent_dismissed: bool,
    flaky_minicart: bool,
    minicart_open: bool,
    region_delay: Duration,
    listing_settle_ms: u64,
    current_product: Option<(Category, usize)>,
    dispatched: Vec<String>,
}

/// Builder for a [`Storefront`]
#[derive(Debug, Clone)]
pub struct StorefrontBuilder {
    base: String,
    consent_banner: bool,
    consent_close_only: bool,
    flaky_minicart: bool,
    region_delay_ms: u64,
    listing_settle_ms: u64,
    never_network_idle: bool,
}

impl Default for StorefrontBuilder {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_URL.to_string(),
            consent_banner: false,
            consent_close_only: false,
            flaky_minicart: false,
            region_delay_ms: 300,
            listing_settle_ms: 0,
            never_network_idle: false,
        }
    }
}

impl StorefrontBuilder {
    /// Override the storefront root URL
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Mount a cookie-consent overlay on every navigation until accepted
    pub fn with_consent_banner(mut self) -> Self {
        self.consent_banner = true;
        self
    }

    /// Consent overlay variant without an accept control (close icon only)
    pub fn with_close_only_consent(mut self) -> Self {
        self.consent_banner = true;
        self.consent_close_only = true;
        self
    }

    /// The minicart overlay opens but its checkout control never mounts
    pub fn with_flaky_minicart(mut self) -> Self {
        self.flaky_minicart = true;
        self
    }

    /// Delay before the region control repopulates after a country change
    pub fn with_region_repopulation_delay_ms(mut self, ms: u64) -> Self {
        self.region_delay_ms = ms;
        self
    }

    /// Keep listing-grid entries animating for this long after render
    pub fn with_listing_animation_ms(mut self, ms: u64) -> Self {
        self.listing_settle_ms = ms;
        self
    }

    /// The page keeps background traffic going and never reaches
    /// `networkidle`
    pub fn with_never_network_idle(mut self) -> Self {
        self.never_network_idle = true;
        self
    }

    /// Build the storefront
    pub fn build(self) -> Storefront {
        let page = SimPage::new();
        page.set_never_idle(self.never_network_idle);
        Storefront {
            page,
            shop: Arc::new(Mutex::new(ShopState {
                base: self.base,
                route: Route::Blank,
                cart: Vec::new(),
                order_seq: 0,
                consent_banner: self.consent_banner,
                consent_close_only: self.consent_close_only,
                consent_dismissed: false,
                flaky_minicart: self.flaky_minicart,
                minicart_open: false,
                region_delay: Duration::from_millis(self.region_delay_ms),
                listing_settle_ms: self.listing_settle_ms,
                current_product: None,
                dispatched: Vec::new(),
            })),
        }
    }
}

/// A deterministic shop the suite can drive end to end
#[derive(Clone)]
pub struct Storefront {
    page: SimPage,
    shop: Arc<Mutex<ShopState>>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shop = self.shop.lock();
        f.debug_struct("Storefront")
            .field("route", &shop.route)
            .field("cart_items", &shop.cart.len())
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Start building a storefront
    pub fn builder() -> StorefrontBuilder {
        StorefrontBuilder::default()
    }

    /// The storefront root URL
    pub fn base_url(&self) -> String {
        self.shop.lock().base.clone()
    }

    /// The underlying page, for request/abort assertions
    pub fn page(&self) -> &SimPage {
        &self.page
    }

    /// Whether an action tag was dispatched at least once
    pub fn dispatched(&self, tag: &str) -> bool {
        self.dispatch_count(tag) > 0
    }

    /// How many times an action tag was dispatched
    pub fn dispatch_count(&self, tag: &str) -> usize {
        self.shop.lock().dispatched.iter().filter(|t| *t == tag).count()
    }

    fn url_of(base: &str, route: Route) -> String {
        match route {
            Route::Blank => "about:blank".to_string(),
            Route::Home => format!("{base}/"),
            Route::Listing(cat) => format!("{base}/{}.html", cat.slug()),
            Route::Product(cat, idx) => format!("{base}/product/{}/{idx}", cat.slug()),
            Route::Cart => format!("{base}/checkout/cart/"),
            Route::Checkout => format!("{base}/checkout/"),
            Route::Success => format!("{base}/checkout/onepage/success/"),
        }
    }

    fn route_of(base: &str, url: &str) -> Option<Route> {
        let path = url.strip_prefix(base)?;
        match path {
            "" | "/" => Some(Route::Home),
            "/men.html" => Some(Route::Listing(Category::Men)),
            "/women.html" => Some(Route::Listing(Category::Women)),
            "/checkout/cart/" => Some(Route::Cart),
            "/checkout/" => Some(Route::Checkout),
            "/checkout/onepage/success/" => Some(Route::Success),
            _ => {
                let rest = path.strip_prefix("/product/")?;
                let (slug, idx) = rest.split_once('/')?;
                let cat = Category::from_slug(slug)?;
                let idx: usize = idx.parse().ok()?;
                Some(Route::Product(cat, idx))
            }
        }
    }

    /// Navigate to a route: commit the URL, render the document, arm the
    /// escape handler
    fn goto(&self, route: Route) -> VitrinaResult<()> {
        let url = {
            let mut shop = self.shop.lock();
            shop.minicart_open = false;
            shop.route = route;
            if let Route::Product(cat, idx) = route {
                shop.current_product = Some((cat, idx));
            }
            Self::url_of(&shop.base, route)
        };
        self.page.commit_navigation(&url);
        let elements = self.render();
        self.page.mount(elements);
        self.arm_escape();
        Ok(())
    }

    fn arm_escape(&self) {
        let consent_mounted = {
            let shop = self.shop.lock();
            shop.consent_banner && !shop.consent_dismissed
        };
        if consent_mounted {
            self.page.set_escape_effects(vec![
                Effect::Hide(".fc-consent-root".to_string()),
                Effect::Hide(".fc-button.fc-cta-consent".to_string()),
                Effect::Hide(".fc-button.fc-secondary-button".to_string()),
                Effect::Hide(".fc-close".to_string()),
            ]);
        } else {
            self.page.set_escape_effects(Vec::new());
        }
    }

    // --- rendering ---

    fn render(&self) -> Vec<El> {
        let shop = self.shop.lock();
        let mut els = Vec::new();
        Self::render_chrome(&shop, &mut els);
        match shop.route {
            Route::Blank => {}
            Route::Home => Self::render_home(&mut els),
            Route::Listing(cat) => Self::render_listing(&shop, cat, &mut els),
            Route::Product(cat, idx) => Self::render_product(cat, idx, &mut els),
            Route::Cart => Self::render_cart(&shop, &mut els),
            Route::Checkout => Self::render_checkout(&shop, &mut els),
            Route::Success => Self::render_success(&shop, &mut els),
        }
        drop(shop);
        self.render_consent(&mut els);
        els
    }

    fn render_chrome(shop: &ShopState, els: &mut Vec<El>) {
        let total_qty: u32 = shop.cart.iter().map(|i| i.qty).sum();
        let subtotal: f32 = shop.cart.iter().map(|i| i.price * i.qty as f32).sum();

        els.push(El::new(".page-header").rect(0.0, 0.0, 1920.0, 90.0));
        els.push(El::new(".page-footer"));
        els.push(El::new(LOADING_SPINNER).hidden());
        els.push(El::new(cart_sel::MINICART_TOGGLE).tag("minicart:open"));
        els.push(
            El::new(cart_sel::MINICART_COUNTER)
                .text(total_qty.to_string())
                .rect(1860.0, 20.0, 24.0, 24.0),
        );

        let overlay_open = shop.minicart_open;
        let minicart = El::new(cart_sel::MINICART);
        els.push(if overlay_open { minicart } else { minicart.hidden() });

        let checkout_btn = El::new(cart_sel::MINICART_CHECKOUT).tag("checkout:minicart");
        els.push(if overlay_open && !shop.flaky_minicart {
            checkout_btn
        } else {
            checkout_btn.hidden()
        });

        let subtotal_el = El::new(cart_sel::MINICART_SUBTOTAL).text(format!("${subtotal:.2}"));
        els.push(if overlay_open { subtotal_el } else { subtotal_el.hidden() });

        let view_cart = El::new(cart_sel::MINICART_VIEW_CART).tag("nav:view-cart");
        els.push(if overlay_open { view_cart } else { view_cart.hidden() });
    }

    fn render_home(els: &mut Vec<El>) {
        els.push(El::new(".hero").rect(0.0, 90.0, 1920.0, 500.0));
        els.push(El::new(".navigation"));
        els.push(El::new(home::NAV_MEN).text("Men").tag("nav:men"));
        els.push(El::new(home::NAV_WOMEN).text("Women").tag("nav:women"));
        els.push(El::new(home::SEARCH_BOX));
        els.push(El::new(home::SEARCH_BUTTON).tag("nav:search"));
        els.push(El::new(".home-main .products-grid"));
    }

    fn render_listing(shop: &ShopState, cat: Category, els: &mut Vec<El>) {
        els.push(El::new(".products-grid"));
        els.push(El::new(listing::SORTER).options(&[
            ("position", "Position"),
            ("name", "Product Name"),
            ("price", "Price"),
        ]));
        for (idx, (name, price)) in cat.products().iter().enumerate() {
            els.push(
                El::new(listing::PRODUCT_ITEM).alias(nth(listing::PRODUCT_ITEM, idx)),
            );
            let mut link = El::new(format!(
                "{} {}",
                nth(listing::PRODUCT_ITEM, idx),
                listing::PRODUCT_LINK
            ))
            .alias(listing::PRODUCT_LINK)
            .alias(format!("{}[title*=\"{name}\"]", listing::PRODUCT_LINK))
            .text(*name)
            .tag(format!("product:open:{}:{idx}", cat.slug()))
            .rect(40.0, 200.0 + idx as f32 * 320.0, 280.0, 48.0);
            if shop.listing_settle_ms > 0 {
                link = link.settles_after_ms(shop.listing_settle_ms);
            }
            els.push(link);
            els.push(
                El::new(format!("{} {}", nth(listing::PRODUCT_ITEM, idx), listing::PRICE))
                    .alias(listing::PRICE)
                    .text(format!("${price:.2}")),
            );
        }
    }

    fn render_product(cat: Category, idx: usize, els: &mut Vec<El>) {
        let (name, price) = cat.products()[idx.min(cat.products().len() - 1)];
        els.push(El::new(product::PRODUCT_NAME).text(name));
        els.push(El::new(product::PRODUCT_PRICE).text(format!("${price:.2}")));
        els.push(El::new(product::QTY_INPUT).value("1"));
        for (i, size) in ["S", "M", "L"].iter().enumerate() {
            els.push(
                El::new(product::SIZE_OPTION)
                    .alias(nth(product::SIZE_OPTION, i))
                    .text(*size),
            );
        }
        for (i, color) in ["Blue", "Black"].iter().enumerate() {
            els.push(
                El::new(product::COLOR_OPTION)
                    .alias(nth(product::COLOR_OPTION, i))
                    .alias(format!("{}[aria-label*=\"{color}\"]", product::COLOR_OPTION)),
            );
        }
        els.push(
            El::new(product::ADD_TO_CART)
                .text("Add to Cart")
                .tag("cart:add")
                .rect(600.0, 700.0, 180.0, 50.0),
        );
        els.push(El::new(product::SUCCESS_MESSAGE).hidden());
    }

    fn render_cart(shop: &ShopState, els: &mut Vec<El>) {
        let subtotal: f32 = shop.cart.iter().map(|i| i.price * i.qty as f32).sum();
        for (idx, item) in shop.cart.iter().enumerate() {
            els.push(El::new(cart_sel::CART_ITEM).alias(nth(cart_sel::CART_ITEM, idx)));
            els.push(
                El::new(format!("{} {}", nth(cart_sel::CART_ITEM, idx), cart_sel::ITEM_NAME))
                    .alias(cart_sel::ITEM_NAME)
                    .text(item.name.clone()),
            );
            els.push(
                El::new(format!("{} {}", nth(cart_sel::CART_ITEM, idx), cart_sel::QTY_INPUT))
                    .alias(cart_sel::QTY_INPUT)
                    .value(item.qty.to_string()),
            );
            els.push(
                El::new(format!(
                    "{} {}",
                    nth(cart_sel::CART_ITEM, idx),
                    cart_sel::REMOVE_BUTTON
                ))
                .alias(cart_sel::REMOVE_BUTTON)
                .tag(format!("cart:remove:{idx}")),
            );
        }
        els.push(El::new(cart_sel::UPDATE_CART).tag("cart:update"));
        els.push(El::new(cart_sel::SUBTOTAL).text(format!("${subtotal:.2}")));
        els.push(El::new(cart_sel::GRAND_TOTAL).text(format!("${subtotal:.2}")));

        let checkout = El::new(cart_sel::CART_CHECKOUT)
            .text("Proceed to Checkout")
            .tag("checkout:cart");
        els.push(if shop.cart.is_empty() {
            checkout.hidden()
        } else {
            checkout
        });

        let empty = El::new(cart_sel::EMPTY_CART).text("You have no items in your shopping cart.");
        els.push(if shop.cart.is_empty() { empty } else { empty.hidden() });

        els.push(El::new(cart_sel::COUPON_INPUT));
        els.push(El::new(cart_sel::APPLY_COUPON).tag("cart:coupon"));
        els.push(El::new(cart_sel::CONTINUE_SHOPPING).tag("nav:continue"));
    }

    fn render_checkout(shop: &ShopState, els: &mut Vec<El>) {
        let grand_total: f32 = shop.cart.iter().map(|i| i.price * i.qty as f32).sum();

        for selector in [
            co::EMAIL,
            co::FIRST_NAME,
            co::LAST_NAME,
            co::COMPANY,
            co::STREET,
            co::STREET_LINE2,
            co::CITY,
            co::ZIP_CODE,
            co::PHONE,
        ] {
            els.push(El::new(selector));
        }
        els.push(
            El::new(co::COUNTRY)
                .options(COUNTRIES)
                .value("US")
                .tag("checkout:country"),
        );
        els.push(El::new(co::REGION_SELECT).options(US_REGIONS));
        els.push(El::new(co::REGION_TEXT).hidden());

        els.push(El::new(co::CREATE_ACCOUNT));
        els.push(El::new(co::PASSWORD));
        els.push(El::new(co::CONFIRM_PASSWORD));

        els.push(El::new(co::SHIPPING_METHODS).rect(100.0, 600.0, 700.0, 120.0));
        for (value, label) in SHIPPING_METHODS {
            els.push(
                El::new(co::SHIPPING_RADIO)
                    .alias(format!(".shipping-method input[value=\"{value}\"]"))
                    .text(*label),
            );
        }
        els.push(El::new(co::NEXT_BUTTON).text("Next").tag("checkout:payment"));

        for value in PAYMENT_METHODS {
            els.push(
                El::new(co::PAYMENT_RADIO)
                    .alias(format!(".payment-methods input[value=\"{value}\"]"))
                    .hidden(),
            );
        }
        els.push(
            El::new(co::PLACE_ORDER)
                .text("Place Order")
                .tag("order:place")
                .hidden(),
        );
        els.push(El::new(co::ORDER_SUMMARY_TOTAL).text(format!("${grand_total:.2}")));
    }

    fn render_success(shop: &ShopState, els: &mut Vec<El>) {
        els.push(El::new(".checkout-success"));
        els.push(El::new(conf::THANK_YOU).text("Thank you for your purchase!"));
        els.push(
            El::new(conf::ORDER_NUMBER).text(format!("{:09}", shop.order_seq)),
        );
        els.push(El::new(conf::CONTINUE_SHOPPING).text("Continue Shopping").tag("nav:continue"));
    }

    /// Consent overlay, unless dismissed or its loader request was blocked
    fn render_consent(&self, els: &mut Vec<El>) {
        let (enabled, close_only) = {
            let shop = self.shop.lock();
            (
                shop.consent_banner && !shop.consent_dismissed,
                shop.consent_close_only,
            )
        };
        if !enabled {
            return;
        }
        if !self.page.simulate_request(CONSENT_SCRIPT_URL) {
            tracing::debug!("consent loader request aborted, overlay not mounted");
            return;
        }
        els.push(
            El::new(".fc-consent-root")
                .text("We value your privacy")
                .rect(560.0, 280.0, 800.0, 520.0),
        );
        if close_only {
            els.push(El::new(".fc-close").tag("consent:accept"));
        } else {
            els.push(
                El::new(".fc-button.fc-cta-consent")
                    .text("Consent")
                    .tag("consent:accept"),
            );
            els.push(
                El::new(".fc-button.fc-secondary-button")
                    .text("Manage options")
                    .tag("consent:manage"),
            );
        }
    }

    // --- action dispatch ---

    fn dispatch(&self, tag: &str) -> VitrinaResult<()> {
        tracing::debug!(tag, "storefront action");
        self.shop.lock().dispatched.push(tag.to_string());
        let parts: Vec<&str> = tag.split(':').collect();
        match parts.as_slice() {
            ["nav", "men"] => self.goto(Route::Listing(Category::Men)),
            ["nav", "women"] => self.goto(Route::Listing(Category::Women)),
            ["nav", "search"] => self.goto(Route::Listing(Category::Men)),
            ["nav", "continue"] => self.goto(Route::Listing(Category::Men)),
            ["nav", "view-cart"] => self.goto(Route::Cart),
            ["product", "open", slug, idx] => {
                let cat = Category::from_slug(slug)
                    .ok_or_else(|| VitrinaError::driver("unknown category"))?;
                let idx: usize = idx
                    .parse()
                    .map_err(|_| VitrinaError::driver("bad product index"))?;
                self.goto(Route::Product(cat, idx))
            }
            ["cart", "add"] => self.add_current_product_to_cart(),
            ["cart", "remove", idx] => {
                let idx: usize = idx
                    .parse()
                    .map_err(|_| VitrinaError::driver("bad cart index"))?;
                {
                    let mut shop = self.shop.lock();
                    if idx < shop.cart.len() {
                        shop.cart.remove(idx);
                    }
                }
                self.goto(Route::Cart)
            }
            ["cart", "update"] => self.update_cart_quantities(),
            ["cart", "coupon"] => Ok(()),
            ["minicart", "open"] => self.open_minicart_overlay(),
            ["checkout", "minicart" | "cart"] => self.goto(Route::Checkout),
            ["checkout", "payment"] => self.reveal_payment_step(),
            ["order", "place"] => self.place_order(),
            ["consent", "accept"] => self.accept_consent(),
            ["consent", "manage"] => Ok(()),
            _ => Ok(()),
        }
    }

    fn add_current_product_to_cart(&self) -> VitrinaResult<()> {
        let qty: u32 = self
            .page
            .value_of(product::QTY_INPUT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let (name, total_qty, subtotal) = {
            let mut shop = self.shop.lock();
            let (cat, idx) = shop
                .current_product
                .ok_or_else(|| VitrinaError::driver("not on a product page"))?;
            let (name, price) = cat.products()[idx.min(cat.products().len() - 1)];
            if let Some(item) = shop.cart.iter_mut().find(|i| i.name == name) {
                item.qty += qty;
            } else {
                shop.cart.push(CartItem {
                    name: name.to_string(),
                    price,
                    qty,
                });
            }
            let total: u32 = shop.cart.iter().map(|i| i.qty).sum();
            let subtotal: f32 = shop.cart.iter().map(|i| i.price * i.qty as f32).sum();
            (name.to_string(), total, subtotal)
        };
        self.page.apply(Effect::SetText(
            product::SUCCESS_MESSAGE.to_string(),
            format!("You added {name} to your shopping cart."),
        ));
        self.page.apply(Effect::SetText(
            cart_sel::MINICART_COUNTER.to_string(),
            total_qty.to_string(),
        ));
        self.page.apply(Effect::SetText(
            cart_sel::MINICART_SUBTOTAL.to_string(),
            format!("${subtotal:.2}"),
        ));
        // The success toast lands after the add-to-cart round trip
        self.page.schedule(
            Duration::from_millis(120),
            Effect::Show(product::SUCCESS_MESSAGE.to_string()),
        );
        Ok(())
    }

    fn update_cart_quantities(&self) -> VitrinaResult<()> {
        let len = self.shop.lock().cart.len();
        let mut quantities = Vec::with_capacity(len);
        for idx in 0..len {
            let input = format!("{} {}", nth(cart_sel::CART_ITEM, idx), cart_sel::QTY_INPUT);
            let qty: u32 = self
                .page
                .value_of(&input)
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            quantities.push(qty);
        }
        {
            let mut shop = self.shop.lock();
            for (item, qty) in shop.cart.iter_mut().zip(quantities) {
                item.qty = qty;
            }
            shop.cart.retain(|item| item.qty > 0);
        }
        self.goto(Route::Cart)
    }

    fn open_minicart_overlay(&self) -> VitrinaResult<()> {
        let (already_open, flaky) = {
            let mut shop = self.shop.lock();
            let already = shop.minicart_open;
            shop.minicart_open = true;
            (already, shop.flaky_minicart)
        };
        if already_open {
            return Ok(());
        }
        // The overlay is a transient fragment that mounts a beat after the
        // toggle; its checkout control may never mount at all.
        let delay = Duration::from_millis(80);
        self.page
            .schedule(delay, Effect::Show(cart_sel::MINICART.to_string()));
        self.page
            .schedule(delay, Effect::Show(cart_sel::MINICART_SUBTOTAL.to_string()));
        self.page
            .schedule(delay, Effect::Show(cart_sel::MINICART_VIEW_CART.to_string()));
        if !flaky {
            self.page
                .schedule(delay, Effect::Show(cart_sel::MINICART_CHECKOUT.to_string()));
        }
        Ok(())
    }

    fn reveal_payment_step(&self) -> VitrinaResult<()> {
        let delay = Duration::from_millis(150);
        self.page.apply(Effect::Show(LOADING_SPINNER.to_string()));
        self.page
            .schedule(delay, Effect::Hide(LOADING_SPINNER.to_string()));
        for value in PAYMENT_METHODS {
            self.page.schedule(
                delay,
                Effect::Show(format!(".payment-methods input[value=\"{value}\"]")),
            );
        }
        self.page
            .schedule(delay, Effect::Show(co::PLACE_ORDER.to_string()));
        Ok(())
    }

    fn place_order(&self) -> VitrinaResult<()> {
        {
            let mut shop = self.shop.lock();
            if shop.cart.is_empty() {
                return Err(VitrinaError::driver("cannot place an order with an empty cart"));
            }
            shop.order_seq += 1;
            shop.cart.clear();
        }
        self.goto(Route::Success)
    }

    fn accept_consent(&self) -> VitrinaResult<()> {
        self.shop.lock().consent_dismissed = true;
        let delay = Duration::from_millis(150);
        for selector in [
            ".fc-consent-root",
            ".fc-button.fc-cta-consent",
            ".fc-button.fc-secondary-button",
            ".fc-close",
        ] {
            self.page.schedule(delay, Effect::Hide(selector.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VitrinaDriver for Storefront {
    async fn navigate(&self, url: &str) -> VitrinaResult<()> {
        let base = self.base_url();
        let route = Self::route_of(&base, url).ok_or_else(|| VitrinaError::Navigation {
            url: url.to_string(),
            message: "no such route".to_string(),
        })?;
        self.goto(route)
    }

    async fn current_url(&self) -> VitrinaResult<String> {
        self.page.current_url().await
    }

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> VitrinaResult<()> {
        self.page.wait_for_load(state, timeout).await
    }

    async fn count(&self, selector: &str) -> VitrinaResult<usize> {
        self.page.count(selector).await
    }

    async fn is_visible(&self, selector: &str) -> VitrinaResult<bool> {
        self.page.is_visible(selector).await
    }

    async fn is_enabled(&self, selector: &str) -> VitrinaResult<bool> {
        self.page.is_enabled(selector).await
    }

    async fn text_content(&self, selector: &str) -> VitrinaResult<Option<String>> {
        self.page.text_content(selector).await
    }

    async fn input_value(&self, selector: &str) -> VitrinaResult<String> {
        self.page.input_value(selector).await
    }

    async fn options(&self, selector: &str) -> VitrinaResult<Vec<SelectChoice>> {
        self.page.options(selector).await
    }

    async fn bounding_box(&self, selector: &str) -> VitrinaResult<Option<BoundingBox>> {
        self.page.bounding_box(selector).await
    }

    async fn click(&self, selector: &str) -> VitrinaResult<()> {
        // The generic click enforces actionability and applies any element
        // effects; the tag then drives shop behavior.
        self.page.click(selector).await?;
        if let Some(tag) = self.page.tag_of(selector) {
            self.dispatch(&tag)?;
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> VitrinaResult<()> {
        self.page.fill(selector, text).await
    }

    async fn select_option(&self, selector: &str, by: SelectBy) -> VitrinaResult<String> {
        let resolved = self.page.select_option(selector, by).await?;
        if self.page.tag_of(selector).as_deref() == Some("checkout:country") {
            let delay = self.shop.lock().region_delay;
            match resolved.as_str() {
                "US" => {
                    self.page.schedule(
                        delay,
                        Effect::ReplaceOptions(co::REGION_SELECT.to_string(), choices(US_REGIONS)),
                    );
                    self.page
                        .schedule(delay, Effect::Show(co::REGION_SELECT.to_string()));
                    self.page
                        .schedule(delay, Effect::Hide(co::REGION_TEXT.to_string()));
                }
                "RO" => {
                    self.page.schedule(
                        delay,
                        Effect::ReplaceOptions(co::REGION_SELECT.to_string(), choices(RO_REGIONS)),
                    );
                    self.page.schedule(
                        delay,
                        Effect::SetValue(co::REGION_SELECT.to_string(), String::new()),
                    );
                    self.page
                        .schedule(delay, Effect::Show(co::REGION_SELECT.to_string()));
                    self.page
                        .schedule(delay, Effect::Hide(co::REGION_TEXT.to_string()));
                }
                "DE" => {
                    // Free-text region theme
                    self.page
                        .schedule(delay, Effect::Hide(co::REGION_SELECT.to_string()));
                    self.page
                        .schedule(delay, Effect::Show(co::REGION_TEXT.to_string()));
                }
                _ => {}
            }
        }
        Ok(resolved)
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> VitrinaResult<()> {
        self.page.set_checked(selector, checked).await
    }

    async fn press_key(&self, key: &str) -> VitrinaResult<()> {
        self.page.press_key(key).await
    }

    async fn scroll_into_view(&self, selector: &str) -> VitrinaResult<()> {
        self.page.scroll_into_view(selector).await
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> VitrinaResult<()> {
        self.page.wait_for(selector, state, timeout).await
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> VitrinaResult<()> {
        self.page.wait_for_url(pattern, timeout).await
    }

    async fn block_requests(&self, patterns: &[&str]) -> VitrinaResult<()> {
        self.page.block_requests(patterns).await
    }

    async fn screenshot(&self) -> VitrinaResult<Vec<u8>> {
        self.page.screenshot().await
    }
}

fn choices(pairs: &[(&str, &str)]) -> Vec<SelectChoice> {
    pairs
        .iter()
        .map(|(value, label)| SelectChoice::new(*value, *label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn routes_render_their_documents() {
        let store = Storefront::builder().build();
        let base = store.base_url();
        store.navigate(&format!("{base}/")).await.unwrap();
        assert!(store.is_visible(".hero").await.unwrap());

        store.navigate(&format!("{base}/men.html")).await.unwrap();
        assert_eq!(
            store.count(listing::PRODUCT_ITEM).await.unwrap(),
            MEN_PRODUCTS.len()
        );

        let err = store
            .navigate(&format!("{base}/no/such/page"))
            .await
            .unwrap_err();
        assert!(matches!(err, VitrinaError::Navigation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn consent_overlay_mounts_until_accepted() {
        let store = Storefront::builder().with_consent_banner().build();
        let base = store.base_url();
        store.navigate(&format!("{base}/")).await.unwrap();
        assert!(store.is_visible(".fc-consent-root").await.unwrap());

        store.click(".fc-button.fc-cta-consent").await.unwrap();
        store
            .wait_for(
                ".fc-consent-root",
                ElementState::Hidden,
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        // Accepted consent stays accepted across navigations.
        store.navigate(&format!("{base}/men.html")).await.unwrap();
        assert!(!store.is_visible(".fc-consent-root").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_consent_loader_never_mounts_the_overlay() {
        let store = Storefront::builder().with_consent_banner().build();
        let base = store.base_url();
        store.block_requests(&["**/consent/**"]).await.unwrap();
        store.navigate(&format!("{base}/")).await.unwrap();
        assert!(!store.is_visible(".fc-consent-root").await.unwrap());
        assert_eq!(
            store.page().aborted_requests(),
            vec![CONSENT_SCRIPT_URL.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn orders_get_sequential_numbers() {
        let store = Storefront::builder().build();
        let base = store.base_url();
        store
            .navigate(&format!("{base}/product/men/0"))
            .await
            .unwrap();
        store.click(product::ADD_TO_CART).await.unwrap();
        store.navigate(&format!("{base}/checkout/")).await.unwrap();
        store.click(co::NEXT_BUTTON).await.unwrap();
        store
            .wait_for(co::PLACE_ORDER, ElementState::Visible, Duration::from_secs(1))
            .await
            .unwrap();
        store.click(co::PLACE_ORDER).await.unwrap();

        assert!(store
            .current_url()
            .await
            .unwrap()
            .ends_with("/checkout/onepage/success/"));
        assert_eq!(
            store.text_content(conf::ORDER_NUMBER).await.unwrap().unwrap(),
            "000000001"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_cart_cannot_place_an_order() {
        let store = Storefront::builder().build();
        let base = store.base_url();
        store.navigate(&format!("{base}/checkout/")).await.unwrap();
        store.click(co::NEXT_BUTTON).await.unwrap();
        store
            .wait_for(co::PLACE_ORDER, ElementState::Visible, Duration::from_secs(1))
            .await
            .unwrap();
        let err = store.click(co::PLACE_ORDER).await.unwrap_err();
        assert!(matches!(err, VitrinaError::Driver { .. }));
    }
}
