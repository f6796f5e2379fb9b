//! Generated customer data.
//!
//! Locale-aware pools keep street/city/region/zip combinations coherent, so
//! a generated Romanian customer really lives in a Romanian county the
//! checkout's region select knows about. Emails are unique per call.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address locale for generated customers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    /// United States formats (default)
    #[default]
    UnitedStates,
    /// Romanian formats
    Romania,
}

impl Locale {
    /// Country label as the storefront's country select shows it
    pub const fn country_label(&self) -> &'static str {
        match self {
            Self::UnitedStates => "United States",
            Self::Romania => "Romania",
        }
    }
}

/// Shipping form contents.
///
/// Required fields are plain strings; optional fields are `Option` and a
/// `None` leaves the corresponding control untouched when filling (partial
/// update, not fill-or-clear).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingDetails {
    /// Customer email
    pub email: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Street address, first line
    pub street: String,
    /// City
    pub city: String,
    /// Country, by visible label
    pub country: String,
    /// Company (optional)
    pub company: Option<String>,
    /// Street address, second line (optional)
    pub street_line2: Option<String>,
    /// State/region, by visible label for dropdown themes, verbatim for
    /// free-text themes (optional)
    pub state: Option<String>,
    /// Postal code (optional)
    pub zip_code: Option<String>,
    /// Phone number (optional)
    pub phone: Option<String>,
}

impl ShippingDetails {
    /// Fill every unset field from a generated dataset for the locale.
    /// Fields already present are kept as-is.
    pub fn or_defaults(mut self, locale: Locale) -> Self {
        let defaults = customer(locale);
        if self.email.is_empty() {
            self.email = defaults.email;
        }
        if self.first_name.is_empty() {
            self.first_name = defaults.first_name;
        }
        if self.last_name.is_empty() {
            self.last_name = defaults.last_name;
        }
        if self.street.is_empty() {
            self.street = defaults.street;
        }
        if self.city.is_empty() {
            self.city = defaults.city;
        }
        if self.country.is_empty() {
            self.country = defaults.country;
        }
        self.state = self.state.or(defaults.state);
        self.zip_code = self.zip_code.or(defaults.zip_code);
        self.phone = self.phone.or(defaults.phone);
        self
    }
}

const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Alex", "Sarah", "Michael", "Emma", "David", "Lisa",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Brown", "Davis", "Wilson", "Miller", "Moore", "Taylor",
];
const RO_FIRST_NAMES: &[&str] = &[
    "Andrei", "Ioana", "Razvan", "Elena", "Mihai", "Ana", "Stefan", "Maria",
];
const RO_LAST_NAMES: &[&str] = &[
    "Popescu", "Ionescu", "Hodisan", "Dumitrescu", "Stan", "Munteanu",
];

const US_STREETS: &[&str] = &[
    "123 Main Street",
    "456 Oak Avenue",
    "789 Pine Road",
    "321 Elm Street",
    "654 Maple Drive",
];
// (city, state label, zip) kept aligned
const US_CITIES: &[(&str, &str, &str)] = &[
    ("New York", "New York", "10001"),
    ("Los Angeles", "California", "90210"),
    ("Chicago", "Illinois", "60601"),
    ("Houston", "Texas", "77001"),
    ("Phoenix", "Arizona", "85001"),
];

const RO_STREETS: &[&str] = &[
    "Strada Principala 123",
    "Bulevardul Eroilor 21",
    "Strada Horea 14",
    "Calea Dorobantilor 99",
];
// (city, county label, zip) kept aligned
const RO_CITIES: &[(&str, &str, &str)] = &[
    ("Cluj-Napoca", "Cluj", "400000"),
    ("Timisoara", "Timis", "300000"),
    ("Iasi", "Iasi", "700000"),
    ("Brasov", "Brasov", "500000"),
];

/// Generate a fully-populated customer for the locale
pub fn customer(locale: Locale) -> ShippingDetails {
    let mut rng = rand::thread_rng();
    match locale {
        Locale::UnitedStates => {
            let (city, state, zip) = *US_CITIES.choose(&mut rng).unwrap();
            ShippingDetails {
                email: unique_email(),
                first_name: (*FIRST_NAMES.choose(&mut rng).unwrap()).to_string(),
                last_name: (*LAST_NAMES.choose(&mut rng).unwrap()).to_string(),
                street: (*US_STREETS.choose(&mut rng).unwrap()).to_string(),
                city: city.to_string(),
                country: Locale::UnitedStates.country_label().to_string(),
                company: None,
                street_line2: None,
                state: Some(state.to_string()),
                zip_code: Some(zip.to_string()),
                phone: Some(us_phone(&mut rng)),
            }
        }
        Locale::Romania => {
            let (city, county, zip) = *RO_CITIES.choose(&mut rng).unwrap();
            ShippingDetails {
                email: unique_email(),
                first_name: (*RO_FIRST_NAMES.choose(&mut rng).unwrap()).to_string(),
                last_name: (*RO_LAST_NAMES.choose(&mut rng).unwrap()).to_string(),
                street: (*RO_STREETS.choose(&mut rng).unwrap()).to_string(),
                city: city.to_string(),
                country: Locale::Romania.country_label().to_string(),
                company: None,
                street_line2: None,
                state: Some(county.to_string()),
                zip_code: Some(zip.to_string()),
                phone: Some(ro_phone(&mut rng)),
            }
        }
    }
}

/// Unique throwaway email
pub fn unique_email() -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!("test.user.{}@example.com", &tag[..12])
}

/// Random password suitable for the account-creation checkbox flow
pub fn password() -> String {
    const CHARSET: &[u8] =
        b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}

fn us_phone(rng: &mut impl Rng) -> String {
    const AREA_CODES: &[&str] = &["555", "212", "312", "713"];
    let area = AREA_CODES.choose(rng).unwrap();
    format!("{}{}", area, rng.gen_range(1_000_000..10_000_000u32))
}

fn ro_phone(rng: &mut impl Rng) -> String {
    format!("+407{}", rng.gen_range(10_000_000..100_000_000u32))
}

/// Strip currency formatting and parse a price label like `$48.00`
pub fn parse_price(text: &str) -> Option<f32> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_unique_per_call() {
        let a = unique_email();
        let b = unique_email();
        assert_ne!(a, b);
        assert!(a.ends_with("@example.com"));
    }

    #[test]
    fn romanian_customer_is_coherent() {
        let c = customer(Locale::Romania);
        assert_eq!(c.country, "Romania");
        let state = c.state.as_deref().unwrap();
        let (city, county, zip) = *RO_CITIES
            .iter()
            .find(|(_, s, _)| *s == state)
            .expect("generated county comes from the pool");
        assert_eq!(c.city, city);
        assert_eq!(c.state.as_deref(), Some(county));
        assert_eq!(c.zip_code.as_deref(), Some(zip));
        assert!(c.phone.as_deref().unwrap().starts_with("+407"));
    }

    #[test]
    fn or_defaults_keeps_explicit_fields() {
        let details = ShippingDetails {
            email: "fixed@example.com".to_string(),
            city: "Cluj-Napoca".to_string(),
            state: Some("Cluj".to_string()),
            ..Default::default()
        }
        .or_defaults(Locale::Romania);

        assert_eq!(details.email, "fixed@example.com");
        assert_eq!(details.city, "Cluj-Napoca");
        assert_eq!(details.state.as_deref(), Some("Cluj"));
        assert!(!details.first_name.is_empty());
        assert!(!details.street.is_empty());
        assert_eq!(details.country, "Romania");
    }

    #[test]
    fn price_labels_parse() {
        assert_eq!(parse_price("$48.00"), Some(48.0));
        assert_eq!(parse_price("129,00 lei"), Some(12900.0));
        assert_eq!(parse_price(""), None);
    }
}
