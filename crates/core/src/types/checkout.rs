//! Checkout domain types shared between the storefront service and tests.
//!
//! A made-to-measure order carries two buyer-supplied blocks next to the
//! cart: body measurements and delivery details. Both are accumulated step
//! by step in the checkout flow and validated for completeness before any
//! order is created.

use serde::{Deserialize, Serialize};

use crate::types::id::ProductId;
use crate::types::price::Price;

/// Body measurements for a made-to-measure garment, in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Measurements {
    pub height: u32,
    pub chest: u32,
    pub waist: u32,
    pub hips: u32,
}

impl Measurements {
    /// Names of fields that are missing (zero), in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.height == 0 {
            missing.push("height");
        }
        if self.chest == 0 {
            missing.push("chest");
        }
        if self.waist == 0 {
            missing.push("waist");
        }
        if self.hips == 0 {
            missing.push("hips");
        }
        missing
    }

    /// Whether every measurement is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Delivery details for an order.
///
/// All fields are required before an order may be created; validation
/// reports the missing ones by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub email: String,
    pub phone: String,
}

impl DeliveryDetails {
    /// Names of fields that are empty (after trimming), in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, &str); 7] = [
            ("fullName", &self.full_name),
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
            ("email", &self.email),
            ("phone", &self.phone),
        ];

        fields
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether every delivery field is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// A line in the buyer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Backend product identifier.
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    /// Image delivery URL, when the product has one.
    pub image: Option<String>,
    /// Selected color variant, when the product has one.
    pub color: Option<String>,
}

impl CartItem {
    /// Line total (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::price::CurrencyCode;

    fn measurements() -> Measurements {
        Measurements {
            height: 180,
            chest: 100,
            waist: 80,
            hips: 95,
        }
    }

    fn delivery() -> DeliveryDetails {
        DeliveryDetails {
            full_name: "A B".to_owned(),
            address: "X".to_owned(),
            city: "Y".to_owned(),
            postal_code: "12345".to_owned(),
            country: "DE".to_owned(),
            email: "a@b.com".to_owned(),
            phone: "123".to_owned(),
        }
    }

    #[test]
    fn test_complete_measurements() {
        assert!(measurements().is_complete());
        assert!(measurements().missing_fields().is_empty());
    }

    #[test]
    fn test_missing_measurement_named() {
        let m = Measurements {
            waist: 0,
            ..measurements()
        };
        assert_eq!(m.missing_fields(), vec!["waist"]);
    }

    #[test]
    fn test_complete_delivery() {
        assert!(delivery().is_complete());
    }

    #[test]
    fn test_missing_email_named() {
        let d = DeliveryDetails {
            email: String::new(),
            ..delivery()
        };
        assert_eq!(d.missing_fields(), vec!["email"]);
    }

    #[test]
    fn test_whitespace_is_missing() {
        let d = DeliveryDetails {
            phone: "   ".to_owned(),
            ..delivery()
        };
        assert_eq!(d.missing_fields(), vec!["phone"]);
    }

    #[test]
    fn test_line_total() {
        let item = CartItem {
            id: ProductId::new("prod_silk-wrap-dress").unwrap(),
            name: "Silk Wrap Dress".to_owned(),
            price: Price::from_cents(18900, CurrencyCode::EUR),
            quantity: 2,
            image: None,
            color: Some("Ivory".to_owned()),
        };
        assert_eq!(item.line_total().display(), "€378.00");
    }
}
