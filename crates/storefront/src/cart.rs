//! Session cart store.
//!
//! The cart lives in the session until checkout completes. For logged-in
//! buyers it is merged with the backend's copy once at login; afterwards the
//! session remains the working copy and is pushed back on mutation by the
//! cart routes.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use atelier_core::{CartItem, CurrencyCode, Price, ProductId};

use crate::models::session_keys;

/// The buyer's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// All lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Cart subtotal. Mixed currencies cannot happen (one shop currency),
    /// but a malformed line is skipped rather than poisoning the sum.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        let currency = self
            .items
            .first()
            .map_or(CurrencyCode::EUR, |item| item.price.currency_code);

        self.items
            .iter()
            .fold(Price::zero(currency), |total, item| {
                total
                    .checked_add(&item.line_total())
                    .unwrap_or(total)
            })
    }

    /// Add a line. An existing line with the same product and color only
    /// has its quantity raised.
    pub fn add(&mut self, item: CartItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.id == item.id && line.color == item.color)
        {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }
    }

    /// Set a line's quantity. Zero removes the line. Returns whether a line
    /// matched.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(id);
        }
        match self.items.iter_mut().find(|line| &line.id == id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns whether a line matched.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.id != id);
        self.items.len() != before
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Merge the backend's cart copy in after authentication.
    ///
    /// On a product collision the backend line's name/price/image win (it is
    /// the fresher catalog data) and the quantities are summed; backend-only
    /// lines are appended.
    pub fn merge_server(&mut self, server_items: Vec<CartItem>) {
        for server_item in server_items {
            if let Some(local) = self
                .items
                .iter_mut()
                .find(|line| line.id == server_item.id && line.color == server_item.color)
            {
                let local_quantity = local.quantity;
                *local = server_item;
                local.quantity += local_quantity;
            } else {
                self.items.push(server_item);
            }
        }
    }
}

// =============================================================================
// Session Persistence
// =============================================================================

/// Load the cart from the session (empty when none was saved).
pub async fn load(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART_ITEMS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Persist the cart to the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART_ITEMS, cart).await
}

/// Remove the cart from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<Cart>(session_keys::CART_ITEMS).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            id: ProductId::new(id).unwrap(),
            name: format!("Product {id}"),
            price: Price::from_cents(cents, CurrencyCode::EUR),
            quantity,
            image: None,
            color: None,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::default();
        cart.add(item("prod_a", 1000, 1));
        cart.add(item("prod_a", 1000, 2));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.count(), 3);
    }

    #[test]
    fn test_add_distinguishes_colors() {
        let mut cart = Cart::default();
        let mut ivory = item("prod_a", 1000, 1);
        ivory.color = Some("Ivory".to_owned());
        let mut noir = item("prod_a", 1000, 1);
        noir.color = Some("Noir".to_owned());

        cart.add(ivory);
        cart.add(noir);
        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::default();
        cart.add(item("prod_a", 1000, 2));

        assert!(cart.update_quantity(&ProductId::new("prod_a").unwrap(), 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_missing_line() {
        let mut cart = Cart::default();
        assert!(!cart.update_quantity(&ProductId::new("prod_x").unwrap(), 2));
    }

    #[test]
    fn test_subtotal() {
        let mut cart = Cart::default();
        cart.add(item("prod_a", 18900, 2));
        cart.add(item("prod_b", 4950, 1));

        assert_eq!(cart.subtotal().display(), "€427.50");
    }

    #[test]
    fn test_merge_sums_quantities_and_prefers_server_data() {
        let mut cart = Cart::default();
        cart.add(item("prod_a", 1000, 2));

        // Server copy has a fresher price for prod_a and an extra line
        cart.merge_server(vec![item("prod_a", 1200, 1), item("prod_b", 500, 3)]);

        assert_eq!(cart.items().len(), 2);
        let merged = &cart.items()[0];
        assert_eq!(merged.quantity, 3);
        assert_eq!(merged.price, Price::from_cents(1200, CurrencyCode::EUR));
        assert_eq!(cart.items()[1].quantity, 3);
    }
}
