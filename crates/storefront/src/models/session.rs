//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use serde::{Deserialize, Serialize};

use atelier_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys for authentication and checkout data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the accumulated checkout draft (measurements + delivery).
    pub const ORDER_DRAFT: &str = "order_draft";

    /// Key for the session cart lines.
    pub const CART_ITEMS: &str = "cart_items";

    /// Key for the payment provider chosen at checkout start.
    pub const PAYMENT_PROVIDER: &str = "payment_provider";

    /// Key for third-party script URLs already activated in this session.
    pub const ACTIVATED_SCRIPTS: &str = "activated_scripts";
}
