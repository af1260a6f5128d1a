//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{Email, UserId};

/// A storefront account.
///
/// `deleted_at` implements soft deletion: a stamped account cannot log in
/// but remains restorable within the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub email_verified: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is soft-deleted.
    #[must_use]
    pub const fn is_deactivated(&self) -> bool {
        self.deleted_at.is_some()
    }
}
