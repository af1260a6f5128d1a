//! Status and consent vocabularies.

use serde::{Deserialize, Serialize};

/// Canonical order status as reported by the commerce backend.
///
/// The backend (and, transitively, the payment providers) own this value;
/// the storefront only ever reads it. Unknown values deserialize into
/// [`OrderStatus::Other`] and are treated as non-terminal, so new backend
/// vocabulary can never strand a checkout or trigger a duplicate order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Order created, payment not yet started or still pending.
    PaymentPending,
    /// Provider is waiting for the buyer to act (approve, authenticate).
    PayerActionRequired,
    /// Payment captured and settled.
    Completed,
    /// Payment approved by the provider (treated as terminal success).
    Approved,
    /// Order canceled (by buyer, backend, or provider webhook).
    Canceled,
    /// Order voided by the backend.
    Voided,
    /// Any other in-progress value the backend may report.
    Other(String),
}

impl OrderStatus {
    /// Wire representation (SCREAMING_SNAKE_CASE, matching the backend).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::PayerActionRequired => "PAYER_ACTION_REQUIRED",
            Self::Completed => "COMPLETED",
            Self::Approved => "APPROVED",
            Self::Canceled => "CANCELED",
            Self::Voided => "VOIDED",
            Self::Other(s) => s,
        }
    }

    /// Whether no further provider interaction is expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Approved | Self::Canceled | Self::Voided
        )
    }

    /// Terminal and successful: the buyer paid.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Approved)
    }

    /// Terminal and unsuccessful: the order will never complete.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled | Self::Voided)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PAYMENT_PENDING" => Self::PaymentPending,
            "PAYER_ACTION_REQUIRED" => Self::PayerActionRequired,
            "COMPLETED" => Self::Completed,
            "APPROVED" => Self::Approved,
            "CANCELED" => Self::Canceled,
            "VOIDED" => Self::Voided,
            _ => Self::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cookie consent categories.
///
/// `Necessary` is always granted and cannot be revoked; the other three are
/// buyer choices persisted in the consent cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    Necessary,
    Functional,
    Analytics,
    Targeting,
}

impl ConsentCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 4] = [
        Self::Necessary,
        Self::Functional,
        Self::Analytics,
        Self::Targeting,
    ];

    /// Whether consent for this category is implied and irrevocable.
    #[must_use]
    pub const fn is_always_granted(&self) -> bool {
        matches!(self, Self::Necessary)
    }

    /// Stable identifier used in cookies and events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Necessary => "necessary",
            Self::Functional => "functional",
            Self::Analytics => "analytics",
            Self::Targeting => "targeting",
        }
    }
}

impl std::fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConsentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "necessary" => Ok(Self::Necessary),
            "functional" => Ok(Self::Functional),
            "analytics" => Ok(Self::Analytics),
            "targeting" => Ok(Self::Targeting),
            _ => Err(format!("invalid consent category: {s}")),
        }
    }
}

/// Email verification status for users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailVerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal_classification() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Approved.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Voided.is_terminal());
        assert!(!OrderStatus::PaymentPending.is_terminal());
        assert!(!OrderStatus::PayerActionRequired.is_terminal());
        assert!(!OrderStatus::Other("CHECKOUT_IN_PROGRESS".to_owned()).is_terminal());
    }

    #[test]
    fn test_status_success_vs_canceled() {
        assert!(OrderStatus::Completed.is_success());
        assert!(OrderStatus::Approved.is_success());
        assert!(!OrderStatus::Canceled.is_success());
        assert!(OrderStatus::Canceled.is_canceled());
        assert!(OrderStatus::Voided.is_canceled());
        assert!(!OrderStatus::Approved.is_canceled());
    }

    #[test]
    fn test_status_wire_roundtrip() {
        let status: OrderStatus = serde_json::from_str("\"PAYER_ACTION_REQUIRED\"").unwrap();
        assert_eq!(status, OrderStatus::PayerActionRequired);
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            "\"PAYER_ACTION_REQUIRED\""
        );
    }

    #[test]
    fn test_unknown_status_preserved() {
        let status: OrderStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(status, OrderStatus::Other("SOMETHING_NEW".to_owned()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"SOMETHING_NEW\"");
    }

    #[test]
    fn test_consent_category_parse() {
        assert_eq!(
            "targeting".parse::<ConsentCategory>().unwrap(),
            ConsentCategory::Targeting
        );
        assert!("marketing".parse::<ConsentCategory>().is_err());
        assert!(ConsentCategory::Necessary.is_always_granted());
        assert!(!ConsentCategory::Targeting.is_always_granted());
    }
}
