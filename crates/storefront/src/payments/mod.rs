//! Payment provider adapter.
//!
//! # Architecture
//!
//! - The commerce backend owns orders; this module only brokers between the
//!   checkout flow, the backend's payments API, and the provider SDKs.
//! - One provider is selected per checkout ([`ProviderKind`]); all three
//!   share the same three-operation contract (create, capture, cancel)
//!   through [`PaymentGateway`].
//! - `create_order` is idempotent against the pending-order tracker: a
//!   tracked non-terminal order is reused without a network call, and a
//!   token set concurrently while a live create was in flight wins over the
//!   freshly created id.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_storefront::payments::{BackendClient, PaymentGateway, ProviderKind};
//!
//! let backend = BackendClient::new(&config.backend)?;
//! let gateway = PaymentGateway::new(&backend, ProviderKind::PayPal);
//!
//! let outcome = gateway.create_order(&store, &cart, &measurements, &delivery).await?;
//! // ... buyer approves in the provider UI ...
//! let capture = gateway.capture(outcome.order_id()).await?;
//! ```

mod client;
pub mod types;

pub use client::BackendClient;
pub use types::{
    CancellationNote, CaptureResponse, CreateOrderRequest, CreateOrderResponse, InteractionCheck,
    OrderRecord,
};

use thiserror::Error;
use tracing::{instrument, warn};

use atelier_core::{
    CartItem, ConsentCategory, DeliveryDetails, Measurements, OrderId, OrderStatus,
};

use crate::checkout::resume::{PendingStore, ResumeToken};
use crate::config::ProviderConfig;
use crate::error::ValidationError;

/// Errors that can occur when interacting with the backend payments API.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// Errors from gateway operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Inputs were incomplete; no network call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend call failed; the operation is retryable and the tracker
    /// is untouched.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The payments API surface of the commerce backend.
///
/// `BackendClient` is the production implementation; tests substitute stubs
/// to exercise the gateway without a network.
pub trait PaymentsApi {
    /// `POST /api/payments` - create a provisional order.
    fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> impl Future<Output = Result<OrderId, BackendError>> + Send;

    /// `POST /api/payments/:id/capture` - finalize an approved payment.
    fn capture_order(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<CaptureResponse, BackendError>> + Send;

    /// `GET /api/payments/:id` - authoritative order record.
    fn get_order(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<OrderRecord, BackendError>> + Send;

    /// `POST /api/payments/:id/check-interaction`.
    fn check_interaction(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<InteractionCheck, BackendError>> + Send;

    /// `POST /api/payments/:id/update-canceled` - record a cancellation.
    fn note_cancellation(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

// =============================================================================
// Provider Selection
// =============================================================================

/// The payment provider selected at checkout start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    PayPal,
    Stripe,
    Mollie,
}

impl ProviderKind {
    /// All providers, in display order.
    pub const ALL: [Self; 3] = [Self::PayPal, Self::Stripe, Self::Mollie];

    /// Stable identifier used in session state and URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PayPal => "paypal",
            Self::Stripe => "stripe",
            Self::Mollie => "mollie",
        }
    }

    /// Consent category the provider's SDK falls under.
    ///
    /// All three SDKs set third-party cookies, so they are gated behind the
    /// targeting category.
    #[must_use]
    pub const fn consent_category(&self) -> ConsentCategory {
        ConsentCategory::Targeting
    }

    /// SDK script URL for the provider, when it is configured.
    ///
    /// `None` means the provider has no credentials configured and is not
    /// offered at checkout.
    #[must_use]
    pub fn sdk_script_url(&self, config: &ProviderConfig) -> Option<String> {
        match self {
            Self::PayPal => config.paypal_client_id.as_ref().map(|client_id| {
                format!("https://www.paypal.com/sdk/js?client-id={client_id}&currency=EUR")
            }),
            Self::Stripe => config
                .stripe_publishable_key
                .as_ref()
                .map(|_| "https://js.stripe.com/v3/".to_string()),
            Self::Mollie => config
                .mollie_profile_id
                .as_ref()
                .map(|_| "https://js.mollie.com/v1/mollie.js".to_string()),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paypal" => Ok(Self::PayPal),
            "stripe" => Ok(Self::Stripe),
            "mollie" => Ok(Self::Mollie),
            _ => Err(format!("unknown payment provider: {s}")),
        }
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Result of a create call: the order to proceed with and whether it was
/// reused from the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    order_id: OrderId,
    reused: bool,
}

impl CreateOutcome {
    /// The order id the checkout should proceed with.
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Whether an already-tracked order was reused instead of creating one.
    #[must_use]
    pub const fn reused(&self) -> bool {
        self.reused
    }
}

/// Where the buyer is sent after a provider-side cancel.
///
/// Cancellation never loses context: the redirect is keyed by the order id
/// and the tracker still holds the token for a later resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRedirect {
    pub location: String,
}

/// Uniform three-operation payment adapter over one provider.
pub struct PaymentGateway<'a, B> {
    backend: &'a B,
    provider: ProviderKind,
}

impl<'a, B: PaymentsApi> PaymentGateway<'a, B> {
    /// Bind a gateway to a backend and a provider.
    #[must_use]
    pub const fn new(backend: &'a B, provider: ProviderKind) -> Self {
        Self { backend, provider }
    }

    /// The provider this gateway is bound to.
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Create an order, or reuse the tracked one.
    ///
    /// The tracker is consulted twice: before the network call (a tracked
    /// order short-circuits creation entirely) and after it resolves (a
    /// token set by a concurrent submit wins over the fresh id, whose
    /// duplicate is voided best-effort).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] naming every missing field when
    /// the cart is empty or measurements/delivery are incomplete - no
    /// network call is made in that case. Returns [`PaymentError::Backend`]
    /// when the create call fails; the buyer may simply retry.
    #[instrument(skip(self, store, cart, measurements, delivery), fields(provider = %self.provider))]
    pub async fn create_order<S: PendingStore>(
        &self,
        store: &S,
        cart: &[CartItem],
        measurements: &Measurements,
        delivery: &DeliveryDetails,
    ) -> Result<CreateOutcome, PaymentError> {
        validate_order_inputs(cart, measurements, delivery)?;

        if let Some(token) = store.get() {
            return Ok(CreateOutcome {
                order_id: token.into_order_id(),
                reused: true,
            });
        }

        let request = CreateOrderRequest {
            cart: cart.to_vec(),
            measurements: *measurements,
            delivery_details: delivery.clone(),
        };
        let order_id = self.backend.create_order(&request).await?;

        // A concurrent submit may have tracked an order while ours was in
        // flight; the tracked one wins and our duplicate is abandoned.
        if let Some(existing) = store.get()
            && existing.order_id() != &order_id
        {
            warn!(
                duplicate = %order_id,
                tracked = %existing.order_id(),
                "concurrent create raced; reusing tracked order"
            );
            if let Err(e) = self
                .backend
                .note_cancellation(&order_id, "superseded by concurrently tracked order")
                .await
            {
                warn!(order_id = %order_id, error = %e, "failed to void duplicate order");
            }
            return Ok(CreateOutcome {
                order_id: existing.into_order_id(),
                reused: true,
            });
        }

        store.set(ResumeToken::new(order_id.clone()));
        Ok(CreateOutcome {
            order_id,
            reused: false,
        })
    }

    /// Capture an approved payment and report the canonical status.
    ///
    /// Invoked only after the provider's approval callback. The caller
    /// clears the cart and then the tracker - in that order - when the
    /// returned status is a terminal success.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Backend`] on network failure; the order stays
    /// non-terminal and the tracker untouched, so a later reconciliation can
    /// pick it up.
    #[instrument(skip(self), fields(provider = %self.provider, order_id = %order_id))]
    pub async fn capture(&self, order_id: &OrderId) -> Result<OrderStatus, PaymentError> {
        let response = self.backend.capture_order(order_id).await?;
        Ok(response.status)
    }

    /// Handle a provider-side cancel.
    ///
    /// Best-effort: the cancellation note is only recorded when the backend
    /// confirms the order saw buyer interaction, and any failure along the
    /// way is logged and swallowed. The returned redirect keeps the buyer on
    /// the order-status view; the tracker is deliberately left alone so the
    /// same order can be resumed.
    #[instrument(skip(self), fields(provider = %self.provider, order_id = %order_id))]
    pub async fn cancel(&self, order_id: &OrderId, reason: &str) -> CancelRedirect {
        match self.backend.check_interaction(order_id).await {
            Ok(check) if check.exists => {
                if let Err(e) = self.backend.note_cancellation(order_id, reason).await {
                    warn!(order_id = %order_id, error = %e, "failed to record cancellation");
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "interaction check failed, skipping cancellation note");
            }
        }

        CancelRedirect {
            location: format!("/orders/{order_id}/status"),
        }
    }
}

/// Validate everything an order creation needs, naming every missing field.
fn validate_order_inputs(
    cart: &[CartItem],
    measurements: &Measurements,
    delivery: &DeliveryDetails,
) -> Result<(), ValidationError> {
    let mut missing = Vec::new();
    if cart.is_empty() {
        missing.push("cart");
    }
    missing.extend(measurements.missing_fields());
    missing.extend(delivery.missing_fields());

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(missing))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use atelier_core::{CurrencyCode, Price, ProductId};

    fn cart() -> Vec<CartItem> {
        vec![CartItem {
            id: ProductId::new("prod_silk-wrap-dress").unwrap(),
            name: "Silk Wrap Dress".to_owned(),
            price: Price::from_cents(18900, CurrencyCode::EUR),
            quantity: 1,
            image: None,
            color: Some("Ivory".to_owned()),
        }]
    }

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
    fn test_validate_complete_inputs() {
        assert!(validate_order_inputs(&cart(), &measurements(), &delivery()).is_ok());
    }

    #[test]
    fn test_validate_names_all_missing_fields() {
        let err = validate_order_inputs(
            &[],
            &Measurements {
                hips: 0,
                ..measurements()
            },
            &DeliveryDetails {
                email: String::new(),
                phone: String::new(),
                ..delivery()
            },
        )
        .unwrap_err();

        assert_eq!(err.missing, vec!["cart", "hips", "email", "phone"]);
    }

    #[test]
    fn test_provider_kind_roundtrip() {
        for provider in ProviderKind::ALL {
            assert_eq!(provider.as_str().parse::<ProviderKind>().unwrap(), provider);
        }
        assert!("klarna".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_sdk_url_requires_configuration() {
        let config = ProviderConfig {
            paypal_client_id: Some("client-abc".to_owned()),
            stripe_publishable_key: None,
            mollie_profile_id: None,
        };

        let url = ProviderKind::PayPal.sdk_script_url(&config).unwrap();
        assert!(url.starts_with("https://www.paypal.com/sdk/js"));
        assert!(url.contains("client-abc"));

        assert!(ProviderKind::Stripe.sdk_script_url(&config).is_none());
        assert!(ProviderKind::Mollie.sdk_script_url(&config).is_none());
    }

    #[test]
    fn test_all_providers_gated_on_targeting() {
        for provider in ProviderKind::ALL {
            assert_eq!(provider.consent_category(), ConsentCategory::Targeting);
        }
    }
}
