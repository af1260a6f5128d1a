//! Order status reconciliation.
//!
//! Runs on every checkout mount, before any payment UI is offered: if a
//! pending order is tracked, its authoritative status decides what the
//! buyer sees. Without this, a resumable order would flash a fresh
//! "create order" button and a double order would be one click away.
//!
//! Local knowledge of a status is always advisory; the branch is taken on
//! the value fetched here, never on what the client last believed. That is
//! also how the cancel/webhook race resolves: whichever writer got to the
//! backend first, the fetched status wins and the tracker is only cleared
//! on that confirmation.

use serde::Serialize;
use tracing::instrument;

use atelier_core::{OrderId, OrderStatus};

use super::resume::ResumeToken;
use crate::payments::{BackendError, PaymentsApi};

/// What the checkout surface should show, decided from the fetched status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Reconciliation {
    /// No order is tracked; offer a fresh checkout.
    Fresh,
    /// Terminal success: show completion, clear cart then tracker.
    Completed { order_id: OrderId },
    /// Terminal cancel: clear tracker, offer "start new order" - never
    /// auto-recreate.
    Canceled { order_id: OrderId, status: OrderStatus },
    /// The provider is waiting on the buyer: resume the payment UI bound to
    /// this order id, do not recreate.
    Resume { order_id: OrderId },
    /// Any other in-progress status: show a generic processing view.
    Processing { order_id: OrderId, status: OrderStatus },
}

impl Reconciliation {
    /// Whether the tracker must be cleared after this outcome.
    #[must_use]
    pub const fn clears_tracker(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Canceled { .. })
    }

    /// Whether the cart must be cleared after this outcome.
    #[must_use]
    pub const fn clears_cart(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Map a fetched status onto the checkout surface.
#[must_use]
pub fn classify(order_id: OrderId, status: OrderStatus) -> Reconciliation {
    if status.is_success() {
        return Reconciliation::Completed { order_id };
    }
    if status.is_canceled() {
        return Reconciliation::Canceled { order_id, status };
    }
    match status {
        OrderStatus::PayerActionRequired => Reconciliation::Resume { order_id },
        other => Reconciliation::Processing {
            order_id,
            status: other,
        },
    }
}

/// Fetch the tracked order's status and classify it.
///
/// With no token present the checkout is fresh and nothing is fetched.
///
/// # Errors
///
/// Returns [`BackendError`] when the status fetch fails; the caller
/// surfaces it as retryable and must not fall through to a fresh checkout
/// (that path could double-create).
#[instrument(skip(backend, token), fields(order_id = token.as_ref().map(|t| t.order_id().as_str()).unwrap_or("-")))]
pub async fn reconcile<B: PaymentsApi>(
    backend: &B,
    token: Option<&ResumeToken>,
) -> Result<Reconciliation, BackendError> {
    let Some(token) = token else {
        return Ok(Reconciliation::Fresh);
    };

    let record = backend.get_order(token.order_id()).await?;
    Ok(classify(record.id, record.status))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order_id() -> OrderId {
        OrderId::new("ord_8f0c").unwrap()
    }

    #[test]
    fn test_completed_clears_cart_and_tracker() {
        for status in [OrderStatus::Completed, OrderStatus::Approved] {
            let outcome = classify(order_id(), status);
            assert_eq!(
                outcome,
                Reconciliation::Completed {
                    order_id: order_id()
                }
            );
            assert!(outcome.clears_tracker());
            assert!(outcome.clears_cart());
        }
    }

    #[test]
    fn test_canceled_clears_tracker_but_not_cart() {
        for status in [OrderStatus::Canceled, OrderStatus::Voided] {
            let outcome = classify(order_id(), status.clone());
            assert!(outcome.clears_tracker());
            assert!(!outcome.clears_cart());
            assert!(matches!(outcome, Reconciliation::Canceled { .. }));
        }
    }

    #[test]
    fn test_payer_action_resumes_existing_order() {
        let outcome = classify(order_id(), OrderStatus::PayerActionRequired);
        assert_eq!(
            outcome,
            Reconciliation::Resume {
                order_id: order_id()
            }
        );
        assert!(!outcome.clears_tracker());
    }

    #[test]
    fn test_other_statuses_show_processing() {
        for status in [
            OrderStatus::PaymentPending,
            OrderStatus::Other("CHECKOUT_IN_PROGRESS".to_owned()),
        ] {
            let outcome = classify(order_id(), status.clone());
            assert_eq!(
                outcome,
                Reconciliation::Processing {
                    order_id: order_id(),
                    status
                }
            );
            assert!(!outcome.clears_tracker());
            assert!(!outcome.clears_cart());
        }
    }
}
