//! Order draft accumulation across checkout steps.
//!
//! The draft is additive: each step stores its block without touching the
//! others, and the current step is always derived from which blocks are
//! present rather than stored. A failed validation leaves the draft exactly
//! as it was.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use atelier_core::{DeliveryDetails, Measurements};

use crate::error::ValidationError;
use crate::models::session_keys;

/// Which form the buyer sees next, derived from draft completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Step 1: body measurements.
    Measurements,
    /// Step 2: delivery details.
    Delivery,
    /// Step 3: payment.
    Payment,
}

impl CheckoutStep {
    /// 1-based step number for the progress indicator.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Measurements => 1,
            Self::Delivery => 2,
            Self::Payment => 3,
        }
    }
}

/// Errors from draft mutations.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// A required field was empty; the step did not advance.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Delivery was submitted before measurements were complete.
    #[error("measurements must be submitted before delivery details")]
    MeasurementsFirst,
}

/// The buyer's accumulated checkout input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    measurements: Option<Measurements>,
    delivery: Option<DeliveryDetails>,
}

impl OrderDraft {
    /// Derive the current step: payment when both blocks are present,
    /// delivery when only measurements are, measurements otherwise.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        match (&self.measurements, &self.delivery) {
            (Some(_), Some(_)) => CheckoutStep::Payment,
            (Some(_), None) => CheckoutStep::Delivery,
            _ => CheckoutStep::Measurements,
        }
    }

    /// Accept the measurements block.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::Invalid`] naming the missing fields; the draft
    /// is unchanged on error.
    pub fn submit_measurements(&mut self, measurements: Measurements) -> Result<(), DraftError> {
        let missing = measurements.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::new(missing).into());
        }
        self.measurements = Some(measurements);
        Ok(())
    }

    /// Accept the delivery block.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::MeasurementsFirst`] when step 1 hasn't been
    /// completed, or [`DraftError::Invalid`] naming the missing fields.
    /// The draft is unchanged on error.
    pub fn submit_delivery(&mut self, delivery: DeliveryDetails) -> Result<(), DraftError> {
        if self.measurements.is_none() {
            return Err(DraftError::MeasurementsFirst);
        }
        let missing = delivery.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::new(missing).into());
        }
        self.delivery = Some(delivery);
        Ok(())
    }

    /// Clear all steps, forcing the flow back to measurements.
    pub fn reset(&mut self) {
        self.measurements = None;
        self.delivery = None;
    }

    /// Completed measurements, if any.
    #[must_use]
    pub const fn measurements(&self) -> Option<&Measurements> {
        self.measurements.as_ref()
    }

    /// Completed delivery details, if any.
    #[must_use]
    pub const fn delivery(&self) -> Option<&DeliveryDetails> {
        self.delivery.as_ref()
    }
}

// =============================================================================
// Session Persistence
// =============================================================================

/// Load the draft from the session (empty draft when none was saved).
pub async fn load(session: &Session) -> OrderDraft {
    session
        .get::<OrderDraft>(session_keys::ORDER_DRAFT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Persist the draft to the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save(
    session: &Session,
    draft: &OrderDraft,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::ORDER_DRAFT, draft).await
}

/// Remove the draft from the session (terminal completion or reset).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<OrderDraft>(session_keys::ORDER_DRAFT).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

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
    fn test_fresh_draft_starts_at_measurements() {
        let draft = OrderDraft::default();
        assert_eq!(draft.step(), CheckoutStep::Measurements);
        assert_eq!(draft.step().number(), 1);
    }

    #[test]
    fn test_full_flow_step_derivation() {
        let mut draft = OrderDraft::default();

        draft.submit_measurements(measurements()).unwrap();
        assert_eq!(draft.step(), CheckoutStep::Delivery);
        assert_eq!(draft.step().number(), 2);

        draft.submit_delivery(delivery()).unwrap();
        assert_eq!(draft.step(), CheckoutStep::Payment);
        assert_eq!(draft.step().number(), 3);
    }

    #[test]
    fn test_invalid_measurements_do_not_advance() {
        let mut draft = OrderDraft::default();
        let err = draft
            .submit_measurements(Measurements {
                chest: 0,
                ..measurements()
            })
            .unwrap_err();

        match err {
            DraftError::Invalid(v) => assert_eq!(v.missing, vec!["chest"]),
            DraftError::MeasurementsFirst => panic!("wrong error"),
        }
        assert_eq!(draft.step(), CheckoutStep::Measurements);
        assert!(draft.measurements().is_none());
    }

    #[test]
    fn test_invalid_delivery_keeps_previous_steps() {
        let mut draft = OrderDraft::default();
        draft.submit_measurements(measurements()).unwrap();

        let err = draft
            .submit_delivery(DeliveryDetails {
                email: String::new(),
                ..delivery()
            })
            .unwrap_err();

        match err {
            DraftError::Invalid(v) => assert_eq!(v.missing, vec!["email"]),
            DraftError::MeasurementsFirst => panic!("wrong error"),
        }
        // Measurements survive the failed delivery submit
        assert_eq!(draft.measurements(), Some(&measurements()));
        assert_eq!(draft.step(), CheckoutStep::Delivery);
    }

    #[test]
    fn test_delivery_requires_measurements() {
        let mut draft = OrderDraft::default();
        let err = draft.submit_delivery(delivery()).unwrap_err();
        assert!(matches!(err, DraftError::MeasurementsFirst));
    }

    #[test]
    fn test_resubmit_replaces_block() {
        let mut draft = OrderDraft::default();
        draft.submit_measurements(measurements()).unwrap();
        draft
            .submit_measurements(Measurements {
                height: 175,
                ..measurements()
            })
            .unwrap();
        assert_eq!(draft.measurements().unwrap().height, 175);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut draft = OrderDraft::default();
        draft.submit_measurements(measurements()).unwrap();
        draft.submit_delivery(delivery()).unwrap();

        draft.reset();
        assert_eq!(draft, OrderDraft::default());
        assert_eq!(draft.step(), CheckoutStep::Measurements);
    }
}
