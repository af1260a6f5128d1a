//! Checkout flow: draft accumulation, order resumption, and status
//! reconciliation.
//!
//! # Flow
//!
//! 1. The buyer fills measurements, then delivery details ([`draft`]); the
//!    draft lives in the session and survives reloads.
//! 2. Submitting payment creates an order through the provider adapter
//!    (`crate::payments`); the returned order id is pinned in the
//!    `pending_order_id` cookie ([`resume`]) so a provider redirect or a
//!    second tab resumes the same order instead of creating a duplicate.
//! 3. Every checkout mount first reconciles the pinned order against the
//!    backend's authoritative status ([`reconcile`]) before any payment UI
//!    is offered.
//!
//! At most one non-terminal order id is tracked per browser session; the
//! cookie is only cleared when a *fetched* status confirms a terminal state
//! or the buyer explicitly resets the flow.

pub mod draft;
pub mod reconcile;
pub mod resume;

pub use draft::{CheckoutStep, DraftError, OrderDraft};
pub use reconcile::Reconciliation;
pub use resume::{PendingOrder, PendingStore, ResumeToken, SharedPendingStore};
