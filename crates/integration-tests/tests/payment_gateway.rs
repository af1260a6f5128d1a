//! Gateway behavior against the mock backend: idempotent creation,
//! double-submit races, validation gating, capture failure modes, and
//! cancel semantics.

use atelier_core::{OrderId, OrderStatus};
use atelier_storefront::checkout::{PendingStore, ResumeToken, SharedPendingStore};
use atelier_storefront::payments::{PaymentError, PaymentGateway, ProviderKind};

use atelier_integration_tests::{CaptureMode, MockBackend, cart, delivery, measurements};

fn token(id: &str) -> ResumeToken {
    ResumeToken::new(OrderId::new(id).unwrap())
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn tracked_order_is_reused_without_backend_call() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);

    let store = SharedPendingStore::seeded(Some(token("ord_known")));
    let outcome = gateway
        .create_order(&store, &cart(), &measurements(), &delivery())
        .await
        .unwrap();

    assert_eq!(outcome.order_id().as_str(), "ord_known");
    assert!(outcome.reused());
    assert_eq!(mock.create_count(), 0, "no create call may be issued");
}

#[tokio::test]
async fn fresh_create_pins_the_new_order() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::Stripe);

    let store = SharedPendingStore::seeded(None);
    let outcome = gateway
        .create_order(&store, &cart(), &measurements(), &delivery())
        .await
        .unwrap();

    assert!(!outcome.reused());
    assert_eq!(mock.create_count(), 1);
    assert_eq!(
        store.get().unwrap().order_id(),
        outcome.order_id(),
        "tracker must hold the created order"
    );
}

#[tokio::test]
async fn second_submit_after_first_resolves_reuses_the_order() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);
    let store = SharedPendingStore::seeded(None);

    let first = gateway
        .create_order(&store, &cart(), &measurements(), &delivery())
        .await
        .unwrap();
    let second = gateway
        .create_order(&store, &cart(), &measurements(), &delivery())
        .await
        .unwrap();

    assert_eq!(first.order_id(), second.order_id());
    assert!(second.reused());
    assert_eq!(mock.create_count(), 1, "double submit must not create twice");
}

#[tokio::test]
async fn concurrent_submits_converge_on_one_order() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);
    let store = SharedPendingStore::seeded(None);

    let (cart, measurements, delivery) = (cart(), measurements(), delivery());
    let (a, b) = tokio::join!(
        gateway.create_order(&store, &cart, &measurements, &delivery),
        gateway.create_order(&store, &cart, &measurements, &delivery),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(
        a.order_id(),
        b.order_id(),
        "both submits must resolve to the tracked order"
    );
    assert_eq!(store.get().unwrap().order_id(), a.order_id());

    // When the race produced a duplicate, it was voided best-effort.
    if mock.create_count() == 2 {
        let cancellations = mock.cancellations();
        assert_eq!(cancellations.len(), 1);
        assert_ne!(cancellations[0].0, a.order_id().as_str());
    }
}

#[tokio::test]
async fn validation_gates_the_network() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::Mollie);
    let store = SharedPendingStore::seeded(None);

    let mut incomplete = delivery();
    incomplete.email = String::new();

    let err = gateway
        .create_order(&store, &cart(), &measurements(), &incomplete)
        .await
        .unwrap_err();

    match err {
        PaymentError::Validation(v) => assert_eq!(v.missing, vec!["email"]),
        PaymentError::Backend(_) => panic!("validation error expected"),
    }
    assert_eq!(mock.create_count(), 0, "invalid input must never hit the network");
    assert!(store.get().is_none());
}

// =============================================================================
// Capture
// =============================================================================

#[tokio::test]
async fn capture_reports_the_canonical_status() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);

    mock.seed_order("ord_ok", OrderStatus::PayerActionRequired);
    mock.set_capture_mode(CaptureMode::Succeed(OrderStatus::Completed));

    let status = gateway
        .capture(&OrderId::new("ord_ok").unwrap())
        .await
        .unwrap();
    assert_eq!(status, OrderStatus::Completed);
    assert!(status.is_success());
}

#[tokio::test]
async fn capture_failure_keeps_the_order_resumable() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);

    mock.seed_order("ord_flaky", OrderStatus::PayerActionRequired);
    mock.set_capture_mode(CaptureMode::Fail);

    let store = SharedPendingStore::seeded(Some(token("ord_flaky")));
    let err = gateway
        .capture(&OrderId::new("ord_flaky").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Backend(_)));
    // The tracker is untouched: a later reconciliation resumes this order.
    assert_eq!(store.get(), Some(token("ord_flaky")));
}

#[tokio::test]
async fn already_captured_is_not_an_error() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::Stripe);

    // Another tab won the capture race; the backend answers 409.
    mock.seed_order("ord_race", OrderStatus::PayerActionRequired);
    mock.set_capture_mode(CaptureMode::AlreadyCaptured(OrderStatus::Completed));

    let status = gateway
        .capture(&OrderId::new("ord_race").unwrap())
        .await
        .unwrap();
    assert_eq!(status, OrderStatus::Completed);
}

// =============================================================================
// Cancel
// =============================================================================

#[tokio::test]
async fn cancel_preserves_the_tracker_and_keeps_context() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);

    mock.seed_order("ord_cancel", OrderStatus::PayerActionRequired);
    let store = SharedPendingStore::seeded(Some(token("ord_cancel")));

    let redirect = gateway
        .cancel(&OrderId::new("ord_cancel").unwrap(), "buyer closed popup")
        .await;

    assert!(redirect.location.contains("ord_cancel"));
    // Cancellation is resumable: the token survives.
    assert_eq!(store.get(), Some(token("ord_cancel")));

    let cancellations = mock.cancellations();
    assert_eq!(cancellations.len(), 1);
    assert_eq!(cancellations[0], ("ord_cancel".to_owned(), "buyer closed popup".to_owned()));
}

#[tokio::test]
async fn cancel_note_is_best_effort() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::Mollie);

    mock.seed_order("ord_besteffort", OrderStatus::PayerActionRequired);
    // Interaction check is down; the cancel flow must still redirect.
    mock.set_interaction(None);

    let redirect = gateway
        .cancel(&OrderId::new("ord_besteffort").unwrap(), "buyer closed popup")
        .await;

    assert!(redirect.location.contains("ord_besteffort"));
    assert!(mock.cancellations().is_empty());
}

#[tokio::test]
async fn cancel_without_interaction_records_nothing() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);

    mock.seed_order("ord_ghost", OrderStatus::PaymentPending);
    mock.set_interaction(Some((false, false, false)));

    gateway
        .cancel(&OrderId::new("ord_ghost").unwrap(), "abandoned")
        .await;

    assert!(mock.cancellations().is_empty());
}
