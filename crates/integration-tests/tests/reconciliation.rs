//! Reconciliation against the mock backend, including the tracker/cart
//! clearing order on terminal outcomes.

use atelier_core::{OrderId, OrderStatus};
use atelier_storefront::cart::Cart;
use atelier_storefront::checkout::reconcile::{Reconciliation, reconcile};
use atelier_storefront::checkout::{PendingStore, ResumeToken, SharedPendingStore};

use atelier_integration_tests::{MockBackend, cart as cart_items};

fn token(id: &str) -> ResumeToken {
    ResumeToken::new(OrderId::new(id).unwrap())
}

#[tokio::test]
async fn no_token_means_fresh_checkout() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();

    let outcome = reconcile(&client, None).await.unwrap();
    assert_eq!(outcome, Reconciliation::Fresh);
}

#[tokio::test]
async fn completed_order_clears_cart_then_tracker() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    mock.seed_order("ord_done", OrderStatus::Completed);

    let store = SharedPendingStore::seeded(Some(token("ord_done")));
    let outcome = reconcile(&client, store.get().as_ref()).await.unwrap();

    assert_eq!(
        outcome,
        Reconciliation::Completed {
            order_id: OrderId::new("ord_done").unwrap()
        }
    );

    // The handler sequence: cart first, then tracker.
    let mut session_cart = Cart::default();
    for item in cart_items() {
        session_cart.add(item);
    }
    assert!(outcome.clears_cart());
    session_cart.clear();
    assert!(outcome.clears_tracker());
    store.clear();

    assert!(session_cart.is_empty());
    assert!(store.get().is_none());
}

#[tokio::test]
async fn canceled_order_clears_tracker_but_keeps_cart() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    mock.seed_order("ord_gone", OrderStatus::Canceled);

    let store = SharedPendingStore::seeded(Some(token("ord_gone")));
    let outcome = reconcile(&client, store.get().as_ref()).await.unwrap();

    assert!(matches!(outcome, Reconciliation::Canceled { .. }));
    assert!(outcome.clears_tracker());
    assert!(!outcome.clears_cart(), "a canceled order never empties the cart");
}

#[tokio::test]
async fn payer_action_resumes_the_tracked_order() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    mock.seed_order("ord_waiting", OrderStatus::PayerActionRequired);

    let outcome = reconcile(&client, Some(&token("ord_waiting"))).await.unwrap();

    assert_eq!(
        outcome,
        Reconciliation::Resume {
            order_id: OrderId::new("ord_waiting").unwrap()
        }
    );
    assert!(!outcome.clears_tracker(), "resumable orders stay pinned");
}

#[tokio::test]
async fn unknown_status_shows_processing() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    mock.seed_order(
        "ord_new",
        OrderStatus::Other("AWAITING_FRAUD_REVIEW".to_owned()),
    );

    let outcome = reconcile(&client, Some(&token("ord_new"))).await.unwrap();

    match outcome {
        Reconciliation::Processing { status, .. } => {
            assert_eq!(status, OrderStatus::Other("AWAITING_FRAUD_REVIEW".to_owned()));
        }
        other => panic!("expected processing, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_failure_surfaces_instead_of_faking_fresh() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    // Order was never seeded; the backend answers 404.

    let result = reconcile(&client, Some(&token("ord_vanished"))).await;
    assert!(
        result.is_err(),
        "a failed status fetch must not fall through to a fresh checkout"
    );
}
