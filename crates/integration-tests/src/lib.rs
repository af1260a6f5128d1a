//! Integration test harness for Atelier Linnea.
//!
//! Spins an in-process mock of the commerce backend's payments API on an
//! ephemeral port, then drives the real `BackendClient`/`PaymentGateway`
//! against it. No external services are required.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mock = MockBackend::spawn().await;
//! let client = mock.client();
//! let gateway = PaymentGateway::new(&client, ProviderKind::PayPal);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::json;

use atelier_core::{CartItem, CurrencyCode, DeliveryDetails, Measurements, OrderStatus, Price, ProductId};
use atelier_storefront::config::BackendConfig;
use atelier_storefront::payments::BackendClient;

/// How the mock answers capture calls.
#[derive(Debug, Clone)]
pub enum CaptureMode {
    /// Capture succeeds and moves the order to this status.
    Succeed(OrderStatus),
    /// Capture fails with a 500 (network-ish failure from the client's view).
    Fail,
    /// Another tab already captured: 409, order already terminal.
    AlreadyCaptured(OrderStatus),
}

/// Shared state of the mock backend.
pub struct MockState {
    orders: Mutex<HashMap<String, OrderStatus>>,
    next_id: AtomicUsize,
    create_count: AtomicUsize,
    capture_mode: Mutex<CaptureMode>,
    /// `None` makes the check-interaction endpoint fail with a 500.
    interaction: Mutex<Option<(bool, bool, bool)>>,
    cancellations: Mutex<Vec<(String, String)>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            create_count: AtomicUsize::new(0),
            capture_mode: Mutex::new(CaptureMode::Succeed(OrderStatus::Completed)),
            interaction: Mutex::new(Some((true, true, true))),
            cancellations: Mutex::new(Vec::new()),
        }
    }
}

/// An in-process mock of the commerce backend.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockBackend {
    /// Bind the mock on an ephemeral port and serve it in the background.
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::new());

        let app = Router::new()
            .route("/api/payments", post(create_order))
            .route("/api/payments/{id}", get(get_order))
            .route("/api/payments/{id}/capture", post(capture_order))
            .route("/api/payments/{id}/check-interaction", post(check_interaction))
            .route("/api/payments/{id}/update-canceled", post(update_canceled))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// A real `BackendClient` pointed at this mock.
    #[must_use]
    pub fn client(&self) -> BackendClient {
        let config = BackendConfig {
            base_url: self.base_url.clone(),
            api_key: SecretString::from("test-api-key"),
        };
        BackendClient::new(&config).unwrap()
    }

    /// Number of live create calls the mock has served.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.state.create_count.load(Ordering::SeqCst)
    }

    /// Seed an order with a status.
    pub fn seed_order(&self, id: &str, status: OrderStatus) {
        self.state
            .orders
            .lock()
            .unwrap()
            .insert(id.to_string(), status);
    }

    /// Configure capture behavior.
    pub fn set_capture_mode(&self, mode: CaptureMode) {
        *self.state.capture_mode.lock().unwrap() = mode;
    }

    /// Configure the check-interaction answer (`None` makes it fail).
    pub fn set_interaction(&self, answer: Option<(bool, bool, bool)>) {
        *self.state.interaction.lock().unwrap() = answer;
    }

    /// Recorded cancellation notes as (order id, reason) pairs.
    #[must_use]
    pub fn cancellations(&self) -> Vec<(String, String)> {
        self.state.cancellations.lock().unwrap().clone()
    }
}

// =============================================================================
// Mock handlers
// =============================================================================

async fn create_order(State(state): State<Arc<MockState>>) -> Json<serde_json::Value> {
    let n = state.next_id.fetch_add(1, Ordering::SeqCst);
    state.create_count.fetch_add(1, Ordering::SeqCst);

    let id = format!("ord_{n:04}");
    state
        .orders
        .lock()
        .unwrap()
        .insert(id.clone(), OrderStatus::PaymentPending);

    Json(json!({ "id": id }))
}

async fn get_order(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(status) = state.orders.lock().unwrap().get(&id).cloned() else {
        return (StatusCode::NOT_FOUND, "no such order").into_response();
    };

    let total = Price::from_cents(18900, CurrencyCode::EUR);
    Json(json!({
        "id": id,
        "status": status,
        "items": [],
        "totalAmount": total,
    }))
    .into_response()
}

async fn capture_order(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Response {
    let mode = state.capture_mode.lock().unwrap().clone();
    match mode {
        CaptureMode::Succeed(status) => {
            state
                .orders
                .lock()
                .unwrap()
                .insert(id, status.clone());
            Json(json!({ "status": status })).into_response()
        }
        CaptureMode::Fail => (StatusCode::INTERNAL_SERVER_ERROR, "capture failed").into_response(),
        CaptureMode::AlreadyCaptured(status) => {
            state.orders.lock().unwrap().insert(id, status);
            (StatusCode::CONFLICT, "already captured").into_response()
        }
    }
}

async fn check_interaction(
    State(state): State<Arc<MockState>>,
    Path(_id): Path<String>,
) -> Response {
    match *state.interaction.lock().unwrap() {
        Some((exists, created, has_email)) => Json(json!({
            "exists": exists,
            "created": created,
            "hasEmail": has_email,
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "interaction check down").into_response(),
    }
}

async fn update_canceled(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let reason = body
        .get("reason")
        .and_then(|r| r.as_str())
        .unwrap_or_default()
        .to_string();
    state.cancellations.lock().unwrap().push((id, reason));
    Json(json!({ "ok": true }))
}

// =============================================================================
// Fixtures
// =============================================================================

/// A one-line cart.
#[must_use]
pub fn cart() -> Vec<CartItem> {
    vec![CartItem {
        id: ProductId::new("prod_silk-wrap-dress").unwrap(),
        name: "Silk Wrap Dress".to_owned(),
        price: Price::from_cents(18900, CurrencyCode::EUR),
        quantity: 1,
        image: None,
        color: Some("Ivory".to_owned()),
    }]
}

/// Complete measurements.
#[must_use]
pub fn measurements() -> Measurements {
    Measurements {
        height: 180,
        chest: 100,
        waist: 80,
        hips: 95,
    }
}

/// Complete delivery details.
#[must_use]
pub fn delivery() -> DeliveryDetails {
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
