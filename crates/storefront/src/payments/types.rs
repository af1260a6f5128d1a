//! Wire types for the commerce backend's payments API.

use serde::{Deserialize, Serialize};

use atelier_core::{CartItem, DeliveryDetails, Measurements, OrderId, OrderStatus, Price};

/// Body of `POST /api/payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub cart: Vec<CartItem>,
    pub measurements: Measurements,
    pub delivery_details: DeliveryDetails,
}

/// Response of `POST /api/payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub id: OrderId,
}

/// Response of `POST /api/payments/:id/capture`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub status: OrderStatus,
}

/// Full order record from `GET /api/payments/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub status: OrderStatus,
    pub items: Vec<CartItem>,
    pub total_amount: Price,
}

/// Response of `POST /api/payments/:id/check-interaction`.
///
/// Tells the storefront whether a cancellation is worth recording: an order
/// nobody interacted with carries no signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCheck {
    pub exists: bool,
    pub created: bool,
    pub has_email: bool,
}

/// Body of `POST /api/payments/:id/update-canceled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationNote {
    pub reason: String,
}
