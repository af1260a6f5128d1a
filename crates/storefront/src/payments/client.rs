//! HTTP client for the commerce backend's payments API.
//!
//! Thin reqwest wrapper with typed request/response bodies. Responses are
//! read as text first so malformed bodies show up in logs with context.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use atelier_core::OrderId;

use super::types::{
    CancellationNote, CaptureResponse, CreateOrderRequest, CreateOrderResponse, InteractionCheck,
    OrderRecord,
};
use super::{BackendError, PaymentsApi};
use crate::config::BackendConfig;

/// Client for the commerce backend payments API.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build (e.g. the API key
    /// contains non-header characters).
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value).map_err(|_| {
            BackendError::Api {
                status: 0,
                message: "backend API key is not a valid header value".to_string(),
            }
        })?;
        auth_header.set_sensitive(true);
        headers.insert("Authorization", auth_header);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Execute a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(
                response_text.chars().take(200).collect(),
            ));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Backend API returned non-success status"
            );
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        match serde_json::from_str(&response_text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse backend API response"
                );
                Err(BackendError::Parse(e))
            }
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.base_url);
        self.execute(self.client.post(&url).json(body)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.base_url);
        self.execute(self.client.get(&url)).await
    }
}

impl PaymentsApi for BackendClient {
    /// Create a provisional order.
    #[instrument(skip(self, request))]
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderId, BackendError> {
        let response: CreateOrderResponse = self.post_json("/api/payments", request).await?;
        debug!(order_id = %response.id, "order created");
        Ok(response.id)
    }

    /// Finalize an approved payment.
    ///
    /// A 409 from the backend means another tab already captured this
    /// order; that is a success for our purposes, so the authoritative
    /// record is fetched and its status returned instead.
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn capture_order(&self, order_id: &OrderId) -> Result<CaptureResponse, BackendError> {
        let path = format!("/api/payments/{order_id}/capture");
        match self
            .post_json::<_, CaptureResponse>(&path, &serde_json::json!({}))
            .await
        {
            Ok(response) => Ok(response),
            Err(BackendError::Api { status: 409, .. }) => {
                debug!(order_id = %order_id, "order already captured, fetching status");
                let record = self.get_order(order_id).await?;
                Ok(CaptureResponse {
                    status: record.status,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the authoritative order record.
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: &OrderId) -> Result<OrderRecord, BackendError> {
        self.get_json(&format!("/api/payments/{order_id}")).await
    }

    /// Ask whether the order saw any buyer interaction.
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn check_interaction(&self, order_id: &OrderId) -> Result<InteractionCheck, BackendError> {
        self.post_json(
            &format!("/api/payments/{order_id}/check-interaction"),
            &serde_json::json!({}),
        )
        .await
    }

    /// Record a cancellation reason (best-effort at the call site).
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn note_cancellation(&self, order_id: &OrderId, reason: &str) -> Result<(), BackendError> {
        let note = CancellationNote {
            reason: reason.to_string(),
        };
        // Response body is irrelevant; only the status matters
        let _: serde_json::Value = self
            .post_json(&format!("/api/payments/{order_id}/update-canceled"), &note)
            .await?;
        Ok(())
    }
}
