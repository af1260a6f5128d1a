//! Transactional email client.
//!
//! Talks to the email backend service; the storefront never speaks SMTP
//! itself. Sends are best-effort at most call sites - a failed verification
//! mail is logged and the account still gets created.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use atelier_core::{Email, OrderId, Price};

use crate::config::MailConfig;

/// Errors that can occur when sending mail.
#[derive(Debug, Error)]
pub enum MailerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be constructed.
    #[error("Mailer setup error: {0}")]
    Setup(String),
}

#[derive(Debug, Serialize)]
struct SendRequest<'a, T: Serialize> {
    to: &'a str,
    from: &'a str,
    template: &'a str,
    data: T,
}

/// Client for the transactional email service.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    base_url: String,
    from_address: String,
}

impl Mailer {
    /// Create a new mailer.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MailConfig) -> Result<Self, MailerError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| MailerError::Setup(format!("invalid API key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert("Authorization", auth_header);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            from_address: config.from_address.clone(),
        })
    }

    async fn send<T: Serialize>(&self, request: &SendRequest<'_, T>) -> Result<(), MailerError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailerError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        Ok(())
    }

    /// Send the email-verification message with a one-shot token link.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token), fields(to = %to))]
    pub async fn send_verification(
        &self,
        to: &Email,
        token: &str,
        base_url: &str,
    ) -> Result<(), MailerError> {
        #[derive(Serialize)]
        struct VerificationData {
            verify_url: String,
        }

        self.send(&SendRequest {
            to: to.as_str(),
            from: &self.from_address,
            template: "email-verification",
            data: VerificationData {
                verify_url: format!("{base_url}/auth/verify?token={token}"),
            },
        })
        .await
    }

    /// Send the order confirmation after a successful capture.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(to = %to, order_id = %order_id))]
    pub async fn send_order_confirmation(
        &self,
        to: &Email,
        order_id: &OrderId,
        total: &Price,
    ) -> Result<(), MailerError> {
        #[derive(Serialize)]
        struct ConfirmationData {
            order_id: String,
            total: String,
        }

        self.send(&SendRequest {
            to: to.as_str(),
            from: &self.from_address,
            template: "order-confirmation",
            data: ConfirmationData {
                order_id: order_id.to_string(),
                total: total.display(),
            },
        })
        .await
    }
}
