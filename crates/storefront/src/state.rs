//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::commerce::CommerceClient;
use crate::config::StorefrontConfig;
use crate::events::EventBus;
use crate::payments::{BackendClient, BackendError};
use crate::services::mailer::{Mailer, MailerError};

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client error: {0}")]
    Backend(#[from] BackendError),
    #[error("mailer error: {0}")]
    Mailer(#[from] MailerError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    backend: BackendClient,
    commerce: CommerceClient,
    mailer: Mailer,
    events: EventBus,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if one of the HTTP clients cannot be constructed.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let backend = BackendClient::new(&config.backend)?;
        let commerce = CommerceClient::new(&config.backend)?;
        let mailer = Mailer::new(&config.mail)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                backend,
                commerce,
                mailer,
                events: EventBus::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payments backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the catalog/favorites/cart client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// Get a reference to the transactional mailer.
    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }

    /// Get a reference to the application event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.inner.config.base_url.starts_with("https://")
    }
}
