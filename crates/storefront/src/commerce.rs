//! Commerce backend client for catalog, favorites, and the server-side cart.
//!
//! Products and the product list are cached using `moka` (5-minute TTL);
//! favorites and the cart are user state and always fetched live.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use atelier_core::{CartItem, Price, ProductId, UserId};

use crate::config::BackendConfig;
use crate::payments::BackendError;

/// Cached entries per client.
const CACHE_CAPACITY: u64 = 1000;

/// Catalog cache TTL.
const CACHE_TTL: Duration = Duration::from_secs(300); // 5 minutes

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Clone)]
enum CacheValue {
    Product(Box<Product>),
    ProductList(Arc<Vec<Product>>),
}

/// Client for the commerce backend's catalog, favorites, and cart APIs.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
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

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.inner.base_url);
        let response = self.inner.client.get(&url).send().await?;
        decode(response).await
    }

    async fn put_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), BackendError> {
        let url = format!("{}{path}", self.inner.base_url);
        let response = self.inner.client.put(&url).json(body).send().await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.inner.base_url);
        let response = self.inner.client.post(&url).json(body).send().await?;
        decode(response).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List all products (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self) -> Result<Arc<Vec<Product>>, BackendError> {
        let cache_key = "products".to_string();

        if let Some(CacheValue::ProductList(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product list");
            return Ok(products);
        }

        let products: Vec<Product> = self.get_json("/api/products").await?;
        let products = Arc::new(products);
        self.inner
            .cache
            .insert(cache_key, CacheValue::ProductList(products.clone()))
            .await;
        Ok(products)
    }

    /// Get a product by id (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, BackendError> {
        let cache_key = format!("product:{product_id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.get_json(&format!("/api/products/{product_id}")).await?;
        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Product ids the user has favorited.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_favorites(&self, user_id: UserId) -> Result<Vec<ProductId>, BackendError> {
        self.get_json(&format!("/api/favorites?user={user_id}")).await
    }

    /// Toggle a favorite; returns whether it is now set.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn toggle_favorite(
        &self,
        user_id: UserId,
        product_id: &ProductId,
    ) -> Result<bool, BackendError> {
        #[derive(Deserialize)]
        struct ToggleResponse {
            favorited: bool,
        }

        let response: ToggleResponse = self
            .post_json(
                "/api/favorites",
                &serde_json::json!({ "user": user_id, "product": product_id }),
            )
            .await?;
        Ok(response.favorited)
    }

    // =========================================================================
    // Server Cart
    // =========================================================================

    /// The backend's cart copy for a user (merged into the session cart at
    /// login).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartItem>, BackendError> {
        self.get_json(&format!("/api/cart?user={user_id}")).await
    }

    /// Replace the backend's cart copy for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, items), fields(user_id = %user_id, lines = items.len()))]
    pub async fn put_cart(&self, user_id: UserId, items: &[CartItem]) -> Result<(), BackendError> {
        self.put_json(&format!("/api/cart?user={user_id}"), &items)
            .await
    }
}

/// Decode a backend response, mapping error statuses like the payments
/// client does.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(BackendError::RateLimited(retry_after));
    }

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

    serde_json::from_str(&response_text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %response_text.chars().take(500).collect::<String>(),
            "Failed to parse backend API response"
        );
        BackendError::Parse(e)
    })
}
