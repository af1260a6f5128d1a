//! Pending-order resume token, pinned in a durable cookie.
//!
//! The token is a weak back-reference: the backend owns the order, the
//! browser only holds a resumable pointer. It must live in a cookie (not
//! session-only state) because payment providers return the buyer through
//! redirects that land on a fresh page load, possibly in a new tab.
//!
//! Reads are side-effect-free; [`set_cookie`] and [`clear_cookie`] are the
//! only mutators, and clearing happens exactly once per terminal success
//! and once per explicit reset - never on a mid-flow provider cancel.

use axum::{
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts},
};

use atelier_core::OrderId;

/// Cookie holding the in-flight order id.
pub const PENDING_ORDER_COOKIE: &str = "pending_order_id";

/// Cookie lifetime in seconds (14 days - an abandoned provider checkout must
/// stay resumable for at least a week).
const PENDING_ORDER_MAX_AGE: u64 = 14 * 24 * 60 * 60;

/// The externally created order identifier retained to resume an in-flight
/// checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeToken {
    order_id: OrderId,
}

impl ResumeToken {
    /// Wrap an order id.
    #[must_use]
    pub const fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }

    /// The tracked order id.
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Consume the token and return the order id.
    #[must_use]
    pub fn into_order_id(self) -> OrderId {
        self.order_id
    }
}

/// Parse the resume token out of a `Cookie` request header.
///
/// Unknown cookies are skipped; an empty value is treated as absent (an
/// empty order id is never a valid handle).
#[must_use]
pub fn from_cookie_header(header: &str) -> Option<ResumeToken> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name.trim() != PENDING_ORDER_COOKIE {
            return None;
        }
        OrderId::new(value.trim()).map(ResumeToken::new)
    })
}

/// Build the `Set-Cookie` value pinning an order id.
///
/// Path `/` so every route (including provider callback landings) sees it;
/// `SameSite=Lax` so top-level provider redirects still send it.
#[must_use]
pub fn set_cookie(token: &ResumeToken, secure: bool) -> String {
    let mut cookie = format!(
        "{PENDING_ORDER_COOKIE}={}; Path=/; Max-Age={PENDING_ORDER_MAX_AGE}; SameSite=Lax; HttpOnly",
        token.order_id()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the `Set-Cookie` value removing the pin.
#[must_use]
pub fn clear_cookie(secure: bool) -> String {
    let mut cookie =
        format!("{PENDING_ORDER_COOKIE}=; Path=/; Max-Age=0; SameSite=Lax; HttpOnly");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Where the checkout flow keeps the tracked order id for the duration of
/// one logical checkout context.
///
/// The cookie is the durable backing; within the server this trait lets the
/// payment adapter re-check the tracker between "create resolved" and
/// "commit new id", which is what prevents duplicate orders when two
/// submits race. `get` must be side-effect-free.
pub trait PendingStore {
    /// Currently tracked token, if any.
    fn get(&self) -> Option<ResumeToken>;
    /// Track a token.
    fn set(&self, token: ResumeToken);
    /// Stop tracking. Only called on fetched-terminal success or explicit
    /// reset.
    fn clear(&self);
}

/// In-memory `PendingStore` shared across concurrent tasks of one checkout
/// context. Routes seed it from the request cookie and flush mutations back
/// out as `Set-Cookie` headers.
#[derive(Debug, Clone, Default)]
pub struct SharedPendingStore {
    inner: std::sync::Arc<std::sync::Mutex<SharedPendingInner>>,
}

#[derive(Debug, Default)]
struct SharedPendingInner {
    token: Option<ResumeToken>,
    dirty: bool,
}

impl SharedPendingStore {
    /// Create a store seeded with the token from the request, if any.
    #[must_use]
    pub fn seeded(token: Option<ResumeToken>) -> Self {
        Self {
            inner: std::sync::Arc::new(std::sync::Mutex::new(SharedPendingInner {
                token,
                dirty: false,
            })),
        }
    }

    /// The `Set-Cookie` header to emit, when a mutation happened:
    /// `Some(set)` after `set`, `Some(clear)` after `clear`, `None` if the
    /// store was only read.
    #[must_use]
    pub fn take_cookie_update(&self, secure: bool) -> Option<String> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !inner.dirty {
            return None;
        }
        inner.dirty = false;
        Some(match &inner.token {
            Some(token) => set_cookie(token, secure),
            None => clear_cookie(secure),
        })
    }
}

impl PendingStore for SharedPendingStore {
    fn get(&self) -> Option<ResumeToken> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .token
            .clone()
    }

    fn set(&self, token: ResumeToken) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.token = Some(token);
        inner.dirty = true;
    }

    fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.token = None;
        inner.dirty = true;
    }
}

/// Extractor for the (optional) pending-order token.
///
/// Reading never mutates anything, so any number of tabs can extract it
/// concurrently.
pub struct PendingOrder(pub Option<ResumeToken>);

impl<S> FromRequestParts<S> for PendingOrder
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(from_cookie_header);

        Ok(Self(token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_cookie() {
        let token = from_cookie_header("pending_order_id=ord_8f0c").unwrap();
        assert_eq!(token.order_id().as_str(), "ord_8f0c");
    }

    #[test]
    fn test_parse_among_other_cookies() {
        let header = "atelier_session=abc123; pending_order_id=ord_8f0c; cookie_consent=all";
        let token = from_cookie_header(header).unwrap();
        assert_eq!(token.order_id().as_str(), "ord_8f0c");
    }

    #[test]
    fn test_parse_absent() {
        assert!(from_cookie_header("atelier_session=abc123").is_none());
    }

    #[test]
    fn test_parse_empty_value_is_absent() {
        assert!(from_cookie_header("pending_order_id=").is_none());
        assert!(from_cookie_header("pending_order_id=  ").is_none());
    }

    #[test]
    fn test_parse_ignores_name_prefix_matches() {
        assert!(from_cookie_header("old_pending_order_id=ord_1").is_none());
    }

    #[test]
    fn test_set_cookie_attributes() {
        let token = ResumeToken::new(OrderId::new("ord_8f0c").unwrap());
        let cookie = set_cookie(&token, true);

        assert!(cookie.starts_with("pending_order_id=ord_8f0c"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));

        // At least 7 days, per the resumability requirement
        let max_age: u64 = cookie
            .split("Max-Age=")
            .nth(1)
            .and_then(|s| s.split(';').next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(max_age >= 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_cookie(false);
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.starts_with("pending_order_id=;"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_set_then_parse_roundtrip() {
        let token = ResumeToken::new(OrderId::new("ord_8f0c").unwrap());
        let set = set_cookie(&token, false);
        let pair = set.split(';').next().unwrap();
        assert_eq!(from_cookie_header(pair).unwrap(), token);
    }

    #[test]
    fn test_shared_store_read_is_not_a_mutation() {
        let token = ResumeToken::new(OrderId::new("ord_8f0c").unwrap());
        let store = SharedPendingStore::seeded(Some(token.clone()));

        assert_eq!(store.get(), Some(token));
        assert_eq!(store.get(), store.get());
        assert!(store.take_cookie_update(false).is_none());
    }

    #[test]
    fn test_shared_store_set_emits_cookie() {
        let store = SharedPendingStore::seeded(None);
        store.set(ResumeToken::new(OrderId::new("ord_8f0c").unwrap()));

        let cookie = store.take_cookie_update(false).unwrap();
        assert!(cookie.starts_with("pending_order_id=ord_8f0c"));
        // Update consumed; nothing further to flush
        assert!(store.take_cookie_update(false).is_none());
    }

    #[test]
    fn test_shared_store_clear_emits_expiry() {
        let store =
            SharedPendingStore::seeded(Some(ResumeToken::new(OrderId::new("ord_8f0c").unwrap())));
        store.clear();

        let cookie = store.take_cookie_update(false).unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert!(store.get().is_none());
    }
}
