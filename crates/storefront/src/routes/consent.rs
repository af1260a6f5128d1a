//! Consent route handlers.
//!
//! Grants and revocations both answer with `Set-Cookie` headers (the
//! consent record itself, plus expirations for purged cookies) and publish
//! a [`crate::events::AppEvent::ConsentChanged`] so other tabs re-render
//! their gated surfaces.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::ConsentCategory;

use crate::consent::{
    ConsentDecision, ConsentPreferences, ScriptRegistry, cookie_value, revoke,
};
use crate::error::{AppError, Result};
use crate::events::AppEvent;
use crate::models::session_keys;
use crate::payments::ProviderKind;
use crate::state::AppState;

/// Response of `GET /consent/preferences`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesView {
    pub decision: Option<String>,
    pub preferences: ConsentPreferences,
    pub granted: Vec<ConsentCategory>,
}

/// Current consent record, read from the request cookies.
#[instrument(skip(headers))]
pub async fn show_preferences(headers: HeaderMap) -> Result<Json<PreferencesView>> {
    let cookie_header = cookie_header(&headers);
    let preferences = ConsentPreferences::from_cookie_header(cookie_header);
    let decision = cookie_value(cookie_header, crate::consent::CONSENT_COOKIE)
        .map(std::string::ToString::to_string);

    Ok(Json(PreferencesView {
        decision,
        granted: preferences.granted_categories(),
        preferences,
    }))
}

/// Body of `PUT /consent/preferences`.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub decision: ConsentDecision,
    #[serde(default)]
    pub functional: bool,
    #[serde(default)]
    pub analytics: bool,
    #[serde(default)]
    pub targeting: bool,
}

/// Response of `PUT /consent/preferences`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateView {
    pub granted: Vec<ConsentCategory>,
    /// Script URLs to inject now - each appears at most once per session,
    /// so a re-entrant grant event cannot duplicate a script tag.
    pub activated_scripts: Vec<String>,
    /// Third-party cookies revocation could not delete.
    pub unmanageable: Vec<&'static str>,
    /// Provider SDKs whose consent APIs should be signaled.
    pub provider_signals: Vec<ProviderKind>,
}

/// Update the consent record.
///
/// Newly granted categories activate their scripts exactly once; newly
/// revoked categories get their first-party cookies purged.
#[instrument(skip(state, session, headers, body))]
pub async fn update_preferences(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Result<Response> {
    let cookie_header = cookie_header(&headers).to_owned();
    let old = ConsentPreferences::from_cookie_header(&cookie_header);

    let new = match body.decision {
        ConsentDecision::All => ConsentPreferences::all(),
        ConsentDecision::Necessary => ConsentPreferences::necessary_only(),
        ConsentDecision::Selected => ConsentPreferences {
            functional: body.functional,
            analytics: body.analytics,
            targeting: body.targeting,
        },
    };

    let secure = state.secure_cookies();
    let mut set_cookies = new.to_set_cookies(body.decision, secure);

    // Revoked categories: purge first-party cookies, collect signals.
    let mut unmanageable = Vec::new();
    let mut provider_signals = Vec::new();
    for category in ConsentCategory::ALL {
        if old.granted(category) && !new.granted(category) {
            let plan = revoke(category, &cookie_header, secure);
            set_cookies.extend(plan.delete_cookies);
            unmanageable.extend(plan.unmanageable);
            provider_signals.extend(plan.provider_signals);
        }
    }

    // Newly granted categories: activate their scripts, idempotently.
    let activated_scripts = activate_scripts(&state, &session, &old, &new).await?;

    state.events().publish(AppEvent::ConsentChanged {
        granted: new.granted_categories(),
    });

    let view = UpdateView {
        granted: new.granted_categories(),
        activated_scripts,
        unmanageable,
        provider_signals,
    };

    Ok(with_cookies(set_cookies, Json(view)))
}

/// Body of `POST /consent/revoke`.
#[derive(Debug, Deserialize)]
pub struct RevokeBody {
    pub category: ConsentCategory,
}

/// Response of `POST /consent/revoke`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeView {
    pub granted: Vec<ConsentCategory>,
    pub deleted_cookies: usize,
    pub unmanageable: Vec<&'static str>,
    pub provider_signals: Vec<ProviderKind>,
}

/// Revoke a single category.
#[instrument(skip(state, headers))]
pub async fn revoke_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RevokeBody>,
) -> Result<Response> {
    if body.category.is_always_granted() {
        return Err(AppError::BadRequest(format!(
            "the '{}' category cannot be revoked",
            body.category
        )));
    }

    let cookie_header = cookie_header(&headers).to_owned();
    let mut preferences = ConsentPreferences::from_cookie_header(&cookie_header);
    preferences.set(body.category, false);

    let secure = state.secure_cookies();
    let plan = revoke(body.category, &cookie_header, secure);

    let mut set_cookies = preferences.to_set_cookies(ConsentDecision::Selected, secure);
    let deleted_cookies = plan.delete_cookies.len();
    set_cookies.extend(plan.delete_cookies);

    state.events().publish(AppEvent::ConsentChanged {
        granted: preferences.granted_categories(),
    });

    let view = RevokeView {
        granted: preferences.granted_categories(),
        deleted_cookies,
        unmanageable: plan.unmanageable,
        provider_signals: plan.provider_signals,
    };

    Ok(with_cookies(set_cookies, Json(view)))
}

// =============================================================================
// Helpers
// =============================================================================

fn cookie_header(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Collect script URLs newly allowed by this change, marking each in the
/// session registry so repeats never re-inject.
async fn activate_scripts(
    state: &AppState,
    session: &Session,
    old: &ConsentPreferences,
    new: &ConsentPreferences,
) -> Result<Vec<String>> {
    let mut registry = session
        .get::<ScriptRegistry>(session_keys::ACTIVATED_SCRIPTS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    let mut activated = Vec::new();
    for provider in ProviderKind::ALL {
        let category = provider.consent_category();
        if !old.granted(category)
            && new.granted(category)
            && let Some(url) = provider.sdk_script_url(&state.config().providers)
            && registry.activate(&url)
        {
            activated.push(url);
        }
    }

    if !activated.is_empty() {
        session
            .insert(session_keys::ACTIVATED_SCRIPTS, &registry)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
    }

    Ok(activated)
}

fn with_cookies<R: IntoResponse>(cookies: Vec<String>, response: R) -> Response {
    let mut response = response.into_response();
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}
