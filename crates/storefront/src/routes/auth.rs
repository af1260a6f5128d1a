//! Authentication route handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{Email, UserId};

use crate::cart;
use crate::error::{self, AppError, Result};
use crate::events::AppEvent;
use crate::middleware::RequireAuth;
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Credentials body shared by register/login/restore.
#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
}

/// Public account view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: UserId,
    pub email: Email,
    pub email_verified: bool,
}

/// Register a new account. A verification mail goes out best-effort.
#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<(StatusCode, Json<AccountView>)> {
    let service = AuthService::new(state.pool(), state.mailer(), &state.config().base_url);
    let user = service.register(&body.email, &body.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountView {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
        }),
    ))
}

/// Login. Merges the session cart with the backend copy (backend data
/// wins on collision, quantities are summed) and broadcasts the identity
/// change to other tabs.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<AccountView>> {
    let service = AuthService::new(state.pool(), state.mailer(), &state.config().base_url);
    let user = service.login(&body.email, &body.password).await?;

    // Merge carts now that we know who this is.
    let mut current_cart = cart::load(&session).await;
    match state.commerce().get_cart(user.id).await {
        Ok(server_items) => current_cart.merge_server(server_items),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "server cart fetch failed, keeping session cart");
        }
    }
    cart::save(&session, &current_cart)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if let Err(e) = state.commerce().put_cart(user.id, current_cart.items()).await {
        tracing::warn!(user_id = %user.id, error = %e, "merged cart push failed");
    }

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    error::set_sentry_user(&user.id, Some(user.email.as_str()));
    state
        .events()
        .publish(AppEvent::AuthChanged { user_id: user.id });

    Ok(Json(AccountView {
        id: user.id,
        email: user.email,
        email_verified: user.email_verified,
    }))
}

/// Logout: drop the session identity and broadcast to every tab.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    error::clear_sentry_user();
    state.events().publish(AppEvent::LogoutBroadcast);

    Ok(StatusCode::NO_CONTENT)
}

/// Query of `GET /auth/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// Response of `GET /auth/verify`.
#[derive(Debug, Serialize)]
pub struct VerifyView {
    pub verified: bool,
}

/// Consume an email verification token.
#[instrument(skip(state, query))]
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyView>> {
    let service = AuthService::new(state.pool(), state.mailer(), &state.config().base_url);
    service.verify_email(&query.token).await?;

    Ok(Json(VerifyView { verified: true }))
}

/// Soft-delete the logged-in account. The session ends; the account stays
/// restorable within the retention window.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn deactivate(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    let service = AuthService::new(state.pool(), state.mailer(), &state.config().base_url);
    service.deactivate(user.id).await?;

    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    error::clear_sentry_user();
    state.events().publish(AppEvent::LogoutBroadcast);

    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted account (password required) and log back in.
#[instrument(skip(state, session, body))]
pub async fn restore(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<AccountView>> {
    let service = AuthService::new(state.pool(), state.mailer(), &state.config().base_url);
    let user = service.restore(&body.email, &body.password).await?;

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    error::set_sentry_user(&user.id, Some(user.email.as_str()));
    state
        .events()
        .publish(AppEvent::AuthChanged { user_id: user.id });

    Ok(Json(AccountView {
        id: user.id,
        email: user.email,
        email_verified: user.email_verified,
    }))
}
