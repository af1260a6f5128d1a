//! Authentication service.
//!
//! Password authentication with argon2 hashing, email verification via
//! one-shot tokens, and the account soft-delete/restore lifecycle.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;

use atelier_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::User;
use crate::services::mailer::Mailer;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Verification token validity in hours.
const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Authentication service.
///
/// Handles registration, login, email verification, and the
/// deactivate/restore lifecycle.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    mailer: &'a Mailer,
    base_url: &'a str,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, mailer: &'a Mailer, base_url: &'a str) -> Self {
        Self {
            users: UserRepository::new(pool),
            mailer,
            base_url,
        }
    }

    /// Register a new user with email and password.
    ///
    /// The verification mail is sent best-effort; a mail failure is logged
    /// and registration still succeeds (the user can re-request the mail).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        // Validate email
        let email = Email::parse(email)?;

        // Validate password
        validate_password(password)?;

        // Hash password
        let password_hash = hash_password(password)?;

        // Create user
        let user = self
            .users
            .create_with_password(&email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        if let Err(e) = self.send_verification_mail(&user).await {
            tracing::warn!(user_id = %user.id, error = %e, "verification mail not sent");
        }

        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDeactivated` for a soft-deleted account
    /// (correct password required, so the state isn't probeable).
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        // Validate email format
        let email = Email::parse(email)?;

        // Get user with password hash
        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Verify password
        verify_password(password, &password_hash)?;

        if user.is_deactivated() {
            return Err(AuthError::AccountDeactivated);
        }

        Ok(user)
    }

    /// Issue a fresh verification token and send the mail.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn request_verification(&self, user: &User) -> Result<(), AuthError> {
        self.send_verification_mail(user).await
    }

    /// Consume a verification token and mark the email verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for unknown, expired, or reused
    /// tokens.
    pub async fn verify_email(&self, token: &str) -> Result<UserId, AuthError> {
        let user_id = self
            .users
            .consume_verification_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        self.users.verify_email(user_id).await?;
        Ok(user_id)
    }

    /// Soft-delete an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account doesn't exist or is
    /// already deactivated.
    pub async fn deactivate(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.soft_delete(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })
    }

    /// Restore a soft-deleted account within the retention window.
    ///
    /// The password must verify first, so restoration cannot be used to
    /// probe deleted accounts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on a wrong password,
    /// `AuthError::UserNotFound` when nothing is restorable.
    pub async fn restore(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_deactivated() {
            // Nothing to restore; logging in normally is the right path
            return Ok(user);
        }

        self.users.restore(&email).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })
    }

    async fn send_verification_mail(&self, user: &User) -> Result<(), AuthError> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(TOKEN_VALIDITY_HOURS);
        self.users
            .create_verification_token(user.id, &token, expires_at)
            .await?;

        if let Err(e) = self
            .mailer
            .send_verification(&user.email, &token, self.base_url)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "failed to send verification mail");
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password with argon2.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::PasswordHash)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a URL-safe random verification token.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_too_short() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
