//! User account management commands.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

use atelier_core::Email;
use atelier_storefront::db::users::UserRepository;

use super::{CommandError, database_url};

/// Minimum password length accepted from the CLI.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Create a new user account.
///
/// # Errors
///
/// Returns an error for an invalid email, a weak password, or a database
/// failure (including an already-registered email).
pub async fn create(email: &str, password: &str) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::InvalidInput(e.to_string()))?;

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(CommandError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CommandError::InvalidInput(format!("password hashing failed: {e}")))?
        .to_string();

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    let user = users.create_with_password(&email, &password_hash).await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(())
}

/// Mark a user's email as verified (support tooling).
///
/// # Errors
///
/// Returns an error if the user does not exist or the update fails.
pub async fn verify(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::InvalidInput(e.to_string()))?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CommandError::InvalidInput(format!("no user with email {email}")))?;

    users.verify_email(user.id).await?;

    info!(user_id = %user.id, email = %user.email, "email marked verified");
    Ok(())
}

async fn connect() -> Result<PgPool, CommandError> {
    let database_url = database_url()?;
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}
