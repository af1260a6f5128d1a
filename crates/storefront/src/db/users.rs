//! User repository for database operations.
//!
//! Queries are runtime-checked (`sqlx::query` with explicit row mapping) so
//! the crate builds without a live database connection.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use atelier_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::User;

/// Retention window for soft-deleted accounts, in days.
pub const RESTORE_WINDOW_DAYS: i32 = 30;

const USER_COLUMNS: &str = "id, email, email_verified, deleted_at, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

fn map_user(row: &PgRow) -> Result<User, RepositoryError> {
    let raw_email: String = row.try_get("email")?;
    let email = Email::parse(&raw_email).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
    })?;

    Ok(User {
        id: UserId::new(row.try_get("id")?),
        email,
        email_verified: row.try_get("email_verified")?,
        deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address (including soft-deleted ones).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.\"user\" WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.\"user\" WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    /// Create a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO storefront.\"user\" (email) VALUES ($1) RETURNING {USER_COLUMNS}"
        ))
        .bind(email.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        let user = map_user(&row)?;

        sqlx::query("INSERT INTO storefront.user_password (user_id, password_hash) VALUES ($1, $2)")
            .bind(user.id.as_i32())
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Get a user's password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    /// Soft-deleted users are returned so the caller can distinguish a
    /// deactivated account from invalid credentials.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.email_verified, u.deleted_at, u.created_at, u.updated_at, \
                    p.password_hash \
             FROM storefront.\"user\" u \
             JOIN storefront.user_password p ON u.id = p.user_id \
             WHERE u.email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = map_user(&row)?;
        let password_hash: String = row.try_get("password_hash")?;

        Ok(Some((user, password_hash)))
    }

    /// Mark a user's email as verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn verify_email(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.\"user\" SET email_verified = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(user_id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Store a one-shot email verification token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_verification_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.email_verification_token (token, user_id, expires_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(token)
        .bind(user_id.as_i32())
        .bind(expires_at)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "token already exists"))?;

        Ok(())
    }

    /// Consume a verification token, returning the user it belongs to.
    ///
    /// The token is deleted whether or not it has expired; expired tokens
    /// return `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let row = sqlx::query(
            "DELETE FROM storefront.email_verification_token \
             WHERE token = $1 \
             RETURNING user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        if expires_at < Utc::now() {
            return Ok(None);
        }

        Ok(Some(UserId::new(row.try_get("user_id")?)))
    }

    /// Soft-delete a user account.
    ///
    /// The row is kept so the account can be restored within the retention
    /// window; only `deleted_at` is stamped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist or is
    /// already deleted.
    pub async fn soft_delete(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.\"user\" SET deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Restore a soft-deleted account within the retention window.
    ///
    /// Returns the restored user, or `NotFound` if the account isn't
    /// deleted or the window has passed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was restorable.
    pub async fn restore(&self, email: &Email) -> Result<User, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE storefront.\"user\" \
             SET deleted_at = NULL, updated_at = now() \
             WHERE email = $1 \
               AND deleted_at IS NOT NULL \
               AND deleted_at > now() - make_interval(days => $2) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(RESTORE_WINDOW_DAYS)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => map_user(&row),
            None => Err(RepositoryError::NotFound),
        }
    }
}
