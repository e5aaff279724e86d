use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use elite_domain::user::{AuthMethod, AuthSession, User};
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::SqlitePool;

use crate::error::StoreError;

const SESSION_TTL_DAYS: i64 = 7;

pub struct UserRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    password_hash: Option<String>,
    google_id: Option<String>,
    picture_url: Option<String>,
    auth_method: String,
    verified: i64,
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone, password_hash, \
                            google_id, picture_url, auth_method, verified";

fn into_user(row: UserRow) -> User {
    User {
        id: row.id,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        password_hash: row.password_hash,
        google_id: row.google_id,
        picture_url: row.picture_url,
        auth_method: if row.auth_method == "google" {
            AuthMethod::Google
        } else {
            AuthMethod::Email
        },
        verified: row.verified != 0,
    }
}

/// Opaque bearer token: user id, issue timestamp, and 24 bytes of OS
/// randomness, base64'd with the URL-unsafe characters stripped. Worthless
/// without the matching auth_sessions row.
fn mint_token(user_id: i64) -> String {
    let mut random = [0u8; 24];
    OsRng.fill_bytes(&mut random);

    let raw = format!(
        "{}.{}.{}",
        user_id,
        Utc::now().timestamp_millis(),
        BASE64.encode(random)
    );
    BASE64
        .encode(raw)
        .chars()
        .filter(|c| !matches!(c, '+' | '/' | '='))
        .collect()
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER(?)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }

    pub async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = ?"
        ))
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(into_user))
    }

    pub async fn create_email_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
    ) -> Result<User, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users \
                 (email, first_name, last_name, phone, password_hash, auth_method, verified, \
                  created_at) \
             VALUES (?, ?, ?, ?, ?, 'email', 1, ?)",
        )
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(phone)
        .bind(password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid())
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn create_google_user(
        &self,
        google_id: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
        picture_url: Option<&str>,
    ) -> Result<User, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users \
                 (email, first_name, last_name, phone, google_id, picture_url, auth_method, \
                  verified, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'google', 1, ?)",
        )
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(phone)
        .bind(google_id)
        .bind(picture_url)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid())
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    /// Attach a federated identity to an account first created by email.
    pub async fn attach_google_id(
        &self,
        user_id: i64,
        google_id: &str,
        picture_url: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET google_id = ?, picture_url = COALESCE(?, picture_url) WHERE id = ?",
        )
        .bind(google_id)
        .bind(picture_url)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upgrade a legacy password row after a successful legacy match.
    pub async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_session(&self, user_id: i64) -> Result<AuthSession, StoreError> {
        let token = mint_token(user_id);
        let expires_at = (Utc::now() + Duration::days(SESSION_TTL_DAYS)).timestamp();

        sqlx::query("INSERT INTO auth_sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(AuthSession {
            token,
            user_id,
            expires_at,
        })
    }

    /// Resolve a bearer token to its user. Expired or unknown tokens
    /// resolve to nothing; there is no refresh.
    pub async fn session_user(&self, token: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT u.id, u.email, u.first_name, u.last_name, u.phone, u.password_hash, \
                    u.google_id, u.picture_url, u.auth_method, u.verified \
             FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ? AND s.expires_at > ?",
        )
        .bind(token)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }

    /// Revocation is a row delete.
    pub async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Seed passenger row written at sign-up so the first booking form can
    /// prefill.
    pub async fn create_seed_passenger(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO passengers (first_name, last_name, email, phone, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
