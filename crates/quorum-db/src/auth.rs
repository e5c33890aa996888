//! Token-based authentication over the `users` collection.
//!
//! Credentials and issued tokens live in meta tables next to the records.
//! Registration also creates the user's 1:1 profile. Tokens are opaque random
//! bytes with a server-side expiry; there is no refresh flow.

use crate::records::{Record, RecordStore};
use quorum_common::{QuorumError, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::info;

const TOKEN_TTL_DAYS: i64 = 14;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// An authenticated session: bearer token plus the user record it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: Record,
}

#[derive(Clone)]
pub struct AuthStore {
    store: RecordStore,
}

impl AuthStore {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Create a user plus its profile, and store the password hash.
    pub async fn register(&self, req: &RegisterRequest) -> Result<Record> {
        validate_username(&req.username)?;
        if req.password.len() < 8 {
            return Err(QuorumError::Validation("password must be at least 8 characters".into()));
        }
        if self.find_user(&req.username).await?.is_some()
            || self.find_user(&req.email).await?.is_some()
        {
            return Err(QuorumError::Validation("username or email already taken".into()));
        }

        let mut fields = Map::new();
        fields.insert("username".into(), Value::String(req.username.clone()));
        fields.insert("email".into(), Value::String(req.email.clone()));
        fields.insert("name".into(), Value::String(req.name.clone()));
        let user = self.store.create("users", fields, None).await?;

        let salt = random_hex(16);
        let hash = hash_password(&salt, &req.password);
        sqlx::query("INSERT INTO _credentials (user_id, password_hash, salt) VALUES (?, ?, ?)")
            .bind(&user.id)
            .bind(&hash)
            .bind(&salt)
            .execute(self.store.database().pool())
            .await?;

        self.store.create("profiles", Map::new(), Some(&user.id)).await?;

        info!(user = %user.id, username = %req.username, "registered");
        Ok(user)
    }

    /// Log in by username or email. Returns a fresh bearer token.
    pub async fn login(&self, identity: &str, password: &str) -> Result<AuthSession> {
        let user = self
            .find_user(identity)
            .await?
            .ok_or_else(|| QuorumError::Unauthorized("invalid credentials".into()))?;

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT password_hash, salt FROM _credentials WHERE user_id = ?")
                .bind(&user.id)
                .fetch_optional(self.store.database().pool())
                .await?;
        let (stored, salt) =
            row.ok_or_else(|| QuorumError::Unauthorized("invalid credentials".into()))?;
        if hash_password(&salt, password) != stored {
            return Err(QuorumError::Unauthorized("invalid credentials".into()));
        }

        let token = random_hex(32);
        let expires = (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).to_rfc3339();
        sqlx::query("INSERT INTO _tokens (token, user_id, expires) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(&user.id)
            .bind(&expires)
            .execute(self.store.database().pool())
            .await?;

        info!(user = %user.id, "logged in");
        Ok(AuthSession { token, user })
    }

    /// Resolve a bearer token to its user. Expired tokens are dropped.
    pub async fn verify(&self, token: &str) -> Result<Record> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT user_id, expires FROM _tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(self.store.database().pool())
                .await?;
        let (user_id, expires) =
            row.ok_or_else(|| QuorumError::Unauthorized("invalid token".into()))?;

        let expired = chrono::DateTime::parse_from_rfc3339(&expires)
            .map(|t| t.with_timezone(&chrono::Utc) < chrono::Utc::now())
            .unwrap_or(true);
        if expired {
            self.logout(token).await?;
            return Err(QuorumError::Unauthorized("token expired".into()));
        }
        self.store.get("users", &user_id, Some(&user_id)).await
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM _tokens WHERE token = ?")
            .bind(token)
            .execute(self.store.database().pool())
            .await?;
        Ok(())
    }

    /// Look up a user by username or email. Identities are user-supplied, so
    /// the comparison is done directly instead of through the filter language.
    async fn find_user(&self, identity: &str) -> Result<Option<Record>> {
        let rows: Vec<(String, String, String, String)> =
            sqlx::query_as("SELECT id, data, created, updated FROM rec_users")
                .fetch_all(self.store.database().pool())
                .await?;
        for (id, data, created, updated) in rows {
            let fields: Map<String, Value> = serde_json::from_str(&data)?;
            let hit = [fields.get("username"), fields.get("email")]
                .into_iter()
                .flatten()
                .any(|v| v.as_str() == Some(identity));
            if hit {
                return Ok(Some(Record { id, created, updated, fields }));
            }
        }
        Ok(None)
    }
}

fn validate_username(username: &str) -> Result<()> {
    let ok = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(QuorumError::Validation(format!("invalid username {username:?}")))
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_depends_on_salt() {
        let a = hash_password("aa", "secret");
        let b = hash_password("bb", "secret");
        assert_ne!(a, b);
        assert_eq!(a, hash_password("aa", "secret"));
    }

    #[test]
    fn username_validation() {
        assert!(validate_username("jane.doe-42").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("jane' || '1'='1").is_err());
    }

    #[test]
    fn random_hex_length() {
        assert_eq!(random_hex(32).len(), 64);
    }
}
