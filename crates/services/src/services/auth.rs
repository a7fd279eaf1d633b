//! Login and token verification for the management console.

use chrono::{Duration, Utc};
use db::models::{
    permission::Permission,
    user::{User, UserStatus},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("user is inactive")]
    Inactive,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role_id: Option<Uuid>,
    pub permission_codes: Vec<String>,
}

/// Salted SHA-256 digest, hex encoded.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct AuthService;

impl AuthService {
    pub async fn login(
        pool: &SqlitePool,
        secret: &str,
        ttl_hours: i64,
        request: LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let user = User::find_by_username(pool, &request.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if hash_password(&request.password, &user.salt) != user.password_hash {
            return Err(AuthError::InvalidCredentials);
        }
        if user.status != UserStatus::Active {
            return Err(AuthError::Inactive);
        }

        let token = Self::issue_token(secret, ttl_hours, &user)?;
        let profile = Self::profile(pool, &user).await?;

        info!(user_id = %user.id, username = %user.username, "user logged in");

        Ok(LoginResponse {
            token,
            user: profile,
        })
    }

    pub fn issue_token(secret: &str, ttl_hours: i64, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Profile with the permission codes of the user's role.
    pub async fn profile(pool: &SqlitePool, user: &User) -> Result<UserProfile, AuthError> {
        let permission_codes = match user.role_id {
            Some(role_id) => Permission::find_by_role_id(pool, role_id)
                .await?
                .into_iter()
                .map(|p| p.code)
                .collect(),
            None => Vec::new(),
        };

        Ok(UserProfile {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            role_id: user.role_id,
            permission_codes,
        })
    }

    pub async fn current_user(
        pool: &SqlitePool,
        secret: &str,
        token: &str,
    ) -> Result<UserProfile, AuthError> {
        let claims = Self::verify_token(secret, token)?;
        let user = User::find_by_id(pool, claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        Self::profile(pool, &user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn password_hash_is_stable_and_salted() {
        let a = hash_password("hunter2", "salt-a");
        assert_eq!(a, hash_password("hunter2", "salt-a"));
        assert_ne!(a, hash_password("hunter2", "salt-b"));
        assert_ne!(a, hash_password("hunter3", "salt-a"));
    }

    #[tokio::test]
    async fn login_round_trip_and_token_verification() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let salt = "pepper";
        let user = User::create(
            pool,
            "admin",
            &hash_password("s3cret", salt),
            salt,
            Some("Admin"),
            None,
        )
        .await
        .unwrap();

        let response = AuthService::login(
            pool,
            SECRET,
            24,
            LoginRequest {
                username: "admin".to_string(),
                password: "s3cret".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(response.user.id, user.id);

        let claims = AuthService::verify_token(SECRET, &response.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "admin");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        User::create(pool, "admin", &hash_password("right", "s"), "s", None, None)
            .await
            .unwrap();

        let err = AuthService::login(
            pool,
            SECRET,
            24,
            LoginRequest {
                username: "admin".to_string(),
                password: "wrong".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = AuthService::verify_token(SECRET, "not-a-token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
