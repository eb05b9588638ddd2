//! Authentication (§4.11 "two authenticators — signed-token and opaque
//! API-key"). The signed-token authenticator is grounded on
//! `dashflow-wasm-executor::auth::AuthContext` (`jsonwebtoken`, HS256,
//! `Claims { sub, role, iat, exp }`); the API-key authenticator is
//! grounded on the gateway's own spec text (SHA-256 lookup keyed by an
//! unexposed 8-char prefix).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entities::{ApiKey, AuthToken, Role, UserInfo};
use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    roles: Vec<Role>,
    permissions: Vec<String>,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 signed tokens (§4.11 "Token verification
/// yields a UserInfo").
pub struct TokenAuthenticator {
    secret: String,
    expiry: ChronoDuration,
}

impl TokenAuthenticator {
    pub fn new(secret: impl Into<String>, expiry_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            expiry: ChronoDuration::minutes(expiry_minutes),
        }
    }

    pub fn issue(&self, user: &UserInfo) -> Result<AuthToken> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.user_id.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
            permissions: user.permissions.clone(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(self.secret.as_bytes())).map_err(|e| GatewayError::Downstream(e.to_string()))?;
        Ok(AuthToken {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_in: self.expiry.num_seconds().max(0) as u64,
        })
    }

    pub fn verify(&self, token: &str) -> Result<UserInfo> {
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &Validation::new(Algorithm::HS256)).map_err(|_| GatewayError::Unauthorized)?;
        Ok(UserInfo {
            user_id: data.claims.sub,
            username: data.claims.username,
            roles: data.claims.roles,
            permissions: data.claims.permissions,
        })
    }
}

fn hash_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn key_prefix(raw_key: &str) -> String {
    raw_key.chars().take(8).collect()
}

/// In-memory API-key store, keyed by prefix for O(1) location (§4.11).
/// A Phase-1 local backend in the same spirit as the event recorder's
/// in-memory store — swappable for a shared backend without changing the
/// lookup contract.
#[derive(Default)]
pub struct ApiKeyAuthenticator {
    by_prefix: RwLock<HashMap<String, ApiKey>>,
}

impl ApiKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, raw_key: &str, mut record: ApiKey) {
        record.key_prefix = key_prefix(raw_key);
        record.key_hash = hash_key(raw_key);
        self.by_prefix.write().unwrap().insert(record.key_prefix.clone(), record);
    }

    /// §4.11: valid iff enabled, not expired, the requested API version is
    /// in its allowed set (if non-empty), and the requested service is in
    /// its allowed set (if non-empty).
    pub fn verify(&self, raw_key: &str, api_version: &str, service: &str) -> Result<UserInfo> {
        let prefix = key_prefix(raw_key);
        let store = self.by_prefix.read().unwrap();
        let record = store.get(&prefix).ok_or(GatewayError::Unauthorized)?;

        if record.key_hash != hash_key(raw_key) {
            return Err(GatewayError::Unauthorized);
        }
        if !record.enabled {
            return Err(GatewayError::Unauthorized);
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at <= Utc::now() {
                return Err(GatewayError::Unauthorized);
            }
        }
        if !record.allowed_api_versions.is_empty() && !record.allowed_api_versions.iter().any(|v| v == api_version) {
            return Err(GatewayError::Unauthorized);
        }
        if !record.allowed_services.is_empty() && !record.allowed_services.iter().any(|s| s == service) {
            return Err(GatewayError::Unauthorized);
        }
        Ok(record.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserInfo {
        UserInfo {
            user_id: "user-1".to_string(),
            username: "alice".to_string(),
            roles: vec![Role::Developer],
            permissions: vec!["scan:read".to_string()],
        }
    }

    #[test]
    fn issued_token_verifies_back_to_the_same_user() {
        let auth = TokenAuthenticator::new("a-very-long-shared-secret-for-testing", 15);
        let token = auth.issue(&sample_user()).unwrap();
        let verified = auth.verify(&token.access_token).unwrap();
        assert_eq!(verified.user_id, "user-1");
        assert_eq!(verified.roles, vec![Role::Developer]);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = TokenAuthenticator::new("a-very-long-shared-secret-for-testing", 15);
        let mut token = auth.issue(&sample_user()).unwrap().access_token;
        token.push('x');
        assert!(auth.verify(&token).is_err());
    }

    #[test]
    fn api_key_enforces_allowed_services() {
        let authenticator = ApiKeyAuthenticator::new();
        authenticator.register(
            "ak_testkey1234567890",
            ApiKey {
                key_hash: String::new(),
                key_prefix: String::new(),
                user: sample_user(),
                enabled: true,
                expires_at: None,
                allowed_api_versions: vec![],
                allowed_services: vec!["scan".to_string()],
            },
        );
        assert!(authenticator.verify("ak_testkey1234567890", "v1", "scan").is_ok());
        assert!(authenticator.verify("ak_testkey1234567890", "v1", "gateway").is_err());
    }

    #[test]
    fn disabled_key_is_rejected() {
        let authenticator = ApiKeyAuthenticator::new();
        authenticator.register(
            "ak_disabledkey12345",
            ApiKey {
                key_hash: String::new(),
                key_prefix: String::new(),
                user: sample_user(),
                enabled: false,
                expires_at: None,
                allowed_api_versions: vec![],
                allowed_services: vec![],
            },
        );
        assert!(authenticator.verify("ak_disabledkey12345", "v1", "scan").is_err());
    }
}
