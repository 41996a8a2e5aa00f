use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Issues and verifies the two token families. Access and refresh tokens are
/// signed with independent secrets so neither can stand in for the other.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_expiry: Duration,
    refresh_expiry: Duration,
}

impl TokenService {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_expiry: Duration::minutes(config.access_token_expiry_minutes),
            refresh_expiry: Duration::days(config.refresh_token_expiry_days),
        }
    }

    pub fn refresh_expiry(&self) -> Duration {
        self.refresh_expiry
    }

    pub fn issue_access_token(&self, employee_id: Uuid, email: &str) -> Result<String> {
        self.issue_access_with_expiry(employee_id, email, self.access_expiry)
    }

    fn issue_access_with_expiry(
        &self,
        employee_id: Uuid,
        email: &str,
        expiry: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: employee_id,
            email: email.to_owned(),
            iat: now.timestamp() as usize,
            exp: (now + expiry).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
    }

    pub fn issue_refresh_token(&self, employee_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: employee_id,
            iat: now.timestamp() as usize,
            exp: (now + self.refresh_expiry).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.refresh_encoding)?)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())?;
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}
