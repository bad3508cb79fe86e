use crate::client::{decode, ApiClient};
use crate::error::{ApiError, ValidationError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credentials handed to an `ApiClient`. An anonymous context sends
/// no `Authorization` header.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn bearer<S: Into<String>>(token: S) -> Self {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Self::anonymous();
        }
        Self { token: Some(token) }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.token.is_none()
    }

    pub fn header_value(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {}", token))
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        self.token.as_deref().and_then(TokenClaims::decode)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.token.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("AuthContext").field("token", &state).finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn validated(&self) -> Result<Self, ValidationError> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingCredentials);
        }
        Ok(Self {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthToken {
    pub fn context(&self) -> AuthContext {
        AuthContext::bearer(self.access_token.clone())
    }
}

/// Unverified JWT payload fields. Only used to tell the user who a stored
/// token belongs to and whether it has expired.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.trim().split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| at <= now).unwrap_or(false)
    }
}

impl ApiClient {
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        let credentials = credentials.validated()?;
        debug!("Logging in as {}", credentials.username);
        let value = self.post(&["login"], &credentials).await?;
        let token: AuthToken = decode(value, "an access token object")?;
        info!("Logged in as {}", credentials.username);
        Ok(token)
    }

    pub async fn signup(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        let credentials = credentials.validated()?;
        debug!("Creating account {}", credentials.username);
        let value = self.post(&["signup"], &credentials).await?;
        let token: AuthToken = decode(value, "an access token object")?;
        info!("Created account {}", credentials.username);
        Ok(token)
    }
}
