//! Stateless HS256 session tokens.
//!
//! Tokens are compact JWS strings `header.claims.signature`, each part
//! base64url without padding. Nothing is stored server side: a token is valid
//! when its MAC checks out under the configured secret and it has not expired.
//! Rotating the secret invalidates every outstanding token.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::storage::{AppId, User, UserId};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_ALG: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub uid: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<AppId>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("signing secret is not configured")]
    MissingSecret,
}

impl TokenError {
    /// Whether this error rejects the presented token, as opposed to a
    /// server-side signing problem.
    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        !matches!(self, Self::MissingSecret)
    }
}

/// Signing secret, token lifetime and clock-skew tolerance.
pub struct TokenConfig {
    secret: SecretSlice<u8>,
    ttl: Duration,
    leeway: Duration,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: SecretSlice::from(secret.into()),
            ttl,
            leeway: Duration::ZERO,
        }
    }

    /// Accept tokens up to `leeway` past their expiry.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"***")
            .field("ttl", &self.ttl)
            .field("leeway", &self.leeway)
            .finish()
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn duration_seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Debug)]
pub struct TokenIssuer {
    config: TokenConfig,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        let secret = self.config.secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        HmacSha256::new_from_slice(secret).map_err(|_| TokenError::MissingSecret)
    }

    /// Issue a token for `user` valid for the configured TTL.
    ///
    /// # Errors
    /// Returns `MissingSecret` when no signing secret is configured.
    pub fn issue(&self, user: &User, app_id: Option<AppId>) -> Result<String, TokenError> {
        self.issue_at(user, app_id, now_unix_seconds())
    }

    /// Issue a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// Returns `MissingSecret` when no signing secret is configured.
    pub fn issue_at(
        &self,
        user: &User,
        app_id: Option<AppId>,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            uid: user.id,
            email: user.email.clone(),
            app_id,
            iat: now,
            exp: now.saturating_add(duration_seconds(self.config.ttl)),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut mac = self.mac()?;
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Validate a token and return the user id it was issued for.
    ///
    /// # Errors
    /// Returns an invalid-token error for malformed input, a foreign
    /// algorithm, a bad signature or an expired token.
    pub fn validate(&self, token: &str) -> Result<UserId, TokenError> {
        self.decode_at(token, now_unix_seconds())
            .map(|claims| claims.uid)
    }

    /// Validate a token as if the current time were `now` (unix seconds)
    /// and return its claims.
    ///
    /// # Errors
    /// Returns an invalid-token error for malformed input, a foreign
    /// algorithm, a bad signature or an expired token.
    pub fn decode_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        if parts.next().is_some() {
            return Err(TokenError::TokenFormat);
        }

        // Reject foreign algorithms (including "none") before touching the key.
        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        let leeway = duration_seconds(self.config.leeway);
        if now > claims.exp.saturating_add(leeway) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
