//! JWT utilities for token generation and validation
//!
//! Provides JWT token creation and validation using the HS256 algorithm.
//! Tokens live for 24 hours; each one is additionally backed by a session row
//! so it can be revoked before it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::db::models::Role;

/// Default token lifetime (24 hours)
const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Shortest operator-supplied secret accepted
pub const MIN_SECRET_LENGTH: usize = 32;

/// Size of a generated secret in bytes
const GENERATED_SECRET_LENGTH: usize = 32;

/// Where the signing secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    /// Supplied by the operator
    Configured,
    /// Generated at boot; tokens will not verify after a restart
    Generated,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    secret: Vec<u8>,
    /// Token lifetime in hours
    pub token_lifetime_hours: i64,
    /// Token issuer
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("token_lifetime_hours", &self.token_lifetime_hours)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_lifetime_hours: TOKEN_LIFETIME_HOURS,
            issuer: "warden".to_string(),
        }
    }

    /// Use the operator's secret when it is long enough, otherwise generate one.
    pub fn from_configured(secret: Option<&str>) -> (Self, SecretSource) {
        match secret {
            Some(secret) if secret.len() >= MIN_SECRET_LENGTH => {
                (Self::new(secret.as_bytes()), SecretSource::Configured)
            }
            Some(_) => {
                tracing::warn!(
                    min_length = MIN_SECRET_LENGTH,
                    "JWT_SECRET is too short and was ignored; generating a random signing secret"
                );
                (Self::generated(), SecretSource::Generated)
            }
            None => (Self::generated(), SecretSource::Generated),
        }
    }

    fn generated() -> Self {
        let mut secret = vec![0u8; GENERATED_SECRET_LENGTH];
        OsRng.fill_bytes(&mut secret);
        Self::new(secret)
    }

    /// Set token lifetime
    pub fn token_lifetime(mut self, hours: i64) -> Self {
        self.token_lifetime_hours = hours;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Account role at issue time
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    /// Get account ID as UUID
    pub fn account_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// A freshly signed token and its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&config.secret);
        let decoding_key = DecodingKey::from_secret(&config.secret);

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Sign a token for an account
    pub fn generate_token(&self, account_id: Uuid, role: Role) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.token_lifetime_hours);

        let claims = Claims {
            sub: account_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate signature, structure and embedded expiry, returning the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::hours(self.config.token_lifetime_hours)
    }
}
