/// JWT Token Service
///
/// Issues and verifies HMAC-signed bearer tokens for API callers
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// JWT TOKEN CLAIMS
// =============================================================================

/// JWT token claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (caller user ID)
    pub sub: String,

    /// JWT ID (unique token identifier)
    pub jti: String,

    /// Issued at timestamp (seconds since epoch)
    pub iat: i64,

    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,

    /// Not before timestamp
    pub nbf: i64,

    /// Issuer
    pub iss: String,
}

impl TokenClaims {
    /// Create new token claims starting now
    pub fn new(subject: impl Into<String>, issuer: impl Into<String>, ttl_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.into(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl_seconds,
            nbf: now,
            iss: issuer.into(),
        }
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

// =============================================================================
// JWT SERVICE
// =============================================================================

/// JWT token service
///
/// Holds the shared secret keys; cheap to share behind an `Arc`
pub struct JwtService {
    algorithm: Algorithm,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str, algorithm: Algorithm, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            algorithm,
            issuer,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign a token for `subject` valid for `ttl_seconds`
    pub fn issue(&self, subject: &str, ttl_seconds: i64) -> Result<(String, TokenClaims), TokenError> {
        let claims = TokenClaims::new(subject, self.issuer.clone(), ttl_seconds);
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    /// Sign arbitrary claims with the configured key
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate signature, issuer and time claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}
