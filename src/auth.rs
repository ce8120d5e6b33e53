//! Session tokens issued by the identity provider (HS256 JWTs).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::models::AuthPayload;

/// Verifies bearer tokens against the identity provider's secret key.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a token valid for `ttl_secs` (development tooling and tests).
    pub fn issue(
        &self,
        mut claims: AuthPayload,
        ttl_secs: u64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        claims.exp = chrono::Utc::now().timestamp().max(0) as usize + ttl_secs as usize;
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn validate(&self, token: &str) -> Result<AuthPayload, jsonwebtoken::errors::Error> {
        let token_data = decode::<AuthPayload>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(token_data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
