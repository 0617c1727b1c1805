use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::{AuthError, AuthResult};

const DEFAULT_ISSUER: &str = "leadstore";
const DEFAULT_AUDIENCE: &str = "leadstore-api";
const DEFAULT_TTL_SECS: i64 = 900;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String, audience: String, ttl_secs: i64) -> Self {
        let secret_bytes = secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience.clone()]);
        validation.set_issuer(&[issuer.clone()]);
        validation.leeway = 30;

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation,
            issuer,
            audience,
            access_token_ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn from_env() -> AuthResult<Self> {
        let secret = std::env::var("LEADSTORE_JWT_SECRET")
            .map_err(|_| AuthError::Config("LEADSTORE_JWT_SECRET not set".into()))?;
        let issuer =
            std::env::var("LEADSTORE_JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.into());
        let audience =
            std::env::var("LEADSTORE_JWT_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.into());
        let ttl_secs = std::env::var("LEADSTORE_JWT_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);

        Ok(Self::new(&secret, issuer, audience, ttl_secs))
    }

    /// Mint an access token for a resolved principal. Exposed mainly for
    /// local tooling and tests; production tokens come from the identity
    /// collaborator.
    pub fn issue_access_token(
        &self,
        user_id: i32,
        email: &str,
        role: &str,
    ) -> AuthResult<SignedAccessToken> {
        let now = Utc::now();
        let expires_at = now + self.access_token_ttl;

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            email: email.to_string(),
            role: role.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(SignedAccessToken { token, expires_at })
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(
            "super-secret-test-key",
            DEFAULT_ISSUER.into(),
            DEFAULT_AUDIENCE.into(),
            900,
        )
    }

    #[test]
    fn issues_and_decodes_access_tokens() {
        let service = service();
        let token = service
            .issue_access_token(42, "user@example.com", "user")
            .expect("issue token");

        let claims = service
            .decode_access_token(&token.token)
            .expect("decode token");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let other = JwtService::new(
            "different-secret",
            DEFAULT_ISSUER.into(),
            DEFAULT_AUDIENCE.into(),
            900,
        );
        let token = other
            .issue_access_token(1, "user@example.com", "user")
            .expect("issue token");

        assert!(service().decode_access_token(&token.token).is_err());
    }
}
