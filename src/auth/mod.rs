//! Identity resolution: HS256 access-token decoding and Rocket request
//! guards. The core trusts the resolved `{id, email, role}` completely;
//! credential issuance lives outside this service.

use std::sync::Arc;

pub mod error;
pub mod guards;
pub mod jwt;

pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin, Role};
pub use jwt::{AccessTokenClaims, JwtService};

/// Managed Rocket state holding the token service.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(jwt_service: JwtService) -> Self {
        Self {
            jwt_service: Arc::new(jwt_service),
        }
    }

    /// Build the state from `LEADSTORE_JWT_SECRET` (and optional issuer /
    /// audience overrides).
    pub fn from_env() -> AuthResult<Self> {
        Ok(Self::new(JwtService::from_env()?))
    }
}
