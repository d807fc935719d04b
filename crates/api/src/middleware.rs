use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use thiserror::Error;

use crate::context::{AccessClaims, UserContext};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<AccessClaims, TokenError>;
}

/// HS256 bearer token validator.
pub struct Hs256Validator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Validator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenValidator for Hs256Validator {
    fn validate(&self, token: &str) -> Result<AccessClaims, TokenError> {
        jsonwebtoken::decode::<AccessClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = state.tokens.validate(token).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(UserContext::new(claims.sub));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eggmart_core::UserId;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &[u8], claims: &AccessClaims) -> String {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    fn in_one_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn accepts_a_valid_token() {
        let user = UserId::new();
        let token = mint(b"secret", &AccessClaims { sub: user, exp: in_one_hour() });
        let claims = Hs256Validator::new(b"secret").validate(&token).unwrap();
        assert_eq!(claims.sub, user);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let validator = Hs256Validator::new(b"secret");

        let forged = mint(b"other", &AccessClaims { sub: UserId::new(), exp: in_one_hour() });
        assert!(matches!(validator.validate(&forged), Err(TokenError::Invalid(_))));

        let stale = mint(
            b"secret",
            &AccessClaims {
                sub: UserId::new(),
                exp: chrono::Utc::now().timestamp() - 3600,
            },
        );
        assert_eq!(validator.validate(&stale), Err(TokenError::Expired));
    }

    #[test]
    fn bearer_header_must_be_present_and_non_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(axum::http::header::AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Ok("abc"));
    }
}
