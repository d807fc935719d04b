use serde::{Deserialize, Serialize};

use eggmart_core::UserId;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Authenticated user for a request.
///
/// Inserted by the auth middleware; every protected route can rely on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
