use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Caller identity resolved from a verified bearer token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Token subject; every contact batch is owned by this value
    pub sub: String,
}

impl AuthenticatedUser {
    pub fn new(sub: impl Into<String>) -> Self {
        Self { sub: sub.into() }
    }

    pub fn owner_id(&self) -> &str {
        &self.sub
    }
}
