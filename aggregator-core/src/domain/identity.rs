//! Identity domain model
//!
//! Shapes of the identity carried by inbound requests, as produced by the
//! platform gateway (identity header) or by a developer JWT in debug mode.

use serde::{Deserialize, Serialize};

/// Account number of the calling user
pub type UserId = String;

/// Organization the caller belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internal {
    #[serde(default)]
    pub org_id: String,
}

/// Verified identity attached to a request before it reaches handlers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub account_number: UserId,
    #[serde(default)]
    pub internal: Internal,
}

impl Identity {
    pub fn new(account_number: impl Into<UserId>, org_id: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            internal: Internal {
                org_id: org_id.into(),
            },
        }
    }

    pub fn user_id(&self) -> &str {
        &self.account_number
    }

    pub fn org_id(&self) -> &str {
        &self.internal.org_id
    }
}

/// Decoded identity header document
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub identity: Identity,
}

/// Payload segment of a developer JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtPayload {
    #[serde(default)]
    pub account_number: UserId,
    #[serde(default)]
    pub org_id: String,
}

impl From<JwtPayload> for Identity {
    fn from(payload: JwtPayload) -> Self {
        Identity::new(payload.account_number, payload.org_id)
    }
}
