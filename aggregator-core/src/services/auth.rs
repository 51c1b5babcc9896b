//! Auth service - turns request headers into a verified identity
//!
//! In production the gateway sends a base64-encoded identity document in
//! the identity header. In debug mode a developer JWT is taken from the
//! `Authorization: Bearer <token>` header instead and only its payload
//! segment is read.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::domain::result::{Error, Result};
use crate::domain::{Identity, JwtPayload, Token};

/// Header carrying the identity document in production
pub const IDENTITY_HEADER: &str = "x-rh-identity";

/// Header carrying the developer JWT in debug mode
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Identity decoding for inbound requests
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthService {
    debug: bool,
}

impl AuthService {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Name of the header this service reads
    pub fn header_name(&self) -> &'static str {
        if self.debug {
            AUTHORIZATION_HEADER
        } else {
            IDENTITY_HEADER
        }
    }

    /// Resolve the caller's identity from the relevant header values
    pub fn identity_from_headers(
        &self,
        identity_header: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Identity> {
        if self.debug {
            self.identity_from_bearer(authorization.unwrap_or_default())
        } else {
            self.identity_from_header(identity_header.unwrap_or_default())
        }
    }

    /// Decode an identity header value
    pub fn identity_from_header(&self, value: &str) -> Result<Identity> {
        if value.is_empty() {
            return Err(Error::MissingToken);
        }
        let token: Token = serde_json::from_slice(&decode_segment(value)?)
            .map_err(|_| Error::MalformedToken)?;
        Ok(token.identity)
    }

    /// Decode an `Authorization` header holding `<scheme> <jwt>`
    pub fn identity_from_bearer(&self, value: &str) -> Result<Identity> {
        let parts: Vec<&str> = value.split(' ').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidAuthHeader);
        }

        let payload = parts[1].split('.').nth(1).ok_or(Error::MalformedToken)?;
        if payload.is_empty() {
            return Err(Error::MissingToken);
        }
        let payload: JwtPayload = serde_json::from_slice(&decode_segment(payload)?)
            .map_err(|_| Error::MalformedToken)?;
        Ok(payload.into())
    }
}

/// Base64url with optional padding, falling back to the standard alphabet
fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(segment))
        .map_err(|_| Error::MalformedToken)
}
