use std::fmt::{Debug, Formatter};

use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;

use crate::error::{DriveError, NOT_AUTHENTICATED, SESSION_EXPIRED};

/// Header set by the upstream OAuth layer when refreshing the token failed.
pub const SESSION_ERROR_HEADER: &str = "x-session-error";

/// Bearer credential for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expired: bool,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expired: false,
        }
    }
    pub fn expired(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expired: true,
        }
    }
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expired", &self.expired)
            .finish()
    }
}

/// Checked before every remote call.
pub fn require_credential(credential: Option<&Credential>) -> Result<&Credential, DriveError> {
    match credential {
        None => Err(DriveError::Auth(NOT_AUTHENTICATED.to_string())),
        Some(c) if c.access_token.trim().is_empty() => {
            Err(DriveError::Auth(NOT_AUTHENTICATED.to_string()))
        }
        Some(c) if c.expired => Err(DriveError::Auth(SESSION_EXPIRED.to_string())),
        Some(c) => Ok(c),
    }
}

/// Supplies the credential of an inbound request.
pub trait SessionProvider: Send + Sync {
    fn credential(&self, headers: &HeaderMap) -> Option<Credential>;
}

/// Reads `Authorization: Bearer <token>`; the session error header marks the
/// token expired.
#[derive(Debug, Clone, Default)]
pub struct BearerSession;

impl SessionProvider for BearerSession {
    fn credential(&self, headers: &HeaderMap) -> Option<Credential> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        if headers.contains_key(SESSION_ERROR_HEADER) {
            Some(Credential::expired(token))
        } else {
            Some(Credential::new(token))
        }
    }
}
