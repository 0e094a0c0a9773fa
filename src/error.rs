use std::fmt::{Display, Formatter};

use thiserror::Error;

pub const NOT_AUTHENTICATED: &str = "Not authenticated";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Error)]
pub enum DriveError {
    /// Missing or expired credential. Always raised before any remote call.
    #[error("{0}")]
    Auth(String),
    /// Bad input caught before any remote call.
    #[error("{0}")]
    Validation(String),
    /// Failure reported by the remote store.
    #[error("remote store error ({}): {message}", StatusDisplay(.status))]
    RemoteStore {
        status: Option<u16>,
        message: String,
    },
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl DriveError {
    pub fn validation(message: impl Into<String>) -> Self {
        DriveError::Validation(message.into())
    }
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        DriveError::RemoteStore {
            status,
            message: message.into(),
        }
    }
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            DriveError::RemoteStore { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<anyhow::Error> for DriveError {
    fn from(e: anyhow::Error) -> Self {
        DriveError::Unknown(format!("{:#}", e))
    }
}

struct StatusDisplay<'a>(&'a Option<u16>);

impl Display for StatusDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{}", code),
            None => write!(f, "no status"),
        }
    }
}
