use hyper::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::error::DriveError;
use crate::model::{DownloadedFile, DEFAULT_MIME_TYPE};

/// The user action a handler performs, used to word surfaced errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EnsureFolder,
    CreateFolder,
    ListFiles,
    Upload,
    Download,
    Delete,
    Share,
}

impl Action {
    /// Object of "You don't have access to ...".
    fn access(&self) -> &'static str {
        match self {
            Action::EnsureFolder | Action::CreateFolder => "create folders",
            Action::ListFiles => "list files",
            Action::Upload => "upload files",
            Action::Download => "download files",
            Action::Delete => "delete files",
            Action::Share => "share files",
        }
    }
    fn failure(&self) -> &'static str {
        match self {
            Action::EnsureFolder | Action::CreateFolder => "Failed to create folder",
            Action::ListFiles => "Failed to list files",
            Action::Upload => "Failed to upload file",
            Action::Download => "Failed to download file",
            Action::Delete => "Failed to delete file",
            Action::Share => "Failed to share file",
        }
    }
}

/// A sanitized, user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Logs the diagnostic detail and returns what the caller is shown.
    pub fn from_drive(action: Action, e: &DriveError) -> Self {
        match e {
            DriveError::Auth(message) => {
                warn!(?action, "rejected unauthenticated request: {}", message);
                Self::new(StatusCode::UNAUTHORIZED, message.clone())
            }
            DriveError::Validation(message) => {
                warn!(?action, "rejected invalid request: {}", message);
                Self::bad_request(message.clone())
            }
            DriveError::RemoteStore { status, message } => {
                error!(?action, ?status, "remote store error: {}", message);
                match status {
                    Some(403) => Self::new(
                        StatusCode::FORBIDDEN,
                        format!(
                            "Permission denied. You don't have access to {}.",
                            action.access()
                        ),
                    ),
                    Some(404) if action == Action::Upload => Self::new(
                        StatusCode::NOT_FOUND,
                        "The specified folder was not found.",
                    ),
                    _ => Self::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("{}: {}", action.failure(), non_empty_or(message, "Unknown error")),
                    ),
                }
            }
            DriveError::Unknown(detail) => {
                error!(?action, "unexpected error: {}", detail);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}: Unknown error", action.failure()),
                )
            }
        }
    }

    pub fn into_response(self) -> Response<Body> {
        json_response(self.status, &json!({ "error": self.message }))
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("could not serialize response: {}", e);
            let mut response = Response::new(Body::from(r#"{"error":"Internal server error"}"#));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
    }
}

/// Header-safe file name: quotes, backslashes and non-printable or non-ASCII
/// characters become `_`.
fn attachment_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn download_response(file: DownloadedFile) -> Response<Body> {
    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MIME_TYPE));
    let disposition = format!("attachment; filename=\"{}\"", attachment_name(&file.name));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let mut response = Response::new(Body::from(file.content));
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response.headers_mut().insert(CONTENT_DISPOSITION, disposition);
    response
}
