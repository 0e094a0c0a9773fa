use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DriveError;
use crate::google_drive::DriveId;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
/// Uploads above this size are rejected before reaching the store.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const UPLOAD_TOO_LARGE: &str = "File size exceeds the 20MB limit. Please upload a smaller file.";

/// The per-user backing folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFolder {
    pub id: DriveId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

/// Read-only projection of a remote file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: DriveId,
    pub name: String,
    pub mime_type: String,
    /// Byte count, string encoded the way the Drive API encodes int64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

impl FileEntry {
    /// The parsed size, or `None` when absent or not a non-negative integer.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.trim().parse::<u64>().ok())
    }
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Reader,
    Commenter,
    Writer,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Reader => "reader",
            ShareRole::Commenter => "commenter",
            ShareRole::Writer => "writer",
        }
    }
}

impl FromStr for ShareRole {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(ShareRole::Reader),
            "commenter" => Ok(ShareRole::Commenter),
            "writer" => Ok(ShareRole::Writer),
            _ => Err(DriveError::validation(
                "Invalid role. Must be reader, writer, or commenter",
            )),
        }
    }
}

impl Display for ShareRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// A request to grant one user access to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGrant {
    pub file_id: DriveId,
    pub email: String,
    pub role: ShareRole,
}

impl ShareGrant {
    /// Checks every field; nothing here talks to the store.
    pub fn new(file_id: impl Into<DriveId>, email: &str, role: &str) -> Result<Self, DriveError> {
        let file_id = file_id.into();
        if file_id.as_str().trim().is_empty() {
            return Err(DriveError::validation("File ID is required"));
        }
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(DriveError::validation(format!(
                "Invalid email address: {}",
                email
            )));
        }
        let role = role.parse::<ShareRole>()?;
        Ok(Self {
            file_id,
            email: email.to_string(),
            role,
        })
    }
}

/// A permission as created by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: ShareRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: mime::Mime,
    pub folder_id: Option<DriveId>,
    pub content: Bytes,
}

impl FileUpload {
    /// Validates name and size. An absent or unparseable MIME type falls back
    /// to `application/octet-stream`.
    pub fn new(
        name: &str,
        mime_type: Option<&str>,
        folder_id: Option<DriveId>,
        content: Bytes,
    ) -> Result<Self, DriveError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DriveError::validation("No file provided"));
        }
        check_upload_size(content.len())?;
        let mime_type = mime_type
            .filter(|m| !m.trim().is_empty())
            .and_then(|m| m.parse::<mime::Mime>().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        Ok(Self {
            name: name.to_string(),
            mime_type,
            folder_id,
            content,
        })
    }
}

pub fn check_upload_size(len: usize) -> Result<(), DriveError> {
    if len > MAX_UPLOAD_BYTES {
        return Err(DriveError::validation(UPLOAD_TOO_LARGE));
    }
    Ok(())
}

/// Name and type of a stored file, fetched before its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub name: String,
    pub mime_type: String,
    pub content: Bytes,
}
