use anyhow::{anyhow, Context};
use google_drive3::api::File;
use tracing::warn;

use crate::error::DriveError;
use crate::google_drive::DriveId;
use crate::model::{FileEntry, FileMetadata, UserFolder, DEFAULT_MIME_TYPE, FOLDER_MIME_TYPE};

/// Escapes a value for use inside single quotes in a Drive `q` string.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Maps a Drive client error to a store error, keeping the HTTP status when
/// the API reported one.
pub fn classify_error(error: google_drive3::Error) -> DriveError {
    match error {
        google_drive3::Error::BadRequest(value) => {
            let status = value
                .pointer("/error/code")
                .and_then(|c| c.as_u64())
                .and_then(|c| u16::try_from(c).ok());
            let message = value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            DriveError::remote(status, message)
        }
        google_drive3::Error::Failure(response) => {
            let status = response.status();
            DriveError::remote(
                Some(status.as_u16()),
                format!("request failed with status {}", status),
            )
        }
        other => {
            warn!("drive request failed without a status: {}", other);
            DriveError::remote(None, other.to_string())
        }
    }
}

pub fn file_entry_from_file(file: File) -> anyhow::Result<FileEntry> {
    let id = file
        .id
        .context(format!("file metadata has no id: {:?}", file.name))?;
    let name = file
        .name
        .ok_or_else(|| anyhow!("file metadata has no name: {}", id))?;
    Ok(FileEntry {
        id: DriveId::from(id),
        name,
        mime_type: file.mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        size: file.size.map(|s| s.to_string()),
        created_time: file.created_time,
        shared: file.shared.unwrap_or(false),
        web_view_link: file.web_view_link,
    })
}

/// Metadata for a new folder, optionally placed under `parent`.
pub fn folder_metadata(name: &str, parent: Option<&DriveId>) -> File {
    File {
        name: Some(name.to_string()),
        mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        parents: parent.map(|p| vec![p.to_string()]),
        ..Default::default()
    }
}

pub fn folder_from_file(file: File) -> anyhow::Result<UserFolder> {
    let id = file
        .id
        .context(format!("folder metadata has no id: {:?}", file.name))?;
    Ok(UserFolder {
        id: DriveId::from(id),
        name: file.name.unwrap_or_default(),
        web_view_link: file.web_view_link,
    })
}

pub fn metadata_from_file(file: File) -> FileMetadata {
    FileMetadata {
        name: file.name.unwrap_or_else(|| "download".to_string()),
        mime_type: file
            .mime_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
    }
}
