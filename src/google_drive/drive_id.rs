use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the remote store to a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
    /// Ids are interpolated into Drive query strings, so quotes and
    /// backslashes are not accepted.
    pub fn is_query_safe(&self) -> bool {
        !self.0.is_empty() && !self.0.contains(['\'', '\\'])
    }
}

impl From<String> for DriveId {
    fn from(value: String) -> Self {
        DriveId(value)
    }
}

impl From<&str> for DriveId {
    fn from(s: &str) -> Self {
        DriveId(s.to_string())
    }
}

impl From<DriveId> for String {
    fn from(value: DriveId) -> Self {
        value.0
    }
}

impl Display for DriveId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
