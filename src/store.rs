use async_trait::async_trait;
use bytes::Bytes;

use crate::error::DriveError;
use crate::google_drive::DriveId;
use crate::model::{FileEntry, FileMetadata, FileUpload, Permission, ShareGrant, UserFolder};
use crate::session::Credential;

pub type StoreResult<T> = std::result::Result<T, DriveError>;

/// The remote file store as seen by one request. Each method is a single
/// remote exchange.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Non-trashed folders whose name is exactly `name`, in store order.
    async fn find_folders_by_name(&self, name: &str) -> StoreResult<Vec<UserFolder>>;
    async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> StoreResult<UserFolder>;
    async fn list_files(&self, folder: Option<&DriveId>) -> StoreResult<Vec<FileEntry>>;
    async fn upload_file(&self, upload: &FileUpload) -> StoreResult<FileEntry>;
    async fn file_metadata(&self, file_id: &DriveId) -> StoreResult<FileMetadata>;
    async fn download_content(&self, file_id: &DriveId) -> StoreResult<Bytes>;
    async fn delete_file(&self, file_id: &DriveId) -> StoreResult<()>;
    async fn create_permission(&self, grant: &ShareGrant) -> StoreResult<Permission>;
}

/// Builds a store client bound to one credential.
pub trait StoreConnector: Send + Sync {
    type Store: FileStore;

    fn connect(&self, credential: &Credential) -> Self::Store;
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{FOLDER_MIME_TYPE, MAX_UPLOAD_BYTES};

    #[derive(Debug, Clone)]
    struct Record {
        entry: FileEntry,
        parent: Option<DriveId>,
        content: Bytes,
    }

    #[derive(Debug, Default)]
    struct State {
        records: Vec<Record>,
        next_id: usize,
        permissions: Vec<Permission>,
        denied: HashMap<&'static str, u16>,
    }

    /// In-memory store shared by every connection, counting remote calls.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStore {
        state: Arc<Mutex<State>>,
        calls: Arc<AtomicUsize>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
        /// Makes every later call of `operation` fail with `status`.
        pub fn fail(&self, operation: &'static str, status: u16) {
            self.state.lock().unwrap().denied.insert(operation, status);
        }
        pub fn permissions(&self) -> Vec<Permission> {
            self.state.lock().unwrap().permissions.clone()
        }
        pub fn insert(&self, entry: FileEntry, parent: Option<DriveId>) {
            self.state.lock().unwrap().records.push(Record {
                entry,
                parent,
                content: Bytes::new(),
            });
        }

        fn enter(&self, operation: &'static str) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.state.lock().unwrap().denied.get(operation) {
                Some(status) => Err(DriveError::remote(
                    Some(*status),
                    format!("{} rejected with {}", operation, status),
                )),
                None => Ok(()),
            }
        }

        fn add(&self, name: &str, mime_type: &str, parent: Option<DriveId>, content: Bytes) -> FileEntry {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = DriveId::new(format!("id-{}", state.next_id));
            let entry = FileEntry {
                web_view_link: Some(format!("https://drive.example/{}", id)),
                id,
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                size: (mime_type != FOLDER_MIME_TYPE).then(|| content.len().to_string()),
                created_time: Utc.timestamp_opt(1_700_000_000 + state.next_id as i64, 0).single(),
                shared: false,
            };
            state.records.push(Record {
                entry: entry.clone(),
                parent,
                content,
            });
            entry
        }

        fn find(&self, file_id: &DriveId) -> StoreResult<Record> {
            self.state
                .lock()
                .unwrap()
                .records
                .iter()
                .find(|r| &r.entry.id == file_id)
                .cloned()
                .ok_or_else(|| DriveError::remote(Some(404), format!("File not found: {}", file_id)))
        }
    }

    fn folder_of(entry: FileEntry) -> UserFolder {
        UserFolder {
            id: entry.id,
            name: entry.name,
            web_view_link: entry.web_view_link,
        }
    }

    #[async_trait]
    impl FileStore for MemoryStore {
        async fn find_folders_by_name(&self, name: &str) -> StoreResult<Vec<UserFolder>> {
            self.enter("find_folders_by_name")?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .records
                .iter()
                .filter(|r| r.entry.is_folder() && r.entry.name == name)
                .map(|r| folder_of(r.entry.clone()))
                .collect())
        }

        async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> StoreResult<UserFolder> {
            self.enter("create_folder")?;
            if let Some(parent) = parent {
                self.find(parent)?;
            }
            Ok(folder_of(self.add(name, FOLDER_MIME_TYPE, parent.cloned(), Bytes::new())))
        }

        async fn list_files(&self, folder: Option<&DriveId>) -> StoreResult<Vec<FileEntry>> {
            self.enter("list_files")?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .records
                .iter()
                .filter(|r| folder.is_none() || r.parent.as_ref() == folder)
                .map(|r| r.entry.clone())
                .collect())
        }

        async fn upload_file(&self, upload: &FileUpload) -> StoreResult<FileEntry> {
            self.enter("upload_file")?;
            assert!(upload.content.len() <= MAX_UPLOAD_BYTES);
            if let Some(folder) = &upload.folder_id {
                self.find(folder)?;
            }
            Ok(self.add(
                &upload.name,
                upload.mime_type.as_ref(),
                upload.folder_id.clone(),
                upload.content.clone(),
            ))
        }

        async fn file_metadata(&self, file_id: &DriveId) -> StoreResult<FileMetadata> {
            self.enter("file_metadata")?;
            let record = self.find(file_id)?;
            Ok(FileMetadata {
                name: record.entry.name,
                mime_type: record.entry.mime_type,
            })
        }

        async fn download_content(&self, file_id: &DriveId) -> StoreResult<Bytes> {
            self.enter("download_content")?;
            Ok(self.find(file_id)?.content)
        }

        async fn delete_file(&self, file_id: &DriveId) -> StoreResult<()> {
            self.enter("delete_file")?;
            self.find(file_id)?;
            self.state
                .lock()
                .unwrap()
                .records
                .retain(|r| &r.entry.id != file_id);
            Ok(())
        }

        async fn create_permission(&self, grant: &ShareGrant) -> StoreResult<Permission> {
            self.enter("create_permission")?;
            self.find(&grant.file_id)?;
            let mut state = self.state.lock().unwrap();
            let permission = Permission {
                id: Some(format!("perm-{}", state.permissions.len() + 1)),
                kind: "user".to_string(),
                role: grant.role,
                email_address: Some(grant.email.clone()),
            };
            state.permissions.push(permission.clone());
            for record in state.records.iter_mut() {
                if record.entry.id == grant.file_id {
                    record.entry.shared = true;
                }
            }
            Ok(permission)
        }
    }

    /// Hands out the same shared store for every credential.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryConnector {
        pub store: MemoryStore,
    }

    impl StoreConnector for MemoryConnector {
        type Store = MemoryStore;

        fn connect(&self, _credential: &Credential) -> Self::Store {
            self.store.clone()
        }
    }
}
