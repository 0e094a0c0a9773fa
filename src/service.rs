//! The operations exposed to the presentation layer. Each one checks the
//! credential and validates its input before any remote call, then performs
//! its remote exchange(s) in order.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::DriveError;
use crate::google_drive::DriveId;
use crate::listing::{DashboardView, ViewOptions};
use crate::model::{
    DownloadedFile, FileEntry, FileUpload, Permission, ShareGrant, UserFolder,
};
use crate::session::{require_credential, Credential};
use crate::store::{FileStore, StoreConnector};

pub type ServiceResult<T> = std::result::Result<T, DriveError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredFolder {
    pub folder: UserFolder,
    pub is_new: bool,
}

#[derive(Debug)]
pub struct DriveService<C> {
    connector: Arc<C>,
    storage_limit: u64,
}

impl<C> Clone for DriveService<C> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            storage_limit: self.storage_limit,
        }
    }
}

fn non_empty<'a>(value: &'a str, message: &str) -> ServiceResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DriveError::validation(message));
    }
    Ok(value)
}

impl<C: StoreConnector> DriveService<C> {
    pub fn new(connector: C, storage_limit: u64) -> Self {
        Self {
            connector: Arc::new(connector),
            storage_limit,
        }
    }

    fn store(&self, credential: Option<&Credential>) -> ServiceResult<C::Store> {
        let credential = require_credential(credential)?;
        Ok(self.connector.connect(credential))
    }

    /// Find-or-create of the per-user folder. The first match wins when
    /// several folders share the name; two concurrent first calls may both
    /// create one.
    #[instrument(skip(self, credential))]
    pub async fn ensure_user_folder(
        &self,
        user_name: &str,
        credential: Option<&Credential>,
    ) -> ServiceResult<EnsuredFolder> {
        let store = self.store(credential)?;
        let user_name = non_empty(user_name, "User name is required")?;

        let existing = store.find_folders_by_name(user_name).await?;
        if existing.len() > 1 {
            warn!(
                "found {} folders named {:?}, using the first",
                existing.len(),
                user_name
            );
        }
        if let Some(folder) = existing.into_iter().next() {
            debug!("folder already exists: {}", folder.id);
            return Ok(EnsuredFolder {
                folder,
                is_new: false,
            });
        }

        let folder = store.create_folder(user_name, None).await?;
        info!(folder_id = %folder.id, "created user folder");
        Ok(EnsuredFolder {
            folder,
            is_new: true,
        })
    }

    #[instrument(skip(self, credential))]
    pub async fn create_folder(
        &self,
        name: &str,
        parent: Option<&DriveId>,
        credential: Option<&Credential>,
    ) -> ServiceResult<UserFolder> {
        let store = self.store(credential)?;
        let name = non_empty(name, "Folder name is required")?;
        let folder = store.create_folder(name, parent).await?;
        info!(folder_id = %folder.id, "created folder");
        Ok(folder)
    }

    #[instrument(skip(self, credential))]
    pub async fn list_files(
        &self,
        folder: Option<&DriveId>,
        credential: Option<&Credential>,
    ) -> ServiceResult<Vec<FileEntry>> {
        let store = self.store(credential)?;
        let files = store.list_files(folder).await?;
        debug!("listed {} files", files.len());
        Ok(files)
    }

    /// Lists once and derives every display view from that listing.
    #[instrument(skip(self, credential))]
    pub async fn dashboard(
        &self,
        folder: Option<&DriveId>,
        options: &ViewOptions,
        credential: Option<&Credential>,
    ) -> ServiceResult<DashboardView> {
        let files = self.list_files(folder, credential).await?;
        Ok(DashboardView::build(
            &files,
            options,
            self.storage_limit,
            Utc::now(),
        ))
    }

    #[instrument(skip(self, content, credential), fields(size = content.len()))]
    pub async fn upload(
        &self,
        name: &str,
        mime_type: Option<&str>,
        folder: Option<DriveId>,
        content: Bytes,
        credential: Option<&Credential>,
    ) -> ServiceResult<FileEntry> {
        let store = self.store(credential)?;
        let upload = FileUpload::new(name, mime_type, folder, content)?;
        let file = store.upload_file(&upload).await?;
        info!(file_id = %file.id, "uploaded file");
        Ok(file)
    }

    /// Metadata first, then content.
    #[instrument(skip(self, credential))]
    pub async fn download(
        &self,
        file_id: &DriveId,
        credential: Option<&Credential>,
    ) -> ServiceResult<DownloadedFile> {
        let store = self.store(credential)?;
        non_empty(file_id.as_str(), "File ID is required")?;
        let metadata = store.file_metadata(file_id).await?;
        let content = store.download_content(file_id).await?;
        debug!("downloaded {} bytes of {:?}", content.len(), metadata.name);
        Ok(DownloadedFile {
            name: metadata.name,
            mime_type: metadata.mime_type,
            content,
        })
    }

    #[instrument(skip(self, credential))]
    pub async fn delete(
        &self,
        file_id: &DriveId,
        credential: Option<&Credential>,
    ) -> ServiceResult<()> {
        let store = self.store(credential)?;
        non_empty(file_id.as_str(), "File ID is required")?;
        store.delete_file(file_id).await?;
        info!(file_id = %file_id, "deleted file");
        Ok(())
    }

    #[instrument(skip(self, credential))]
    pub async fn share(
        &self,
        file_id: &DriveId,
        email: &str,
        role: &str,
        credential: Option<&Credential>,
    ) -> ServiceResult<Permission> {
        let store = self.store(credential)?;
        let grant = ShareGrant::new(file_id.clone(), email, role)?;
        let permission = store.create_permission(&grant).await?;
        info!(file_id = %file_id, role = %grant.role, "shared file");
        Ok(permission)
    }
}
