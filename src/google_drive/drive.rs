use std::fmt::{Debug, Display};
use std::io::Cursor;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use google_drive3::api::{File, Permission as DrivePermission};
use google_drive3::hyper::client::HttpConnector;
use google_drive3::hyper::{Body, Client, Response};
use google_drive3::hyper_rustls::HttpsConnector;
use google_drive3::{hyper_rustls, DriveHub};
use tracing::{debug, error, instrument, trace};

use crate::error::DriveError;
use crate::google_drive::{helpers, DriveId};
use crate::model::{
    FileEntry, FileMetadata, FileUpload, Permission, ShareGrant, ShareRole, UserFolder,
    FOLDER_MIME_TYPE,
};
use crate::session::Credential;
use crate::store::{FileStore, StoreConnector, StoreResult};

const FIELDS_FILE: &str = "id, name, mimeType, size, createdTime, shared, webViewLink";
const FIELDS_FOLDER: &str = "id, name, webViewLink";
const FIELDS_METADATA: &str = "name, mimeType";

pub type HttpsClient = Client<HttpsConnector<HttpConnector>>;

pub fn https_client() -> HttpsClient {
    Client::builder().build(
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build(),
    )
}

/// Drive v3 client bound to one access token.
pub struct GoogleDrive {
    hub: DriveHub<HttpsConnector<HttpConnector>>,
    page_size: i32,
}

impl GoogleDrive {
    pub fn with_access_token(client: HttpsClient, access_token: &str, page_size: i32) -> Self {
        let hub = DriveHub::new(client, access_token.to_string());
        Self { hub, page_size }
    }
}

fn anyhow_to_store(e: anyhow::Error) -> DriveError {
    error!("malformed drive response: {:#}", e);
    DriveError::Unknown(format!("{:#}", e))
}

#[async_trait]
impl FileStore for GoogleDrive {
    #[instrument]
    async fn find_folders_by_name(&self, name: &str) -> StoreResult<Vec<UserFolder>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            helpers::escape_query_value(name),
            FOLDER_MIME_TYPE
        );
        debug!("find_folders_by_name: q: {}", query);
        let (_response, list) = self
            .hub
            .files()
            .list()
            .q(&query)
            .spaces("drive")
            .param("fields", &format!("files({})", FIELDS_FOLDER))
            .doit()
            .await
            .map_err(helpers::classify_error)?;
        let folders = list
            .files
            .unwrap_or_default()
            .into_iter()
            .map(helpers::folder_from_file)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(anyhow_to_store)?;
        debug!("find_folders_by_name: found {}", folders.len());
        Ok(folders)
    }

    #[instrument]
    async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> StoreResult<UserFolder> {
        let metadata = helpers::folder_metadata(name, parent);
        let folder_mime = FOLDER_MIME_TYPE
            .parse::<mime::Mime>()
            .map_err(|e| DriveError::Unknown(format!("invalid folder mime type: {}", e)))?;
        // files.create only goes through the upload call; a folder has no content
        let (_response, folder) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", FIELDS_FOLDER)
            .upload(Cursor::new(Vec::<u8>::new()), folder_mime)
            .await
            .map_err(helpers::classify_error)?;
        debug!("create_folder(): folder: {:?}", folder);
        helpers::folder_from_file(folder).map_err(anyhow_to_store)
    }

    #[instrument]
    async fn list_files(&self, folder: Option<&DriveId>) -> StoreResult<Vec<FileEntry>> {
        let mut query = String::from("trashed = false");
        if let Some(folder) = folder {
            if !folder.is_query_safe() {
                return Err(DriveError::validation(format!(
                    "Invalid folder ID: {}",
                    folder
                )));
            }
            query.push_str(&format!(" and '{}' in parents", folder));
        }
        debug!("list_files: q: {}", query);
        let (_response, list) = self
            .hub
            .files()
            .list()
            .q(&query)
            .page_size(self.page_size)
            .param("fields", &format!("files({})", FIELDS_FILE))
            .doit()
            .await
            .map_err(helpers::classify_error)?;
        let files = list
            .files
            .unwrap_or_default()
            .into_iter()
            .map(helpers::file_entry_from_file)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(anyhow_to_store)?;
        debug!("list_files: response: {:?}", files.len());
        Ok(files)
    }

    #[instrument(skip(upload), fields(file_name = %upload.name, size = upload.content.len()))]
    async fn upload_file(&self, upload: &FileUpload) -> StoreResult<FileEntry> {
        let metadata = File {
            name: Some(upload.name.clone()),
            parents: upload.folder_id.as_ref().map(|p| vec![p.to_string()]),
            ..Default::default()
        };
        let stream = Cursor::new(upload.content.to_vec());
        debug!("starting upload");
        let (_response, file) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", FIELDS_FILE)
            .upload(stream, upload.mime_type.clone())
            .await
            .map_err(helpers::classify_error)?;
        debug!("upload done!");
        helpers::file_entry_from_file(file).map_err(anyhow_to_store)
    }

    #[instrument]
    async fn file_metadata(&self, file_id: &DriveId) -> StoreResult<FileMetadata> {
        let (_response, file) = self
            .hub
            .files()
            .get(file_id.as_str())
            .param("fields", FIELDS_METADATA)
            .doit()
            .await
            .map_err(helpers::classify_error)?;
        Ok(helpers::metadata_from_file(file))
    }

    #[instrument]
    async fn download_content(&self, file_id: &DriveId) -> StoreResult<Bytes> {
        let (response, _file) = self
            .hub
            .files()
            .get(file_id.as_str())
            .param("alt", "media")
            .doit()
            .await
            .map_err(helpers::classify_error)?;
        read_body(response).await
    }

    #[instrument]
    async fn delete_file(&self, file_id: &DriveId) -> StoreResult<()> {
        let response = self
            .hub
            .files()
            .delete(file_id.as_str())
            .doit()
            .await
            .map_err(helpers::classify_error)?;
        debug!("delete_file(): status: {}", response.status());
        Ok(())
    }

    #[instrument]
    async fn create_permission(&self, grant: &ShareGrant) -> StoreResult<Permission> {
        let request = DrivePermission {
            type_: Some("user".to_string()),
            role: Some(grant.role.as_str().to_string()),
            email_address: Some(grant.email.clone()),
            ..Default::default()
        };
        let (_response, permission) = self
            .hub
            .permissions()
            .create(request, grant.file_id.as_str())
            .doit()
            .await
            .map_err(helpers::classify_error)?;
        debug!("create_permission(): permission: {:?}", permission);
        Ok(Permission {
            id: permission.id,
            kind: permission.type_.unwrap_or_else(|| "user".to_string()),
            role: permission
                .role
                .and_then(|r| r.parse::<ShareRole>().ok())
                .unwrap_or(grant.role),
            email_address: permission.email_address.or_else(|| Some(grant.email.clone())),
        })
    }
}

/// Buffers the whole body; callers get the content in one piece.
async fn read_body(response: Response<Body>) -> StoreResult<Bytes> {
    let mut stream = response.into_body();
    let mut buffer = BytesMut::new();
    let mut counter = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DriveError::remote(None, e.to_string()))?;
        trace!("read_body(): chunk counter: {}", counter);
        buffer.extend_from_slice(&chunk);
        counter += 1;
    }
    debug!("read_body(): {} bytes", buffer.len());
    Ok(buffer.freeze())
}

impl Debug for GoogleDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleDrive")
    }
}

impl Display for GoogleDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleDrive")
    }
}

/// Builds a [`GoogleDrive`] per credential on a shared HTTPS client.
#[derive(Clone)]
pub struct DriveConnector {
    client: HttpsClient,
    page_size: i32,
}

impl DriveConnector {
    pub fn new(page_size: i32) -> Self {
        Self {
            client: https_client(),
            page_size,
        }
    }
}

impl Debug for DriveConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DriveConnector {{ page_size: {} }}", self.page_size)
    }
}

impl StoreConnector for DriveConnector {
    type Store = GoogleDrive;

    fn connect(&self, credential: &Credential) -> Self::Store {
        GoogleDrive::with_access_token(self.client.clone(), credential.access_token(), self.page_size)
    }
}
