//! HTTP front: routes each request to one service operation and turns the
//! outcome into a response.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::google_drive::DriveId;
use crate::listing::ViewOptions;
use crate::prelude::*;
use crate::server::request::{json_body, param, query_params, upload_body};
use crate::server::response::{download_response, json_response, Action, ApiError};
use crate::service::DriveService;
use crate::session::{require_credential, Credential, SessionProvider};
use crate::store::StoreConnector;

pub mod request;
pub mod response;

type HandlerResult = std::result::Result<Response<Body>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnsureFolderBody {
    user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderBody {
    name: Option<String>,
    parent_folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareBody {
    file_id: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct App<C, S> {
    service: DriveService<C>,
    sessions: S,
}

impl<C: StoreConnector, S: SessionProvider> App<C, S> {
    pub fn new(service: DriveService<C>, sessions: S) -> Self {
        Self { service, sessions }
    }

    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let response = match self.route(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
        info!(status = response.status().as_u16(), "handled request");
        response
    }

    async fn route(&self, request: Request<Body>) -> HandlerResult {
        let path = request.uri().path().trim_end_matches('/').to_string();
        let method = request.method().clone();
        match (path.as_str(), method) {
            ("/healthz", Method::GET) => Ok(health()),
            ("/api/drive/create-user-folder", Method::POST) => self.ensure_folder(request).await,
            ("/api/drive", Method::GET) => self.list_files(request).await,
            ("/api/drive/view", Method::GET) => self.dashboard(request).await,
            ("/api/drive/upload", Method::POST) => self.upload(request).await,
            ("/api/drive/download", Method::GET) => self.download(request).await,
            ("/api/drive/delete", Method::DELETE) => self.delete(request).await,
            ("/api/drive/share", Method::POST) => self.share(request).await,
            ("/api/drive/create-folder", Method::POST) => self.create_folder(request).await,
            (
                "/healthz"
                | "/api/drive"
                | "/api/drive/create-user-folder"
                | "/api/drive/view"
                | "/api/drive/upload"
                | "/api/drive/download"
                | "/api/drive/delete"
                | "/api/drive/share"
                | "/api/drive/create-folder",
                _,
            ) => Err(ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")),
            _ => Err(ApiError::new(StatusCode::NOT_FOUND, "Not found")),
        }
    }

    /// The credential is checked before the request is parsed, so an
    /// unauthenticated caller always sees 401.
    fn credential(&self, request: &Request<Body>, action: Action) -> std::result::Result<Credential, ApiError> {
        let credential = self.sessions.credential(request.headers());
        require_credential(credential.as_ref())
            .cloned()
            .map_err(|e| ApiError::from_drive(action, &e))
    }

    async fn ensure_folder(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::EnsureFolder;
        let credential = self.credential(&request, action)?;
        let body: EnsureFolderBody = json_body(request).await?;
        let user_name =
            present(body.user_name).ok_or_else(|| ApiError::bad_request("User name is required"))?;
        let ensured = self
            .service
            .ensure_user_folder(&user_name, Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        let message = if ensured.is_new {
            format!("Folder created for {}", ensured.folder.name)
        } else {
            format!("Folder already exists for {}", ensured.folder.name)
        };
        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "folder": ensured.folder,
                "isNew": ensured.is_new,
                "message": message,
            }),
        ))
    }

    async fn create_folder(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::CreateFolder;
        let credential = self.credential(&request, action)?;
        let body: CreateFolderBody = json_body(request).await?;
        let name = present(body.name).ok_or_else(|| ApiError::bad_request("Folder name is required"))?;
        let parent = present(body.parent_folder_id).map(DriveId::from);
        let folder = self
            .service
            .create_folder(&name, parent.as_ref(), Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        let message = format!("Folder \"{}\" created successfully", folder.name);
        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "folder": folder,
                "message": message,
            }),
        ))
    }

    async fn list_files(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::ListFiles;
        let credential = self.credential(&request, action)?;
        let params = query_params(&request);
        let folder = param(&params, "folderId").map(DriveId::from);
        let files = self
            .service
            .list_files(folder.as_ref(), Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        Ok(json_response(StatusCode::OK, &json!({ "files": files })))
    }

    async fn dashboard(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::ListFiles;
        let credential = self.credential(&request, action)?;
        let params = query_params(&request);
        let folder = param(&params, "folderId").map(DriveId::from);
        let mut options = ViewOptions {
            query: param(&params, "q").unwrap_or_default().to_string(),
            ..Default::default()
        };
        if let Some(key) = param(&params, "sortBy") {
            options.sort_key = key.parse().map_err(|e| ApiError::from_drive(action, &e))?;
        }
        if let Some(direction) = param(&params, "direction") {
            options.direction = direction
                .parse()
                .map_err(|e| ApiError::from_drive(action, &e))?;
        }
        debug!("dashboard options: {:?}", options);
        let view = self
            .service
            .dashboard(folder.as_ref(), &options, Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        Ok(json_response(StatusCode::OK, &view))
    }

    async fn upload(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::Upload;
        let credential = self.credential(&request, action)?;
        let params = query_params(&request);
        let name = param(&params, "name")
            .ok_or_else(|| ApiError::bad_request("No file provided"))?
            .to_string();
        let folder = param(&params, "folderId").map(DriveId::from);
        let mime_type = request
            .headers()
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content = upload_body(request)
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        let file = self
            .service
            .upload(&name, mime_type.as_deref(), folder, content, Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "file": file,
                "message": format!("File {} uploaded successfully", name),
            }),
        ))
    }

    async fn download(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::Download;
        let credential = self.credential(&request, action)?;
        let params = query_params(&request);
        let file_id = param(&params, "fileId")
            .map(DriveId::from)
            .ok_or_else(|| ApiError::bad_request("File ID is required"))?;
        let file = self
            .service
            .download(&file_id, Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        Ok(download_response(file))
    }

    async fn delete(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::Delete;
        let credential = self.credential(&request, action)?;
        let params = query_params(&request);
        let file_id = param(&params, "fileId")
            .map(DriveId::from)
            .ok_or_else(|| ApiError::bad_request("File ID is required"))?;
        self.service
            .delete(&file_id, Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        Ok(json_response(
            StatusCode::OK,
            &json!({ "success": true, "message": "File deleted successfully" }),
        ))
    }

    async fn share(&self, request: Request<Body>) -> HandlerResult {
        let action = Action::Share;
        let credential = self.credential(&request, action)?;
        let body: ShareBody = json_body(request).await?;
        let (Some(file_id), Some(email), Some(role)) =
            (present(body.file_id), present(body.email), present(body.role))
        else {
            return Err(ApiError::bad_request("File ID, email, and role are required"));
        };
        let permission = self
            .service
            .share(&DriveId::from(file_id), &email, &role, Some(&credential))
            .await
            .map_err(|e| ApiError::from_drive(action, &e))?;
        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "permission": permission,
                "message": format!("File shared with {}", email),
            }),
        ))
    }
}

fn health() -> Response<Body> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl_c event: {}", e);
        std::future::pending::<()>().await;
    }
    info!("got signal to end program");
}

/// Serves until ctrl-c.
pub async fn serve<C, S>(addr: SocketAddr, app: App<C, S>) -> Result<()>
where
    C: StoreConnector + 'static,
    S: SessionProvider + 'static,
{
    let app = Arc::new(app);
    let make_service = make_service_fn(move |_conn| {
        let app = app.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                let app = app.clone();
                async move { Ok::<_, Infallible>(app.handle(request).await) }
            }))
        }
    });
    let server = Server::try_bind(&addr)?.serve(make_service);
    info!("listening on http://{}", server.local_addr());
    server.with_graceful_shutdown(shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}
