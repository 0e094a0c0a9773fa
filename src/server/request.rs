use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use hyper::header::CONTENT_LENGTH;
use hyper::{Body, Request};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::DriveError;
use crate::model::{check_upload_size, MAX_UPLOAD_BYTES, UPLOAD_TOO_LARGE};
use crate::server::response::ApiError;

/// Ceiling for JSON request bodies.
pub const MAX_JSON_BODY: usize = 64 * 1024;

pub fn query_params(request: &Request<Body>) -> HashMap<String, String> {
    request
        .uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// A query value, with empty values treated as absent.
pub fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn declared_length(request: &Request<Body>) -> Option<usize> {
    request
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Buffers the body, stopping as soon as it grows past `limit`.
async fn read_limited(body: Body, limit: usize) -> Result<Option<Bytes>, ApiError> {
    let mut stream = body;
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ApiError::bad_request(format!("Could not read request body: {}", e)))?;
        trace!("read_limited(): chunk of {} bytes", chunk.len());
        if buffer.len() + chunk.len() > limit {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Some(buffer.freeze()))
}

/// Upload content. The size ceiling is enforced from `Content-Length` when
/// present and again while reading.
pub async fn upload_body(request: Request<Body>) -> Result<Bytes, DriveError> {
    if let Some(len) = declared_length(&request) {
        check_upload_size(len)?;
    }
    match read_limited(request.into_body(), MAX_UPLOAD_BYTES).await {
        Ok(Some(bytes)) => {
            debug!("upload_body(): {} bytes", bytes.len());
            Ok(bytes)
        }
        Ok(None) => Err(DriveError::validation(UPLOAD_TOO_LARGE)),
        Err(e) => Err(DriveError::validation(e.message)),
    }
}

pub async fn json_body<T: DeserializeOwned>(request: Request<Body>) -> Result<T, ApiError> {
    let bytes = read_limited(request.into_body(), MAX_JSON_BODY)
        .await?
        .ok_or_else(|| ApiError::bad_request("Request body is too large"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_query() {
        let request = Request::get("/api/drive?folderId=abc%20d&q=&sortBy=name")
            .body(Body::empty())
            .unwrap();
        let params = query_params(&request);
        assert_eq!(param(&params, "folderId"), Some("abc d"));
        assert_eq!(param(&params, "q"), None);
        assert_eq!(param(&params, "sortBy"), Some("name"));
        assert_eq!(param(&params, "missing"), None);
    }

    #[tokio::test]
    async fn declared_oversize_is_rejected_without_reading() {
        let request = Request::post("/api/drive/upload")
            .header(CONTENT_LENGTH, (MAX_UPLOAD_BYTES + 1).to_string())
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            upload_body(request).await,
            Err(DriveError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn streamed_oversize_is_rejected() {
        let request = Request::post("/api/drive/upload")
            .body(Body::from(vec![1u8; MAX_UPLOAD_BYTES + 10]))
            .unwrap();
        assert!(matches!(
            upload_body(request).await,
            Err(DriveError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn json_body_parses() {
        #[derive(serde::Deserialize)]
        struct Payload {
            name: String,
        }
        let request = Request::post("/x").body(Body::from(r#"{"name":"n"}"#)).unwrap();
        let payload: Payload = json_body(request).await.unwrap();
        assert_eq!(payload.name, "n");

        let request = Request::post("/x").body(Body::from("{")).unwrap();
        let err = json_body::<Payload>(request).await.err().unwrap();
        assert_eq!(err.status, hyper::StatusCode::BAD_REQUEST);
    }
}
