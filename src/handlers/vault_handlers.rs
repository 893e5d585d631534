//! HTTP handlers for the vault API. Every handler here sits behind the auth
//! middleware and receives the caller's [`Identity`].

use crate::{
    errors::AppError,
    middleware::auth::Identity,
    models::file_record::FileRecord,
    services::vault_service::{UploadRequest, VaultError},
    state::AppState,
};
use axum::{
    Extension, Form, Json,
    body::Body,
    extract::{Multipart, Path, State, rejection::FormRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Multipart field carrying the file bytes.
const FILE_FIELD: &str = "file";
/// Form / multipart field carrying the 16-byte key.
const KEY_FIELD: &str = "encryption_key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub message: &'static str,
}

/// Entry of `GET /api/files`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    pub id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub uploaded_by: String,
    pub uploaded_date: String,
}

impl From<FileRecord> for FileListing {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            filename: record.logical_name,
            file_size: record.size_bytes,
            uploaded_by: record.owner_id,
            uploaded_date: record.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub encryption_key: Option<String>,
}

struct UploadedPart {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

fn malformed_body() -> AppError {
    AppError::bad_request("MalformedRequest", "Request body could not be parsed")
}

/// `POST /api/upload`: multipart with `file` and `encryption_key`.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<UploadedPart> = None;
    let mut key: Option<Zeroizing<Vec<u8>>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|_| malformed_body())? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|_| malformed_body())?;
                file = Some(UploadedPart {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some(KEY_FIELD) => {
                let raw = field.bytes().await.map_err(|_| malformed_body())?;
                key = Some(Zeroizing::new(raw.to_vec()));
            }
            _ => {}
        }
    }

    let file = file.ok_or(VaultError::MissingField(FILE_FIELD))?;
    let key = key.ok_or(VaultError::MissingField(KEY_FIELD))?;
    let file_name = file.file_name.unwrap_or_default();

    let file_id = state
        .vault
        .upload(
            &identity.owner_id,
            UploadRequest {
                logical_name: &file_name,
                content_type: file.content_type.as_deref(),
                data: &file.data,
                key: &key,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id,
            message: "File uploaded successfully!",
        }),
    ))
}

/// `GET /api/files`: the caller's files, newest first.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<FileListing>>, AppError> {
    let files = state.vault.list_files(&identity.owner_id).await?;
    Ok(Json(files.into_iter().map(FileListing::from).collect()))
}

/// `POST /api/download/{fileId}`: form body with `encryption_key`.
pub async fn download_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<String>,
    form: Result<Form<DownloadForm>, FormRejection>,
) -> Result<Response, AppError> {
    // An unparseable id cannot name a stored file.
    let file_id = Uuid::parse_str(&file_id).map_err(|_| VaultError::FileNotFound(Uuid::nil()))?;
    let Form(form) = form.map_err(|_| malformed_body())?;
    let key = Zeroizing::new(
        form.encryption_key
            .ok_or(VaultError::MissingField(KEY_FIELD))?,
    );

    let file = state
        .vault
        .download(&identity.owner_id, file_id, key.as_bytes())
        .await?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        disposition_filename(&file.logical_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut response = Response::new(Body::from(file.plaintext));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

/// Filename safe to embed in a quoted `Content-Disposition` parameter.
fn disposition_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_filename() {
        assert_eq!(disposition_filename("notes.txt"), "notes.txt");
        assert_eq!(disposition_filename("a\"b\\c\r\n.txt"), "abc.txt");
        assert_eq!(disposition_filename("日本.txt"), ".txt");
        assert_eq!(disposition_filename("日本"), "download");
    }

    #[test]
    fn test_listing_shape() {
        let record = FileRecord::new("alice", "notes.txt", "text/plain", 16);
        let json = serde_json::to_value(FileListing::from(record.clone())).unwrap();
        assert_eq!(json["id"], record.id.to_string());
        assert_eq!(json["filename"], "notes.txt");
        assert_eq!(json["fileSize"], 16);
        assert_eq!(json["uploadedBy"], "alice");
        assert!(json["uploadedDate"].as_str().unwrap().ends_with('Z'));
    }
}
