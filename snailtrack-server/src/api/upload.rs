//! Image upload endpoint

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use tracing::info;

use crate::blob::StoredBlob;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: Option<String>,
    /// Base64 file content, optionally as a `data:` URL
    pub file: Option<String>,
}

/// POST /api/upload
pub async fn upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<Json<StoredBlob>> {
    let (Some(filename), Some(file)) = (
        req.filename.filter(|f| !f.trim().is_empty()),
        req.file.filter(|f| !f.trim().is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Filename and file data required".to_string()));
    };

    let bytes = decode_payload(&file)?;
    let blob = state.blobs.store(&filename, &bytes).await?;

    info!(filename = %filename, size = bytes.len(), url = %blob.url, "Stored upload");
    Ok(Json(blob))
}

fn decode_payload(file: &str) -> ApiResult<Vec<u8>> {
    let encoded = match file.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ApiError::BadRequest("Malformed data URL".to_string()))?,
        None => file,
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("File data is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("File is empty".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_and_data_url() {
        assert_eq!(decode_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_payload("data:image/jpeg;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_payload("not base64!"), Err(ApiError::BadRequest(_))));
        assert!(matches!(decode_payload("data:image/png"), Err(ApiError::BadRequest(_))));
    }
}
