use crate::AppState;
use crate::api::error::AppError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::ReaderStream;

#[utoipa::path(
    get,
    path = "/separated/{track_id}/{stem_filename}",
    params(
        ("track_id" = String, Path, description = "Track identifier returned after separation"),
        ("stem_filename" = String, Path, description = "Stem file, e.g. vocals.wav")
    ),
    responses(
        (status = 200, description = "Stem file as an attachment"),
        (status = 303, description = "Unknown stem; redirected home with a message")
    ),
    tag = "separation"
)]
pub async fn download_stem(
    State(state): State<AppState>,
    Path((track_id, stem_filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    tracing::info!(
        "Download request for track '{}', stem '{}'",
        track_id,
        stem_filename
    );

    let path = state
        .separation
        .locate_stem(&track_id, &stem_filename)
        .await
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", track_id, stem_filename)))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to open {}: {}", path.display(), e)))?;
    let size = file.metadata().await.ok().map(|m| m.len());

    let (content_type, content_disposition) = attachment_headers(&stem_filename);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition);
    if let Some(size) = size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}

/// Content type from the extension plus an attachment disposition with both an
/// ASCII fallback and an RFC 5987 encoded name.
pub(crate) fn attachment_headers(filename: &str) -> (String, String) {
    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    let content_type = match extension.as_str() {
        "wav" => "audio/wav".to_string(),
        "mp3" => "audio/mpeg".to_string(),
        "flac" => "audio/flac".to_string(),
        "ogg" => "audio/ogg".to_string(),
        _ => mime::APPLICATION_OCTET_STREAM.to_string(),
    };

    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "stem"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let content_disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    );

    (content_type, content_disposition)
}
