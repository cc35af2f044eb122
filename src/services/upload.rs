use crate::config::SeparatorConfig;
use crate::models::{TOKEN_LEN, TrackId, UploadRecord};
use crate::utils::validation::{is_allowed_extension, sanitize_filename, split_extension};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Carried inside an `io::Error` when the request body limit is hit mid-file.
#[derive(Error, Debug)]
#[error("length limit exceeded")]
pub struct LengthLimitExceeded;

/// Common filesystem limit for a single path component
const MAX_STORED_NAME_LEN: usize = 255;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no file part in the request")]
    NoFilePart,

    #[error("empty filename")]
    EmptyFilename,

    #[error("unsupported file type '{0}'")]
    UnsupportedType(String),

    #[error("request body exceeds the maximum allowed size")]
    TooLarge,

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("could not save uploaded file: {0}")]
    Save(#[source] std::io::Error),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::NoFilePart => {
                "Oops! No file part in the request. Please select a file.".to_string()
            }
            UploadError::EmptyFilename => "Please select a file to upload. 🎶".to_string(),
            UploadError::UnsupportedType(_) => {
                "Unsupported file type. Please upload an MP3, WAV, FLAC, OGG, or M4A file. 🎧"
                    .to_string()
            }
            UploadError::TooLarge => "That file is too large to upload. 📦".to_string(),
            UploadError::Multipart(_) => {
                "The upload could not be read. Please try again.".to_string()
            }
            UploadError::Save(e) => format!("Could not save uploaded file: {}", e),
        }
    }
}

/// An upload that passed validation and has a reserved name, but no bytes on disk yet.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub display_name: String,
    pub stored_path: PathBuf,
    pub track_id: TrackId,
}

/// Validates inbound files and persists them under the upload directory.
pub struct UploadService {
    upload_dir: PathBuf,
    allowed_extensions: Vec<String>,
}

impl UploadService {
    pub fn new(config: &SeparatorConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
        }
    }

    /// Checks the client filename and decides where the file will live.
    /// Touches nothing on disk.
    pub fn prepare(&self, client_filename: &str) -> Result<PendingUpload, UploadError> {
        if client_filename.is_empty() {
            return Err(UploadError::EmptyFilename);
        }

        let display_name = sanitize_filename(client_filename);
        let (base, extension) = split_extension(&display_name);

        if !is_allowed_extension(extension, &self.allowed_extensions) {
            tracing::info!(
                "Rejected upload '{}' with extension '{}'",
                client_filename,
                extension
            );
            return Err(UploadError::UnsupportedType(extension.to_string()));
        }

        // Sanitized names are ASCII, so byte truncation is safe.
        let max_base = MAX_STORED_NAME_LEN.saturating_sub(TOKEN_LEN + 1 + extension.len());
        let base = &base[..base.len().min(max_base)];

        let token = Uuid::new_v4().simple().to_string();
        let track_id = TrackId::from_parts(&token, base)
            .ok_or_else(|| UploadError::UnsupportedType(extension.to_string()))?;
        let stored_path = self
            .upload_dir
            .join(format!("{}{}", track_id.as_str(), extension));

        Ok(PendingUpload {
            display_name: display_name.clone(),
            stored_path,
            track_id,
        })
    }

    /// Streams `reader` into the reserved path. The file is created exclusively so a
    /// token collision fails instead of overwriting, and partial files are removed.
    pub async fn save<R>(
        &self,
        pending: PendingUpload,
        mut reader: R,
    ) -> Result<UploadRecord, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pending.stored_path)
            .await
            .map_err(|e| {
                tracing::error!("Error creating {}: {}", pending.stored_path.display(), e);
                UploadError::Save(e)
            })?;

        let written = async {
            let n = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;

        match written {
            Ok(n) => {
                tracing::info!(
                    "File saved to: {} ({} bytes)",
                    pending.stored_path.display(),
                    n
                );
                Ok(UploadRecord {
                    display_name: pending.display_name,
                    stored_path: pending.stored_path,
                    track_id: pending.track_id,
                })
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&pending.stored_path).await {
                    tracing::warn!(
                        "Could not remove partial upload {}: {}",
                        pending.stored_path.display(),
                        rm
                    );
                }
                if is_length_limit(&e) {
                    return Err(UploadError::TooLarge);
                }
                tracing::error!("Error saving file: {}", e);
                Err(UploadError::Save(e))
            }
        }
    }
}

/// The multipart body limit surfaces as an I/O error once the field is wrapped in a reader.
fn is_length_limit(e: &std::io::Error) -> bool {
    e.get_ref()
        .is_some_and(|inner| inner.is::<LengthLimitExceeded>())
}
