use crate::api::flash::{self, FlashMessage};
use crate::services::separator::SeparationError;
use crate::services::upload::UploadError;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upload rejected: {0}")]
    Upload(#[from] UploadError),

    #[error("Separation failed: {0}")]
    Separation(#[from] SeparationError),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    /// Text shown to the user on the next page.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Upload(e) => e.user_message(),
            AppError::Separation(e) => e.user_message(),
            AppError::NotFound(_) => {
                "Sorry, that file couldn't be found. It might have expired or there was an issue. 🤷"
                    .to_string()
            }
            AppError::Internal(_) => {
                "An unexpected error occurred. Please check the server logs. 💥".to_string()
            }
        }
    }
}

/// Every error on the HTML surface becomes a flash message and a redirect home.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upload(e) => tracing::warn!("Upload rejected: {}", e),
            AppError::Separation(e) => tracing::error!("Separation error: {}", e),
            AppError::NotFound(what) => tracing::error!("File not found for download: '{}'", what),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }

        flash::redirect_home(&[FlashMessage::error(self.user_message())])
    }
}
