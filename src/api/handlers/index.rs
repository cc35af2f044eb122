use crate::AppState;
use crate::api::error::AppError;
use crate::api::flash::{self, FlashMessage};
use crate::api::views;
use crate::models::UploadRecord;
use crate::services::upload::{LengthLimitExceeded, UploadError};
use axum::{
    extract::{Multipart, State, multipart::MultipartError, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Upload form with any pending messages", body = String, content_type = "text/html")
    ),
    tag = "separation"
)]
pub async fn show_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let messages = flash::take(&headers);
    let page = views::render_index(state.separation.model_name(), &messages, None);

    let mut response = Html(page).into_response();
    if !messages.is_empty() {
        response
            .headers_mut()
            .append(header::SET_COOKIE, flash::clear_cookie());
    }
    response
}

#[utoipa::path(
    post,
    path = "/",
    request_body(content = Multipart, description = "Audio file in the `file` field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Separation finished; page lists the available stems", body = String, content_type = "text/html"),
        (status = 303, description = "Upload rejected or separation failed; message carried in the flash cookie")
    ),
    tag = "separation"
)]
pub async fn upload_and_separate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            return AppError::from(UploadError::Multipart(rejection.body_text())).into_response();
        }
    };

    let upload = match receive_upload(&state, &mut multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            // Unread body parts would otherwise reset the connection before the redirect lands.
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            drain(&mut multipart).await;
            return AppError::from(e).into_response();
        }
    };
    drain(&mut multipart).await;

    let mut messages = vec![FlashMessage::info(format!(
        "Processing '{}'... This might take a few minutes! ⏳",
        upload.display_name
    ))];

    match state.separation.separate(&upload).await {
        Ok(result) => {
            tracing::info!(
                "✅ Separated '{}' into {:?} (track {})",
                result.original_display_name,
                result.stems,
                result.track_id
            );
            messages.push(FlashMessage::success("Woohoo! Separation complete! 🎉"));
            Html(views::render_index(
                state.separation.model_name(),
                &messages,
                Some(&result),
            ))
            .into_response()
        }
        Err(e) => {
            messages.push(FlashMessage::error(AppError::from(e).user_message()));
            flash::redirect_home(&messages)
        }
    }
}

/// Finds the `file` field, validates its name and streams it to disk.
async fn receive_upload(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<UploadRecord, UploadError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            return Err(UploadError::NoFilePart);
        };

        let pending = state.uploads.prepare(&filename)?;

        let body = field.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                std::io::Error::other(LengthLimitExceeded)
            } else {
                std::io::Error::other(e)
            }
        });
        let reader = StreamReader::new(body);
        tokio::pin!(reader);

        return state.uploads.save(pending, reader).await;
    }

    Err(UploadError::NoFilePart)
}

fn multipart_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Multipart(e.body_text())
    }
}

async fn drain(multipart: &mut Multipart) {
    while let Ok(Some(mut field)) = multipart.next_field().await {
        while let Ok(Some(_)) = field.chunk().await {}
    }
}
