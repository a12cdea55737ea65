//! Document handlers.
//!
//! GET routes also answer HEAD; axum strips the body and keeps the status
//! and headers of the GET response.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use super::super::AppState;
use crate::error::{Error, Result};
use crate::handler::{CreatedDocument, WrappedDocument};

/// POST /documents - Store the raw request body under a new key.
pub(crate) async fn create(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<CreatedDocument>> {
    let max = state.handler.max_length();

    // One byte of headroom tells "exactly max" apart from "over max"
    let bytes = Limited::new(body, max.saturating_add(1))
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                Error::DocumentTooLarge {
                    len: max.saturating_add(1),
                    max,
                }
            } else {
                Error::io("reading request body", std::io::Error::other(e))
            }
        })?
        .to_bytes();

    let created = state.handler.handle_post(&bytes).await?;
    Ok(Json(created))
}

/// GET /documents/{id} - Document wrapped as `{ data, key }`.
pub(crate) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WrappedDocument>> {
    let document = state.handler.handle_get(&id).await?;
    Ok(Json(document))
}

/// GET /raw/{id} - Document content verbatim as plain text.
pub(crate) async fn raw(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let document = state.handler.handle_raw_get(&id).await?;
    Ok((
        [(header::CONTENT_TYPE, document.content_type())],
        document.content,
    ))
}
