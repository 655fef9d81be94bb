//! HTTP route handlers for slide API

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

use super::store::SlideStore;
use super::types::{SlideData, SlideError, SlideErrorKind, SlideListItem, SlideResult, SlideUpdate};

/// Application state containing the slide store
#[derive(Clone)]
pub struct SlideAppState {
    pub store: Arc<SlideStore>,
}

/// Error response for slide API
#[derive(Debug, Serialize)]
pub struct SlideErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<SlideError> for SlideErrorResponse {
    fn from(e: SlideError) -> Self {
        let code = match e.kind() {
            SlideErrorKind::NotFound => "not_found",
            SlideErrorKind::Validation => "invalid_argument",
            SlideErrorKind::Integrity => "internal",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for SlideErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_argument" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Run a synchronous store operation off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, SlideErrorResponse>
where
    F: FnOnce() -> SlideResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(|e| {
            if e.kind() == SlideErrorKind::Integrity {
                tracing::error!("Slide storage failure: {}", e);
            } else {
                tracing::debug!("Slide request rejected: {}", e);
            }
            SlideErrorResponse::from(e)
        }),
        Err(e) => {
            tracing::error!("Slide worker task failed: {}", e);
            Err(SlideErrorResponse {
                error: "slide worker task failed".to_string(),
                code: "internal".to_string(),
            })
        }
    }
}

/// GET /api/slides - List all slides ordered by index
pub async fn list_slides(
    State(state): State<SlideAppState>,
) -> Result<Json<Vec<SlideListItem>>, SlideErrorResponse> {
    let mut items: Vec<SlideListItem> = blocking(move || {
        Ok(state
            .store
            .list_records()?
            .iter()
            .map(|s| SlideListItem::from(s.as_data()))
            .collect())
    })
    .await?;

    items.sort_by_key(|item| item.index);
    Ok(Json(items))
}

/// GET /api/slide/:id - Get a single slide
pub async fn get_slide(
    State(state): State<SlideAppState>,
    Path(id): Path<String>,
) -> Result<Json<SlideData>, SlideErrorResponse> {
    let data = blocking(move || Ok(state.store.load(&id)?.as_data())).await?;
    Ok(Json(data))
}

/// POST /api/slides - Create a slide and place it at the requested index
pub async fn create_slide(
    State(state): State<SlideAppState>,
    Json(update): Json<SlideUpdate>,
) -> Result<(StatusCode, Json<SlideData>), SlideErrorResponse> {
    let data = blocking(move || {
        let mut slide = state.store.create()?;
        slide.apply(update)?;
        state.store.save(&slide)?;
        // Reindexing may have moved the slide.
        Ok(state.store.load(slide.id())?.as_data())
    })
    .await?;

    tracing::info!("Created slide {} at index {:?}", data.id, data.index);
    Ok((StatusCode::CREATED, Json(data)))
}

/// PUT /api/slide/:id - Replace the fields of an existing slide
pub async fn update_slide(
    State(state): State<SlideAppState>,
    Path(id): Path<String>,
    Json(update): Json<SlideUpdate>,
) -> Result<Json<SlideData>, SlideErrorResponse> {
    let data = blocking(move || {
        let mut slide = state.store.load(&id)?;
        slide.apply(update)?;
        state.store.save(&slide)?;
        Ok(state.store.load(&id)?.as_data())
    })
    .await?;

    Ok(Json(data))
}

/// DELETE /api/slide/:id - Remove a slide and renumber the rest
pub async fn delete_slide(
    State(state): State<SlideAppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, SlideErrorResponse> {
    blocking(move || {
        let slide = state.store.load(&id)?;
        state.store.delete(slide)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Build slide API routes
pub fn slide_routes(state: SlideAppState) -> Router {
    Router::new()
        .route("/slides", get(list_slides).post(create_slide))
        .route(
            "/slide/:id",
            get(get_slide).put(update_slide).delete(delete_slide),
        )
        .with_state(state)
}
