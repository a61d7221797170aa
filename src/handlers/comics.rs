use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http::header;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::file_urls;
use crate::models::Comic;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ComicView {
    #[serde(flatten)]
    pub comic: Comic,
    pub image_urls: Vec<String>,
}

impl ComicView {
    fn new(state: &AppState, comic: Comic) -> Self {
        let image_urls = file_urls(state, &comic.image_paths);
        Self { comic, image_urls }
    }
}

/// POST /api/comics
///
/// Render the session's approved panel prompts into a comic strip.
pub async fn create_comic(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<ComicView>)> {
    let (story, prompts) = {
        let session = state.session.lock().await;
        match (&session.current_story, &session.current_prompts) {
            (Some(story), Some(prompts)) if !prompts.is_empty() => (story.clone(), prompts.clone()),
            _ => {
                return Err(AppError::bad_request(
                    "No approved prompts found. Generate and approve a story first",
                ));
            }
        }
    };

    let comic = state
        .comics
        .render(
            state.image_client.as_ref(),
            &state.captioner,
            &story,
            &prompts,
        )
        .await?;
    state.session.lock().await.comic_rendered(&comic);

    Ok((StatusCode::CREATED, Json(ComicView::new(&state, comic))))
}

pub async fn list_comics(State(state): State<AppState>) -> AppResult<Json<Vec<ComicView>>> {
    let comics = state.comics.list().await?;
    Ok(Json(
        comics
            .into_iter()
            .map(|comic| ComicView::new(&state, comic))
            .collect(),
    ))
}

pub async fn get_comic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ComicView>> {
    state
        .comics
        .load(&id)
        .await?
        .map(|comic| Json(ComicView::new(&state, comic)))
        .ok_or_else(|| AppError::not_found("Comic", id))
}

/// GET /api/comics/:id/download
pub async fn download_comic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let comic = state
        .comics
        .load(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Comic", id.clone()))?;
    let bytes = state.comics.bundle(&comic).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"comic_{}.zip\"", comic.id),
            ),
        ],
        bytes,
    ))
}
