use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendStoryRequest {
    pub story: String,
}

pub async fn get_session(State(state): State<AppState>) -> Json<Session> {
    Json(state.session.lock().await.clone())
}

/// PUT /api/session/story
///
/// Hand a story (e.g. one written from an image) to the authoring flow.
pub async fn send_story(
    State(state): State<AppState>,
    Json(request): Json<SendStoryRequest>,
) -> AppResult<Json<Session>> {
    let story = request.story.trim();
    if story.is_empty() {
        return Err(AppError::bad_request("Story is empty"));
    }

    let mut session = state.session.lock().await;
    session.start_story(story.to_string());
    Ok(Json(session.clone()))
}
