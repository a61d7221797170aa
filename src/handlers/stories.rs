use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{PanelPrompt, Story};
use crate::services::{prompts, story};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateStoryRequest {
    pub idea: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateStoryResponse {
    pub story: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveStoryRequest {
    /// The (possibly edited) story; defaults to the session's current story.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApproveStoryResponse {
    pub story: Story,
    pub prompts: Vec<PanelPrompt>,
}

/// POST /api/stories/generate
pub async fn generate_story(
    State(state): State<AppState>,
    Json(request): Json<GenerateStoryRequest>,
) -> AppResult<Json<GenerateStoryResponse>> {
    if request.idea.trim().is_empty() {
        return Err(AppError::bad_request("Please enter a story idea"));
    }

    let characters = state.characters.list().await?;
    let text = story::generate_story(state.llm_client.as_ref(), &request.idea, &characters).await?;
    state.session.lock().await.start_story(text.clone());

    Ok(Json(GenerateStoryResponse { story: text }))
}

/// POST /api/stories/approve
///
/// Decompose the story into six panels, then archive it.
pub async fn approve_story(
    State(state): State<AppState>,
    Json(request): Json<ApproveStoryRequest>,
) -> AppResult<Json<ApproveStoryResponse>> {
    let content = match request.content.filter(|c| !c.trim().is_empty()) {
        Some(content) => content,
        None => state
            .session
            .lock()
            .await
            .current_story
            .clone()
            .ok_or_else(|| AppError::bad_request("No story to approve. Generate a story first"))?,
    };
    let content = content.trim().to_string();

    let characters = state.characters.list().await?;
    let panels =
        prompts::generate_comic_prompts(state.llm_client.as_ref(), &content, &characters).await?;
    let saved = state.stories.save(&content).await?;

    state
        .session
        .lock()
        .await
        .approve(content, panels.clone());
    state.invalidate_index().await;

    Ok(Json(ApproveStoryResponse {
        story: saved,
        prompts: panels,
    }))
}

pub async fn list_stories(State(state): State<AppState>) -> AppResult<Json<Vec<Story>>> {
    Ok(Json(state.stories.list().await?))
}

pub async fn delete_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.stories.delete(&id).await? {
        return Err(AppError::not_found("Story", id));
    }
    state.invalidate_index().await;
    Ok(StatusCode::NO_CONTENT)
}
