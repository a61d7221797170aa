use axum::Json;
use axum::extract::{Multipart, State};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::FormData;
use crate::services::magic::{self, ArtStyle, Reimagined};
use crate::state::AppState;
use crate::utils;

#[derive(Debug, Deserialize)]
pub struct TextToImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub style: ArtStyle,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_path: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReimagineResponse {
    #[serde(flatten)]
    pub result: Reimagined,
    pub image_url: Option<String>,
}

fn image_url(state: &AppState, path: &str) -> Option<String> {
    utils::file_url(&state.config.data_dir, path)
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub story: String,
}

/// POST /api/magic/text-to-image
pub async fn text_to_image(
    State(state): State<AppState>,
    Json(request): Json<TextToImageRequest>,
) -> AppResult<Json<ImageResponse>> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::bad_request("Please describe the scene"));
    }

    let characters = state.characters.find_many(&request.characters).await?;
    let image_path = state
        .magic
        .text_to_image(
            state.image_client.as_ref(),
            &request.prompt,
            &characters,
            request.style,
        )
        .await?;

    let image_url = image_url(&state, &image_path);
    Ok(Json(ImageResponse {
        image_path,
        image_url,
    }))
}

/// POST /api/magic/reimagine
///
/// Multipart form: one image, `characters` (repeated or comma-separated),
/// optional `instructions`.
pub async fn reimagine(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ReimagineResponse>> {
    let form = FormData::read(multipart).await?;
    let upload = form.first_image()?;

    let characters = state.characters.find_many(&form.list("characters")).await?;
    if characters.is_empty() {
        return Err(AppError::bad_request(
            "Please select at least one character to use in the reimagined image",
        ));
    }

    let result = state
        .magic
        .reimagine(
            state.llm_client.as_ref(),
            state.image_client.as_ref(),
            &upload.bytes,
            &characters,
            &form.text("instructions"),
        )
        .await?;

    let image_url = image_url(&state, &result.image_path);
    Ok(Json(ReimagineResponse { result, image_url }))
}

/// POST /api/magic/image-to-story
pub async fn image_to_story(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<StoryResponse>> {
    let form = FormData::read(multipart).await?;
    let upload = form.first_image()?;

    let story = magic::story_from_image(state.llm_client.as_ref(), &upload.bytes).await?;
    Ok(Json(StoryResponse { story }))
}
