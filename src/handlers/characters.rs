use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::{FormData, file_urls};
use crate::models::{Character, NewCharacter};
use crate::services::characters::{parse_tags, validate};
use crate::state::AppState;

/// A character as sent to the browser, with its reference images as URLs.
#[derive(Debug, Serialize)]
pub struct CharacterView {
    #[serde(flatten)]
    pub character: Character,
    pub image_urls: Vec<String>,
}

impl CharacterView {
    fn new(state: &AppState, character: Character) -> Self {
        let image_urls = file_urls(state, &character.image_paths);
        Self {
            character,
            image_urls,
        }
    }
}

pub async fn list_characters(State(state): State<AppState>) -> AppResult<Json<Vec<CharacterView>>> {
    let characters = state.characters.list().await?;
    Ok(Json(
        characters
            .into_iter()
            .map(|c| CharacterView::new(&state, c))
            .collect(),
    ))
}

pub async fn get_character(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<CharacterView>> {
    state
        .characters
        .get(&name)
        .await?
        .map(|c| Json(CharacterView::new(&state, c)))
        .ok_or_else(|| AppError::not_found("Character", name))
}

/// POST /api/characters
///
/// Create a character from its description; the reference image is generated.
pub async fn create_from_description(
    State(state): State<AppState>,
    Json(new): Json<NewCharacter>,
) -> AppResult<(StatusCode, Json<CharacterView>)> {
    ensure_creatable(&state, &new).await?;

    let character = state
        .characters
        .add_from_description(
            new,
            state.image_client.as_ref(),
            state.config.panel_width,
            state.config.panel_height,
        )
        .await?;
    state.invalidate_index().await;

    Ok((StatusCode::CREATED, Json(CharacterView::new(&state, character))))
}

/// POST /api/characters/upload
///
/// Multipart form with `name`, `role`, `visual_description`, optional `age`,
/// `personality`, comma-separated `tags`, and one or more image files.
pub async fn upload_character(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<CharacterView>)> {
    let form = FormData::read(multipart).await?;
    let new = NewCharacter {
        name: form.text("name"),
        role: form.text("role"),
        age: form.optional("age"),
        visual_description: form.text("visual_description"),
        personality: form.optional("personality"),
        tags: parse_tags(&form.text("tags")),
    };
    ensure_creatable(&state, &new).await?;
    if form.images.is_empty() {
        return Err(AppError::bad_request("Please upload at least one image"));
    }

    let character = state.characters.add_from_images(new, form.images).await?;
    state.invalidate_index().await;

    Ok((StatusCode::CREATED, Json(CharacterView::new(&state, character))))
}

async fn ensure_creatable(state: &AppState, new: &NewCharacter) -> AppResult<()> {
    validate(new).map_err(AppError::BadRequest)?;
    if state.characters.get(&new.name).await?.is_some() {
        return Err(AppError::bad_request(format!(
            "A character named '{}' already exists",
            new.name.trim()
        )));
    }
    Ok(())
}
