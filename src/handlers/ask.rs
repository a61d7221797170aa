use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::file_urls;
use crate::models::Answer;
use crate::services::qa;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    #[serde(flatten)]
    pub answer: Answer,
    pub image_urls: Vec<String>,
}

/// POST /api/ask
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> AppResult<Json<AskResponse>> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::bad_request("Please ask a question"));
    }

    let index = state.rag_index().await?;
    let answer = qa::answer_question(
        state.llm_client.as_ref(),
        &index,
        question,
        state.config.rag_top_k,
    )
    .await?;
    state.session.lock().await.record_exchange(question, &answer);

    let image_urls = file_urls(&state, &answer.images);
    Ok(Json(AskResponse { answer, image_urls }))
}
