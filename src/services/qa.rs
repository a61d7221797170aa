use anyhow::{Context, Result, bail};

use crate::models::Answer;
use crate::services::llm::TextModel;
use crate::services::prompts::SAFETY_GUIDELINES;
use crate::services::rag::{RagIndex, SourceKind};

pub const EMPTY_UNIVERSE_ANSWER: &str =
    "I don't know anything about this universe yet. Add some characters or stories first!";

/// Answer `question` from the passages nearest to it in `index`.
pub async fn answer_question(
    model: &dyn TextModel,
    index: &RagIndex,
    question: &str,
    top_k: usize,
) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question is empty");
    }
    if index.is_empty() {
        return Ok(Answer {
            answer: EMPTY_UNIVERSE_ANSWER.to_string(),
            images: Vec::new(),
            sources: Vec::new(),
        });
    }

    let query = model
        .embed(question)
        .await
        .context("failed to embed the question")?;
    let hits = index.search(&query, top_k.max(1));

    let context = hits
        .iter()
        .map(|(passage, _)| passage.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let prompt = format!(
        "You are the friendly archivist of a comic universe. Answer the question using only the context below.\n\
         If the context does not contain the answer, say you don't know.\n\
         {SAFETY_GUIDELINES}\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\
         Answer:"
    );
    let answer = model
        .generate(&prompt)
        .await
        .context("Answer generation failed")?;

    let mut images: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    for (passage, score) in &hits {
        tracing::debug!(source = %passage.source, score, "Retrieved passage");
        if !sources.contains(&passage.source) {
            sources.push(passage.source.clone());
        }
        if passage.kind == SourceKind::Character {
            for path in &passage.image_paths {
                if !images.contains(path) {
                    images.push(path.clone());
                }
            }
        }
    }

    Ok(Answer {
        answer,
        images,
        sources,
    })
}
