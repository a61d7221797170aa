//! Retrieval index over stored characters and stories.
//!
//! The index is an in-memory list of embedded passages built in one pass. It
//! is never updated in place; callers drop it and build a new one when the
//! underlying collections change.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{Character, Story};
use crate::services::llm::TextModel;

/// Stories longer than this are split into several passages.
pub const MAX_PASSAGE_CHARS: usize = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Character,
    Story,
}

#[derive(Debug, Clone)]
pub struct Passage {
    pub kind: SourceKind,
    /// Character name or story title.
    pub source: String,
    pub text: String,
    pub image_paths: Vec<String>,
    embedding: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct RagIndex {
    passages: Vec<Passage>,
}

impl RagIndex {
    pub async fn build(
        model: &dyn TextModel,
        characters: &[Character],
        stories: &[Story],
    ) -> Result<Self> {
        let mut pending: Vec<(SourceKind, String, String, Vec<String>)> = Vec::new();

        for character in characters {
            pending.push((
                SourceKind::Character,
                character.name.clone(),
                character_document(character),
                character.image_paths.clone(),
            ));
        }
        for story in stories {
            for chunk in chunk_text(&story.content, MAX_PASSAGE_CHARS) {
                pending.push((
                    SourceKind::Story,
                    story.title.clone(),
                    format!("Story \"{}\": {}", story.title, chunk),
                    Vec::new(),
                ));
            }
        }

        let mut passages = Vec::with_capacity(pending.len());
        for (kind, source, text, image_paths) in pending {
            let embedding = model
                .embed(&text)
                .await
                .with_context(|| format!("failed to embed {source}"))?;
            passages.push(Passage {
                kind,
                source,
                text,
                image_paths,
                embedding,
            });
        }

        tracing::info!(
            characters = characters.len(),
            stories = stories.len(),
            passages = passages.len(),
            "Retrieval index built"
        );
        Ok(Self { passages })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// The `top_k` passages most similar to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(&Passage, f64)> {
        let mut scored: Vec<(&Passage, f64)> = self
            .passages
            .iter()
            .map(|p| (p, cosine_similarity(query, &p.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}

fn character_document(character: &Character) -> String {
    let mut doc = format!(
        "Character: {}\nRole: {}\nAppearance: {}",
        character.name, character.role, character.visual_description
    );
    if let Some(age) = &character.age {
        doc.push_str(&format!("\nAge: {age}"));
    }
    if let Some(personality) = &character.personality {
        doc.push_str(&format!("\nPersonality: {personality}"));
    }
    if !character.tags.is_empty() {
        doc.push_str(&format!("\nTags: {}", character.tags.join(", ")));
    }
    doc
}

/// Split on paragraph boundaries into pieces of at most `max_chars`
/// characters; a single oversized paragraph is cut on word boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        for piece in split_words(paragraph, max_chars) {
            let joined_len = current.chars().count() + piece.chars().count() + 2;
            if !current.is_empty() && joined_len > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_words(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for mismatched, empty or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
