use anyhow::{Result, bail};
use chrono::Utc;
use std::path::PathBuf;

use crate::models::Story;
use crate::services::story::derive_title;
use crate::utils;

/// Flat JSON archive of approved stories.
pub struct StoryStore {
    path: PathBuf,
}

impl StoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All stories, newest first.
    pub async fn list(&self) -> Result<Vec<Story>> {
        let mut stories: Vec<Story> = utils::read_json_or_default(&self.path).await?;
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stories)
    }

    pub async fn save(&self, content: &str) -> Result<Story> {
        let content = content.trim();
        if content.is_empty() {
            bail!("cannot save an empty story");
        }

        let mut stories: Vec<Story> = utils::read_json_or_default(&self.path).await?;
        let story = Story {
            id: utils::short_id(),
            title: derive_title(content),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        stories.push(story.clone());
        utils::write_json_atomic(&self.path, &stories).await?;

        tracing::info!(id = %story.id, title = %story.title, "Story archived");
        Ok(story)
    }

    /// Returns `false` when no story has that id.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut stories: Vec<Story> = utils::read_json_or_default(&self.path).await?;
        let before = stories.len();
        stories.retain(|s| s.id != id);
        if stories.len() == before {
            return Ok(false);
        }

        utils::write_json_atomic(&self.path, &stories).await?;
        tracing::info!(id, "Story deleted");
        Ok(true)
    }
}
