use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A member of the comic universe, persisted in `characters.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Character {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub age: Option<String>,
    pub visual_description: String,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Form input for a new character.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub age: Option<String>,
    pub visual_description: String,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One of the six scene descriptions making up a comic strip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelPrompt {
    pub panel: u32,
    pub scene: String,
    pub characters: Vec<String>,
    pub dialogue: String,
    pub camera_angle: String,
    pub emotion: String,
    pub image_prompt: String,
}

/// Sidecar written as `metadata.json` next to the rendered panels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comic {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub story: String,
    pub prompts: Vec<PanelPrompt>,
    pub image_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub images: Vec<String>,
    pub sources: Vec<String>,
}

/// Raw bytes of an image received from the browser.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}
