use anyhow::{Context, Result, bail};
use chrono::Utc;
use image::ImageFormat;
use std::path::PathBuf;

use crate::models::{Character, NewCharacter, UploadedImage};
use crate::services::prompts::SAFETY_SUFFIX;
use crate::services::renderer::{self, ImageModel};
use crate::utils;

const DEFAULT_TAGS: [&str; 2] = ["student", "school"];

/// Flat JSON collection of characters plus a directory of reference images.
pub struct CharacterStore {
    path: PathBuf,
    images_dir: PathBuf,
}

impl CharacterStore {
    pub fn new(path: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            images_dir: images_dir.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Character>> {
        utils::read_json_or_default(&self.path).await
    }

    /// Case-insensitive lookup by name.
    pub async fn get(&self, name: &str) -> Result<Option<Character>> {
        let name = name.trim();
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case(name)))
    }

    /// The named characters in the order requested; unknown names are skipped.
    pub async fn find_many(&self, names: &[String]) -> Result<Vec<Character>> {
        let all = self.list().await?;
        Ok(names
            .iter()
            .filter_map(|name| {
                all.iter()
                    .find(|c| c.name.trim().eq_ignore_ascii_case(name.trim()))
                    .cloned()
            })
            .collect())
    }

    pub async fn add_from_images(
        &self,
        new: NewCharacter,
        images: Vec<UploadedImage>,
    ) -> Result<Character> {
        if images.is_empty() {
            bail!("at least one reference image is required");
        }
        self.ensure_name_free(&new.name).await?;

        let slug = utils::slugify(&new.name);
        let mut image_paths = Vec::with_capacity(images.len());
        for (i, upload) in images.iter().enumerate() {
            let extension = match image::guess_format(&upload.bytes) {
                Ok(ImageFormat::Png) => "png",
                Ok(ImageFormat::Jpeg) => "jpg",
                Ok(ImageFormat::WebP) => "webp",
                _ => bail!(
                    "{} is not a PNG, JPEG or WebP image",
                    upload.file_name.as_deref().unwrap_or("upload")
                ),
            };
            let path = self
                .images_dir
                .join(format!("{}_{}_{}.{}", slug, i + 1, utils::short_id(), extension));
            utils::write_atomic(&path, &upload.bytes).await?;
            image_paths.push(path.to_string_lossy().into_owned());
        }

        self.insert(new, image_paths).await
    }

    /// Create a character whose reference image is generated from its description.
    pub async fn add_from_description(
        &self,
        new: NewCharacter,
        image_model: &dyn ImageModel,
        width: u32,
        height: u32,
    ) -> Result<Character> {
        self.ensure_name_free(&new.name).await?;
        let prompt = reference_prompt(&new);
        let seed = uuid::Uuid::new_v4().as_u64_pair().0;
        let bytes = image_model
            .generate(&prompt, width, height, seed)
            .await
            .context("Reference image generation failed")?;
        let image = renderer::decode(&bytes)?;

        let path = self.images_dir.join(format!(
            "{}_generated_{}.png",
            utils::slugify(&new.name),
            utils::short_id()
        ));
        renderer::save_png(&image.to_rgba8(), &path).await?;

        self.insert(new, vec![path.to_string_lossy().into_owned()]).await
    }

    async fn ensure_name_free(&self, name: &str) -> Result<()> {
        if self.get(name).await?.is_some() {
            bail!("a character named '{}' already exists", name.trim());
        }
        Ok(())
    }

    async fn insert(&self, new: NewCharacter, image_paths: Vec<String>) -> Result<Character> {
        self.ensure_name_free(&new.name).await?;
        let mut characters = self.list().await?;

        let character = Character {
            name: new.name.trim().to_string(),
            role: new.role.trim().to_string(),
            age: non_empty(new.age),
            visual_description: new.visual_description.trim().to_string(),
            personality: non_empty(new.personality),
            tags: normalize_tags(new.tags),
            image_paths,
            created_at: Utc::now(),
        };
        characters.push(character.clone());
        utils::write_json_atomic(&self.path, &characters).await?;

        tracing::info!(
            name = %character.name,
            images = character.image_paths.len(),
            "Character created"
        );
        Ok(character)
    }
}

/// Check the required form fields; the message is shown to the user as-is.
pub fn validate(new: &NewCharacter) -> std::result::Result<(), String> {
    let missing: Vec<&str> = [
        ("name", &new.name),
        ("role", &new.role),
        ("visual description", &new.visual_description),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Please fill in all required fields: {}",
            missing.join(", ")
        ))
    }
}

pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',').map(|t| t.trim().to_string()).collect()
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
    } else {
        tags
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn reference_prompt(new: &NewCharacter) -> String {
    let mut prompt = format!(
        "Character reference portrait of {}, {}. {}",
        new.name.trim(),
        new.role.trim(),
        new.visual_description.trim()
    );
    if let Some(age) = new.age.as_deref().filter(|a| !a.trim().is_empty()) {
        prompt.push_str(&format!(". Age {}", age.trim()));
    }
    prompt.push_str(&format!(
        ". Full body, neutral pose, plain light background, comic book style. {SAFETY_SUFFIX}"
    ));
    prompt
}
