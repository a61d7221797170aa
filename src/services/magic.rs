use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::models::Character;
use crate::services::llm::TextModel;
use crate::services::prompts::{SAFETY_GUIDELINES, SAFETY_SUFFIX};
use crate::services::renderer::{self, ImageModel};
use crate::utils;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtStyle {
    #[default]
    ComicBook,
    Cinematic,
    Anime,
    Watercolor,
    PixelArt,
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtStyle::ComicBook => "Comic Book",
            ArtStyle::Cinematic => "Cinematic",
            ArtStyle::Anime => "Anime",
            ArtStyle::Watercolor => "Watercolor",
            ArtStyle::PixelArt => "Pixel Art",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reimagined {
    pub image_path: String,
    pub description: String,
}

/// Free-form image generation outside the six-panel flow. Output lands in
/// the magic directory under a fresh name per call.
pub struct ImageMagic {
    output_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ImageMagic {
    pub fn new(output_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            width,
            height,
        }
    }

    pub async fn text_to_image(
        &self,
        image_model: &dyn ImageModel,
        description: &str,
        characters: &[Character],
        style: ArtStyle,
    ) -> Result<String> {
        let description = description.trim();
        if description.is_empty() {
            bail!("scene description is empty");
        }
        let prompt = scene_prompt(description, characters, style);
        self.render(image_model, &prompt, "magic").await
    }

    /// Describe an uploaded picture, then draw the same scene with the
    /// selected characters in it.
    pub async fn reimagine(
        &self,
        text_model: &dyn TextModel,
        image_model: &dyn ImageModel,
        image: &[u8],
        characters: &[Character],
        instructions: &str,
    ) -> Result<Reimagined> {
        if characters.is_empty() {
            bail!("select at least one character to use in the reimagined image");
        }
        let mime_type = mime_type_of(image)?;

        let description = text_model
            .generate_with_image(
                "Describe this image's scene for an illustrator: setting, composition, poses, \
                 actions, lighting and mood. Do not identify real people. Keep it under 120 words.",
                image,
                mime_type,
            )
            .await
            .context("Image analysis failed")?;

        let mut prompt = format!(
            "Recreate this scene: {}",
            description.trim().trim_end_matches('.')
        );
        let cast = character_looks(characters);
        prompt.push_str(&format!(". Replace the people with these characters: {cast}"));
        let instructions = instructions.trim();
        if !instructions.is_empty() {
            prompt.push_str(&format!(". {instructions}"));
        }
        prompt.push_str(&format!(". Style: {}. {SAFETY_SUFFIX}", ArtStyle::ComicBook));

        let image_path = self.render(image_model, &prompt, "reimagined").await?;
        Ok(Reimagined {
            image_path,
            description,
        })
    }

    async fn render(&self, image_model: &dyn ImageModel, prompt: &str, prefix: &str) -> Result<String> {
        let seed = uuid::Uuid::new_v4().as_u64_pair().0 % 1_000_000;
        let bytes = image_model
            .generate(prompt, self.width, self.height, seed)
            .await
            .context("Image generation failed")?;
        let image = renderer::decode(&bytes)?;

        let path = self
            .output_dir
            .join(format!("{}_{}.png", prefix, utils::short_id()));
        renderer::save_png(&image.to_rgba8(), &path).await?;
        tracing::info!(path = %path.display(), "Image saved");
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Write a short story inspired by an uploaded picture.
pub async fn story_from_image(text_model: &dyn TextModel, image: &[u8]) -> Result<String> {
    let mime_type = mime_type_of(image)?;
    let prompt = format!(
        "Look at this image and write a short, funny comic story of 150 to 250 words inspired by it, \
         set in a school in Gandhinagar. Start with a line \"Title: ...\". \
         It should be easy to tell in six comic panels. {SAFETY_GUIDELINES}"
    );
    let story = text_model
        .generate_with_image(&prompt, image, mime_type)
        .await
        .context("Story generation from image failed")?;
    Ok(story.trim().to_string())
}

pub fn scene_prompt(description: &str, characters: &[Character], style: ArtStyle) -> String {
    let mut prompt = description.trim().trim_end_matches('.').to_string();
    if !characters.is_empty() {
        prompt.push_str(&format!(". Characters: {}", character_looks(characters)));
    }
    prompt.push_str(&format!(". Style: {style}. {SAFETY_SUFFIX}"));
    prompt
}

fn character_looks(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|c| {
            if c.visual_description.trim().is_empty() {
                c.name.clone()
            } else {
                format!("{}: {}", c.name, c.visual_description.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn mime_type_of(image: &[u8]) -> Result<&'static str> {
    match image::guess_format(image) {
        Ok(image::ImageFormat::Png) => Ok("image/png"),
        Ok(image::ImageFormat::Jpeg) => Ok("image/jpeg"),
        Ok(image::ImageFormat::WebP) => Ok("image/webp"),
        _ => bail!("upload is not a PNG, JPEG or WebP image"),
    }
}
