use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Pixel, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::utils;

/// Hosted text-to-image model. Returns the encoded image bytes as served.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, prompt: &str, width: u32, height: u32, seed: u64) -> Result<Vec<u8>>;
}

pub struct PollinationsClient {
    client: reqwest::Client,
    api_url: String,
}

impl PollinationsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build image API client")?;

        Ok(Self {
            client,
            api_url: config.image_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageModel for PollinationsClient {
    async fn generate(&self, prompt: &str, width: u32, height: u32, seed: u64) -> Result<Vec<u8>> {
        let mut url = reqwest::Url::parse(&format!("{}/prompt/", self.api_url))
            .context("invalid IMAGE_API_URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("IMAGE_API_URL cannot be a base URL"))?
            .pop_if_empty()
            .push(prompt);
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("seed", &seed.to_string())
            .append_pair("nologo", "true");

        tracing::debug!(prompt_len = prompt.len(), seed, "Image generation request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("image API request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("image API returned {}", status);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            bail!("image API returned an empty body");
        }
        Ok(bytes.to_vec())
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("image API returned data that is not an image")
}

/// Draws dialogue captions onto rendered panels.
pub struct Captioner {
    font: Option<FontArc>,
}

impl Captioner {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(path) = &config.caption_font else {
            tracing::info!("CAPTION_FONT not set; panels will be saved without captions");
            return Ok(Self::new(None));
        };

        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read caption font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("{} is not a usable font", path.display()))?;
        Ok(Self::new(Some(font)))
    }

    pub fn can_caption(&self) -> bool {
        self.font.is_some()
    }

    /// Composite `text` as a banner along the bottom edge of `image`.
    pub fn add_caption(&self, image: DynamicImage, text: &str) -> RgbaImage {
        let mut canvas = image.to_rgba8();
        let text = text.trim();
        let Some(font) = &self.font else {
            return canvas;
        };
        if text.is_empty() {
            return canvas;
        }

        let (width, height) = canvas.dimensions();
        let font_size = (height as f32 / 24.0).max(12.0);
        let scale = PxScale::from(font_size);
        let padding = (font_size / 2.0) as u32;
        let max_line_width = width.saturating_sub(padding * 2).max(1);

        let lines = wrap_text(text, max_line_width, |candidate| {
            imageproc::drawing::text_size(scale, font, candidate).0
        });
        let line_height = (font_size * 1.2) as u32;
        let banner_height = (line_height * lines.len() as u32 + padding * 2).min(height);
        let banner_top = height - banner_height;

        let shade = Rgba([0, 0, 0, 170]);
        for y in banner_top..height {
            for x in 0..width {
                canvas.get_pixel_mut(x, y).blend(&shade);
            }
        }

        for (i, line) in lines.iter().enumerate() {
            let y = banner_top + padding + i as u32 * line_height;
            imageproc::drawing::draw_text_mut(
                &mut canvas,
                Rgba([255, 255, 255, 255]),
                padding as i32,
                y as i32,
                scale,
                font,
                line,
            );
        }
        canvas
    }
}

/// Greedy word wrap using `measure` for the pixel width of a candidate line.
/// A single word wider than `max_width` gets a line of its own.
pub fn wrap_text(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encode as PNG and move it into place; an existing file at `path` is only
/// replaced once the new one is fully written.
pub async fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode PNG")?;
    utils::write_atomic(path, buffer.get_ref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_width(s: &str) -> u32 {
        s.chars().count() as u32 * 10
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("Wake up Kabir you are late", 120, char_width);
        assert_eq!(lines, vec!["Wake up", "Kabir you", "are late"]);
    }

    #[test]
    fn long_word_gets_its_own_line() {
        let lines = wrap_text("a Supercalifragilistic b", 50, char_width);
        assert_eq!(lines, vec!["a", "Supercalifragilistic", "b"]);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_text("   ", 100, char_width).is_empty());
    }

    #[test]
    fn caption_without_font_keeps_pixels() {
        let captioner = Captioner::new(None);
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255])));
        let out = captioner.add_caption(image, "Hello there");
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(out.get_pixel(4, 7), &Rgba([10, 20, 30, 255]));
        assert!(!captioner.can_caption());
    }

    #[tokio::test]
    async fn saved_png_decodes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel_1.png");
        let image = RgbaImage::from_pixel(4, 3, Rgba([200, 0, 0, 255]));
        save_png(&image, &path).await.unwrap();

        let decoded = decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(decode(b"<html>rate limited</html>").is_err());
    }
}
