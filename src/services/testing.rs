//! In-process stand-ins for the hosted models.

use anyhow::{Result, bail};
use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::services::llm::TextModel;
use crate::services::renderer::ImageModel;

pub struct FakeTextModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
    embed_calls: AtomicUsize,
}

impl FakeTextModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for FakeTextModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    async fn generate_with_image(&self, prompt: &str, image: &[u8], _mime_type: &str) -> Result<String> {
        if image.is_empty() {
            bail!("no image supplied");
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }
}

/// Hashed bag-of-words vector; texts sharing words score as similar.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; 1024];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % 1024) as usize] += 1.0;
    }
    vector
}

/// Serves a tiny PNG, optionally failing the listed (0-based) calls.
pub struct FakeImageModel {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    prompts: Mutex<Vec<String>>,
}

impl Default for FakeImageModel {
    fn default() -> Self {
        Self::failing_on(Vec::new())
    }
}

impl FakeImageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(fail_on: Vec<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageModel for FakeImageModel {
    async fn generate(&self, prompt: &str, width: u32, height: u32, seed: u64) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail_on.contains(&call) {
            bail!("image API returned 429 Too Many Requests");
        }
        Ok(png_bytes(width.min(16), height.min(16), (seed % 255) as u8))
    }
}

pub fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([shade, 128, 64, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}
