use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::{Comic, PanelPrompt};
use crate::services::renderer::{self, Captioner, ImageModel};
use crate::utils;

const METADATA_FILE: &str = "metadata.json";

/// Renders approved panel prompts into `<comics_dir>/<id>/`.
pub struct ComicFactory {
    comics_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ComicFactory {
    pub fn new(comics_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            comics_dir: comics_dir.into(),
            width,
            height,
        }
    }

    /// Generate every panel in order, caption it with its dialogue and write
    /// the metadata sidecar. Panels that fail to render are skipped.
    pub async fn render(
        &self,
        image_model: &dyn ImageModel,
        captioner: &Captioner,
        story: &str,
        prompts: &[PanelPrompt],
    ) -> Result<Comic> {
        if prompts.is_empty() {
            bail!("no approved panel prompts to render");
        }

        let id = utils::short_id();
        let output_dir = self.comics_dir.join(&id);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("failed to create {}", output_dir.display()))?;

        if !captioner.can_caption() {
            tracing::info!(comic = %id, "No caption font loaded; panels are saved without dialogue");
        }

        // One base seed per strip; panel i uses base + i.
        let base_seed = uuid::Uuid::new_v4().as_u64_pair().0 % 1_000_000;
        let total = prompts.len();
        let mut image_paths = Vec::with_capacity(total);

        for (i, prompt) in prompts.iter().enumerate() {
            tracing::info!(comic = %id, panel = prompt.panel, "Generating panel {}/{}", i + 1, total);

            let path = output_dir.join(format!("panel_{}.png", prompt.panel));
            match self
                .render_panel(image_model, captioner, prompt, base_seed + i as u64, &path)
                .await
            {
                Ok(()) => image_paths.push(path.to_string_lossy().into_owned()),
                Err(e) => {
                    tracing::warn!(comic = %id, panel = prompt.panel, error = %format!("{e:#}"), "Panel failed; skipping");
                }
            }
        }

        if image_paths.is_empty() {
            let _ = tokio::fs::remove_dir_all(&output_dir).await;
            bail!("none of the {} panels could be rendered", total);
        }

        let comic = Comic {
            id,
            created_at: Utc::now(),
            story: story.to_string(),
            prompts: prompts.to_vec(),
            image_paths,
        };
        utils::write_json_atomic(&output_dir.join(METADATA_FILE), &comic).await?;

        tracing::info!(comic = %comic.id, panels = comic.image_paths.len(), "Comic strip generated");
        Ok(comic)
    }

    async fn render_panel(
        &self,
        image_model: &dyn ImageModel,
        captioner: &Captioner,
        prompt: &PanelPrompt,
        seed: u64,
        path: &Path,
    ) -> Result<()> {
        let bytes = image_model
            .generate(&prompt.image_prompt, self.width, self.height, seed)
            .await?;
        let image = renderer::decode(&bytes)?;
        let panel = captioner.add_caption(image, &prompt.dialogue);
        renderer::save_png(&panel, path).await
    }

    /// Metadata of one comic, `None` if no such comic exists.
    pub async fn load(&self, id: &str) -> Result<Option<Comic>> {
        if !utils::is_valid_id(id) {
            return Ok(None);
        }
        let path = self.comics_dir.join(id).join(METADATA_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("failed to parse {}", path.display()))?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// All comics with a readable sidecar, newest first.
    pub async fn list(&self) -> Result<Vec<Comic>> {
        let mut entries = match tokio::fs::read_dir(&self.comics_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut comics = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&id).await {
                Ok(Some(comic)) => comics.push(comic),
                Ok(None) => {}
                Err(e) => tracing::warn!(comic = %id, error = %e, "Skipping unreadable comic"),
            }
        }
        comics.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comics)
    }

    /// Zip of the rendered panels and `metadata.json`.
    pub async fn bundle(&self, comic: &Comic) -> Result<Vec<u8>> {
        let mut files = Vec::with_capacity(comic.image_paths.len() + 1);
        for path in &comic.image_paths {
            let path = Path::new(path);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "panel.png".to_string());
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            files.push((name, bytes));
        }
        files.push((METADATA_FILE.to_string(), serde_json::to_vec_pretty(comic)?));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in files {
            writer.start_file(name, options)?;
            writer.write_all(&bytes)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}
