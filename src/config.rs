use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Service configuration loaded from the environment.
///
/// | Env Var                | Default                                              |
/// |------------------------|------------------------------------------------------|
/// | `HOST`                 | `0.0.0.0`                                            |
/// | `PORT`                 | `3000`                                               |
/// | `DATA_DIR`             | `./data`                                             |
/// | `TEXT_API_URL`         | `https://generativelanguage.googleapis.com/v1beta`   |
/// | `TEXT_API_KEY`         | falls back to `GEMINI_API_KEY`, otherwise unset      |
/// | `TEXT_MODEL`           | `gemini-1.5-flash`                                   |
/// | `EMBEDDING_MODEL`      | `text-embedding-004`                                 |
/// | `IMAGE_API_URL`        | `https://image.pollinations.ai`                      |
/// | `PANEL_WIDTH`          | `768`                                                |
/// | `PANEL_HEIGHT`         | `768`                                                |
/// | `CAPTION_FONT`         | unset (captions skipped)                             |
/// | `REQUEST_TIMEOUT_SECS` | `120`                                                |
/// | `RAG_TOP_K`            | `3`                                                  |
/// | `MAX_UPLOAD_BYTES`     | `20971520`                                           |
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub text_api_url: String,
    pub text_api_key: Option<String>,
    pub text_model: String,
    pub embedding_model: String,
    pub image_api_url: String,
    pub panel_width: u32,
    pub panel_height: u32,
    pub caption_font: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub rag_top_k: usize,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            text_api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_api_key: None,
            text_model: "gemini-1.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            image_api_url: "https://image.pollinations.ai".to_string(),
            panel_width: 768,
            panel_height: 768,
            caption_font: None,
            request_timeout_secs: 120,
            rag_top_k: 3,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let text_api_key = std::env::var("TEXT_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            host: env_or("HOST", defaults.host),
            port: parse_env("PORT", defaults.port)?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            text_api_url: env_or("TEXT_API_URL", defaults.text_api_url),
            text_api_key,
            text_model: env_or("TEXT_MODEL", defaults.text_model),
            embedding_model: env_or("EMBEDDING_MODEL", defaults.embedding_model),
            image_api_url: env_or("IMAGE_API_URL", defaults.image_api_url),
            panel_width: parse_env("PANEL_WIDTH", defaults.panel_width)?,
            panel_height: parse_env("PANEL_HEIGHT", defaults.panel_height)?,
            caption_font: std::env::var("CAPTION_FONT").ok().map(PathBuf::from),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            rag_top_k: parse_env("RAG_TOP_K", defaults.rag_top_k)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }

    /// Defaults rooted at `data_dir`; used by tests and embedders.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn characters_file(&self) -> PathBuf {
        self.data_dir.join("characters.json")
    }

    pub fn character_images_dir(&self) -> PathBuf {
        self.data_dir.join("characters")
    }

    pub fn stories_file(&self) -> PathBuf {
        self.data_dir.join("stories.json")
    }

    pub fn comics_dir(&self) -> PathBuf {
        self.data_dir.join("comics")
    }

    pub fn magic_dir(&self) -> PathBuf {
        self.data_dir.join("magic")
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
