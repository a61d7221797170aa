use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;

/// Hosted text model: completion, vision completion and embeddings.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn generate_with_image(&self, prompt: &str, image: &[u8], mime_type: &str)
    -> Result<String>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    embedding_model: String,
}

impl LLMClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build text API client")?;

        if config.text_api_key.is_none() {
            tracing::warn!("TEXT_API_KEY is not set; text generation requests will be unauthenticated");
        }

        Ok(LLMClient {
            client,
            api_url: config.text_api_url.trim_end_matches('/').to_string(),
            api_key: config.text_api_key.clone(),
            model: config.text_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        let mut request_builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.header("x-goog-api-key", api_key);
        }

        let response = request_builder.send().await.context("text API request failed")?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            bail!("text API returned {}: {}", status, first_line(&response_text));
        }
        Ok(response_text)
    }

    async fn complete(&self, parts: Vec<Part<'_>>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);
        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig { temperature: 0.8 },
        };

        let response_text = self.post(&url, &body).await?;
        let parsed: GenerateResponse = serde_json::from_str(&response_text)
            .context("text API returned an unexpected response shape")?;
        extract_text(parsed)
    }
}

#[async_trait]
impl TextModel for LLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Text generation request");
        self.complete(vec![Part::Text { text: prompt }]).await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String> {
        tracing::debug!(model = %self.model, image_bytes = image.len(), "Vision request");
        self.complete(vec![
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data: BASE64.encode(image),
                },
            },
            Part::Text { text: prompt },
        ])
        .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.api_url, self.embedding_model);
        let body = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content {
                role: "user",
                parts: vec![Part::Text { text }],
            },
        };

        let response_text = self.post(&url, &body).await?;
        let parsed: EmbedResponse = serde_json::from_str(&response_text)
            .context("embedding API returned an unexpected response shape")?;
        if parsed.embedding.values.is_empty() {
            bail!("embedding API returned an empty vector");
        }
        Ok(parsed.embedding.values)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or_else(|| anyhow!("text API returned no candidates"))?;

    let text = text.trim();
    if text.is_empty() {
        bail!("text API returned an empty completion");
    }
    Ok(text.to_string())
}

fn first_line(text: &str) -> &str {
    let line = text.lines().next().unwrap_or("").trim();
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
