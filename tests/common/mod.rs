use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

use comicforge::config::Config;
use comicforge::routes;
use comicforge::services::llm::TextModel;
use comicforge::services::renderer::{Captioner, ImageModel};
use comicforge::state::AppState;

pub const STORY: &str = "Title: Late Again\nKabir woke up late for school. He ran to the bus stop. \
                         The bus had already left. Rohan waved from the window. \
                         Kabir borrowed a bicycle. He arrived just as the bell rang.";

/// Answers story prompts with [`STORY`], decomposition prompts with six
/// panels and anything else with a fixed sentence.
pub struct ScriptedTextModel;

#[async_trait]
impl TextModel for ScriptedTextModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.contains("sequential comic panels") {
            let panels: Vec<serde_json::Value> = (1..=6)
                .map(|n| {
                    serde_json::json!({
                        "panel": n,
                        "scene": format!("Scene {n}"),
                        "characters": ["Kabir"],
                        "dialogue": format!("Line {n}"),
                        "camera_angle": "wide shot",
                        "emotion": "panic",
                        "image_prompt": format!("Kabir rushing, scene {n}")
                    })
                })
                .collect();
            Ok(format!("```json\n{}\n```", serde_json::to_string(&panels)?))
        } else if prompt.contains("Story idea:") {
            Ok(STORY.to_string())
        } else {
            Ok("Kabir is always late.".to_string())
        }
    }

    async fn generate_with_image(&self, _prompt: &str, _image: &[u8], _mime: &str) -> Result<String> {
        Ok("A crowded school corridor.".to_string())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 1024];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % 1024) as usize] += 1.0;
        }
        Ok(vector)
    }
}

pub struct SolidImageModel;

#[async_trait]
impl ImageModel for SolidImageModel {
    async fn generate(&self, _prompt: &str, _width: u32, _height: u32, _seed: u64) -> Result<Vec<u8>> {
        Ok(png_bytes())
    }
}

pub fn png_bytes() -> Vec<u8> {
    let image = RgbaImage::from_pixel(8, 8, Rgba([90, 140, 200, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub fn build_test_app(data_dir: &std::path::Path) -> Router {
    let mut config = Config::with_data_dir(data_dir);
    config.panel_width = 8;
    config.panel_height = 8;

    let state = AppState::new(
        config,
        Arc::new(ScriptedTextModel),
        Arc::new(SolidImageModel),
        Captioner::new(None),
    );
    routes::router(state)
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn send_multipart(
    app: &Router,
    uri: &str,
    fields: &[(&str, &str)],
    files: &[(&str, Vec<u8>)],
) -> Response<Body> {
    let boundary = "comicforge-test-boundary";
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
