pub mod ask;
pub mod characters;
pub mod comics;
pub mod magic;
pub mod pages;
pub mod session;
pub mod stories;

use axum::extract::Multipart;
use image::ImageFormat;

use crate::error::{AppError, AppResult};
use crate::models::UploadedImage;
use crate::state::AppState;
use crate::utils;

/// A multipart form split into text fields and uploaded images. Every file
/// part must be a PNG, JPEG or WebP image.
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
    pub images: Vec<UploadedImage>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid form data: {e}")))?
        {
            let name = field.name().unwrap_or("unknown").to_string();
            if field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Failed to read upload: {e}")))?;
                if !bytes.is_empty() {
                    if !is_supported_image(&bytes) {
                        return Err(AppError::bad_request(format!(
                            "{} is not a PNG, JPEG or WebP image",
                            file_name.as_deref().unwrap_or(&name)
                        )));
                    }
                    form.images.push(UploadedImage {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Invalid form field {name}: {e}")))?;
                form.fields.push((name, value));
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default()
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name)).filter(|v| !v.is_empty())
    }

    /// Values of a repeated or comma-separated field.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .flat_map(|(_, value)| value.split(','))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn first_image(&self) -> AppResult<&UploadedImage> {
        self.images
            .first()
            .ok_or_else(|| AppError::bad_request("Please upload an image"))
    }
}

/// Browser URLs for stored files, in the same order as `paths`.
pub(crate) fn file_urls(state: &AppState, paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| utils::file_url(&state.config.data_dir, path))
        .collect()
}

fn is_supported_image(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)
    )
}
