use crate::{
    domain::ImageHost,
    errors::UploadError,
    models::ImageUpload,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing;

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Cloudinary unsigned upload: multipart `file` + `upload_preset`, answers with `secure_url`.
#[derive(Debug, Clone)]
pub struct CloudinaryHost {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryHost {
    pub fn new(client: reqwest::Client, upload_url: String, upload_preset: String) -> Self {
        Self {
            client,
            upload_url,
            upload_preset,
        }
    }

    /// Standard upload endpoint for a Cloudinary cloud.
    pub fn endpoint_for(cloud_name: &str) -> String {
        format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload")
    }
}

fn content_type_for(image: &ImageUpload) -> String {
    image
        .content_type
        .clone()
        .or_else(|| mime_guess::from_path(&image.file_name).first_raw().map(|s| s.to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    /// Uploads the image and returns the hosted URL.
    async fn upload(&self, image: ImageUpload) -> Result<String, UploadError> {
        let content_type = content_type_for(&image);
        tracing::debug!(
            file_name = %image.file_name,
            bytes = image.data.len(),
            %content_type,
            "Cloudinary: Uploading image"
        );

        let part = Part::bytes(image.data)
            .file_name(image.file_name.clone())
            .mime_str(&content_type)
            .context(format!("Cloudinary: Invalid content type '{content_type}'"))
            .map_err(UploadError::Transport)?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .context(format!("Cloudinary: Failed to upload '{}'", image.file_name))
            .map_err(UploadError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "Cloudinary: Upload rejected");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .context("Cloudinary: Failed to parse upload response")
            .map_err(UploadError::Transport)?;

        let url = body
            .secure_url
            .filter(|url| !url.is_empty())
            .ok_or(UploadError::MissingUrl)?;

        tracing::debug!(%url, "Cloudinary: Upload successful");
        Ok(url)
    }
}
