use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_DIRECTORY, IMAGE_EXTENSIONS},
    error::Error,
};

/// Writes uploaded recipe images below a media root.
///
/// Stored references are relative to the root (`recipes/<uuid>.png`) and are
/// turned into public URLs by prefixing the configured media URL.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    url_prefix: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Decodes a `data:image/<ext>;base64,<payload>` URI and persists it.
    pub async fn save(&self, data_uri: &str) -> Result<String, Error> {
        let (extension, bytes) = decode_data_uri(data_uri)?;

        let directory = self.root.join(IMAGE_DIRECTORY);
        tokio::fs::create_dir_all(&directory).await?;

        let file_name = format!("{}.{extension}", uuid::Uuid::new_v4());
        tokio::fs::write(directory.join(&file_name), bytes).await?;
        log::debug!("> Stored image {file_name}");

        Ok(format!("{IMAGE_DIRECTORY}/{file_name}"))
    }

    /// Best effort; a file that is already gone is only logged.
    pub async fn remove(&self, reference: &str) {
        if reference.is_empty() {
            return;
        }
        match tokio::fs::remove_file(self.root.join(reference)).await {
            Ok(_) => log::debug!("> Removed image {reference}"),
            Err(e) => log::warn!("> Failed to remove image {reference}: {e}"),
        }
    }

    pub fn url(&self, reference: &str) -> String {
        format!("{}{}", self.url_prefix, reference)
    }
}

fn decode_data_uri(data_uri: &str) -> Result<(String, Vec<u8>), Error> {
    let invalid = || Error::validation("image", "Upload a valid base64 encoded image");

    let (header, payload) = data_uri
        .trim()
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(invalid)?;

    let extension = match header.to_lowercase().as_str() {
        "jpeg" => String::from("jpg"),
        other if IMAGE_EXTENSIONS.contains(&other) => other.to_string(),
        _ => return Err(Error::validation("image", "Unsupported image format")),
    };

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok((extension, bytes))
}
