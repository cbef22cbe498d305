// Image storage for article and project uploads

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use tokio::fs;

use crate::error::{AppError, Result};

/// URL prefix under which managed files are served and stored.
pub const UPLOADS_PREFIX: &str = "/uploads/";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// An image as it arrives with a create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Raw bytes to be written to the upload directory.
    Bytes { data: Vec<u8>, extension: String },
    /// External URL or an already-stored `/uploads/...` path, kept verbatim.
    Link(String),
    /// Clear the image reference.
    Remove,
}

impl ImageInput {
    /// Interprets a text value: a `data:` URL, a link, or empty for removal.
    pub fn from_text(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(ImageInput::Remove);
        }
        if value.starts_with("data:") {
            let (data, extension) = decode_data_url(value)?;
            return Ok(ImageInput::Bytes { data, extension });
        }
        if value.starts_with("http://")
            || value.starts_with("https://")
            || is_managed_path(value)
        {
            return Ok(ImageInput::Link(value.to_string()));
        }
        Err(AppError::Validation(
            "image must be a data URL, an http(s) URL or an uploaded image path".to_string(),
        ))
    }

    /// A multipart file part. Type comes from the file name, then the content type.
    pub fn from_upload(
        data: Vec<u8>,
        file_name: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Self> {
        let from_name = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

        let extension = from_name
            .or_else(|| content_type.and_then(extension_for_mime).map(str::to_string))
            .ok_or_else(|| {
                AppError::Validation("Only png, jpeg, gif and webp images are accepted".to_string())
            })?;

        Ok(ImageInput::Bytes { data, extension })
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Decodes `data:image/<type>;base64,<payload>` into bytes and a file extension.
pub fn decode_data_url(value: &str) -> Result<(Vec<u8>, String)> {
    let invalid = || AppError::Validation("image is not a valid base64 data URL".to_string());

    let rest = value.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    let extension = extension_for_mime(mime).ok_or_else(|| {
        AppError::Validation("Only png, jpeg, gif and webp images are accepted".to_string())
    })?;

    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let data = STANDARD.decode(payload).map_err(|_| invalid())?;
    if data.is_empty() {
        return Err(invalid());
    }

    Ok((data, extension.to_string()))
}

/// Whether a stored image reference points into the managed upload directory.
pub fn is_managed_path(path: &str) -> bool {
    path.strip_prefix(UPLOADS_PREFIX)
        .is_some_and(is_plain_file_name)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

/// Maps an absolute URL that points back at this server's uploads to the
/// stored `/uploads/...` form. Anything else is returned unchanged.
pub fn local_reference(base_url: &str, link: &str) -> String {
    link.strip_prefix(base_url.trim_end_matches('/'))
        .filter(|rest| is_managed_path(rest))
        .unwrap_or(link)
        .to_string()
}

/// Makes a stored reference absolute for clients. External URLs pass through.
pub fn public_url(base_url: &str, stored: &str) -> String {
    if stored.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), stored)
    } else {
        stored.to_string()
    }
}

#[derive(Clone, Debug)]
pub struct ImageStore {
    base_path: PathBuf,
}

impl ImageStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {e}")))?;
        Ok(())
    }

    /// Resolves a managed `/uploads/<name>` reference to its file on disk.
    pub fn file_path(&self, stored: &str) -> Option<PathBuf> {
        stored
            .strip_prefix(UPLOADS_PREFIX)
            .filter(|name| is_plain_file_name(name))
            .map(|name| self.base_path.join(name))
    }

    /// Writes the bytes under a fresh `<millis>-<random>.<ext>` name and
    /// returns the `/uploads/...` reference.
    pub async fn save(&self, data: &[u8], extension: &str) -> Result<String> {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            suffix.to_ascii_lowercase(),
            extension
        );

        let path = self.base_path.join(&file_name);
        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write image: {e}")))?;

        tracing::debug!(file = %file_name, bytes = data.len(), "Stored image");
        Ok(format!("{UPLOADS_PREFIX}{file_name}"))
    }

    /// Turns a request's image into the reference to store on the row.
    pub async fn persist(&self, input: ImageInput) -> Result<Option<String>> {
        match input {
            ImageInput::Bytes { data, extension } => self.save(&data, &extension).await.map(Some),
            ImageInput::Link(link) => Ok(Some(link)),
            ImageInput::Remove => Ok(None),
        }
    }

    /// Deletes the file behind a managed reference. External URLs and paths
    /// outside the upload directory are left alone. Returns whether a file
    /// was removed.
    pub async fn remove(&self, stored: &str) -> Result<bool> {
        let Some(path) = self.file_path(stored) else {
            return Ok(false);
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed image");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Internal(format!("Failed to delete image: {e}"))),
        }
    }

    /// Best-effort removal for cleanup paths; failures are only logged.
    pub async fn discard(&self, stored: &str) {
        if let Err(e) = self.remove(stored).await {
            tracing::warn!(image = %stored, error = %e, "Failed to clean up image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn decodes_png_data_url() {
        let (data, ext) = decode_data_url(PNG_DATA_URL).unwrap();
        assert_eq!(ext, "png");
        assert_eq!(&data[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn rejects_non_image_and_malformed_data_urls() {
        assert!(decode_data_url("data:text/html;base64,PGI+").is_err());
        assert!(decode_data_url("data:image/png,rawpayload").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(decode_data_url("data:image/png;base64,").is_err());
    }

    #[test]
    fn text_values_are_classified() {
        assert_eq!(ImageInput::from_text("  ").unwrap(), ImageInput::Remove);
        assert_eq!(
            ImageInput::from_text("https://cdn.example.com/a.png").unwrap(),
            ImageInput::Link("https://cdn.example.com/a.png".to_string())
        );
        assert_eq!(
            ImageInput::from_text("/uploads/1-abc.png").unwrap(),
            ImageInput::Link("/uploads/1-abc.png".to_string())
        );
        assert!(matches!(
            ImageInput::from_text(PNG_DATA_URL).unwrap(),
            ImageInput::Bytes { ref extension, .. } if extension == "png"
        ));
        assert!(ImageInput::from_text("/etc/passwd").is_err());
        assert!(ImageInput::from_text("/uploads/../secret").is_err());
    }

    #[test]
    fn upload_type_comes_from_name_or_content_type() {
        let input = ImageInput::from_upload(vec![1], Some("Photo.JPG"), None).unwrap();
        assert!(matches!(input, ImageInput::Bytes { ref extension, .. } if extension == "jpg"));

        let input = ImageInput::from_upload(vec![1], Some("blob"), Some("image/webp")).unwrap();
        assert!(matches!(input, ImageInput::Bytes { ref extension, .. } if extension == "webp"));

        assert!(ImageInput::from_upload(vec![1], Some("x.svg"), Some("image/svg+xml")).is_err());
    }

    #[test]
    fn only_flat_upload_paths_are_managed() {
        assert!(is_managed_path("/uploads/1-abc.png"));
        assert!(!is_managed_path("/uploads/"));
        assert!(!is_managed_path("/uploads/../db.sqlite"));
        assert!(!is_managed_path("/uploads/a/b.png"));
        assert!(!is_managed_path("https://cdn.example.com/uploads/a.png"));
    }

    #[test]
    fn public_url_prefixes_local_paths_only() {
        assert_eq!(
            public_url("http://localhost:4000/", "/uploads/a.png"),
            "http://localhost:4000/uploads/a.png"
        );
        assert_eq!(
            public_url("http://localhost:4000", "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn local_reference_strips_own_base_url() {
        assert_eq!(
            local_reference("http://localhost:4000/", "http://localhost:4000/uploads/a.png"),
            "/uploads/a.png"
        );
        assert_eq!(
            local_reference("http://localhost:4000", "https://cdn.example.com/uploads/a.png"),
            "https://cdn.example.com/uploads/a.png"
        );
        assert_eq!(
            local_reference("http://localhost:4000", "http://localhost:4000/other/a.png"),
            "http://localhost:4000/other/a.png"
        );
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let stored = store.save(b"image-bytes", "png").await.unwrap();
        assert!(stored.starts_with(UPLOADS_PREFIX));
        assert!(stored.ends_with(".png"));
        let path = store.file_path(&stored).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"image-bytes");

        assert!(store.remove(&stored).await.unwrap());
        assert!(!path.exists());
        // Second removal is a no-op.
        assert!(!store.remove(&stored).await.unwrap());
    }

    #[tokio::test]
    async fn remove_ignores_external_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(!store.remove("https://cdn.example.com/a.png").await.unwrap());
        assert!(!store.remove("/uploads/../escape.png").await.unwrap());
    }
}
