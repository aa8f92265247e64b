use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// 10 MB cap on a request body, which bounds every uploaded file.
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

const MAX_NAME_LEN: usize = 100;

/// Stores uploaded files in one flat directory that is also served to
/// browsers. Files are addressed by their public path, e.g.
/// `/public/images/3fa4c2d19b0e77aa_cat.png`.
pub struct Uploads {
    dir: PathBuf,
    public_prefix: String,
}

impl Uploads {
    pub async fn new(dir: PathBuf, public_prefix: &str) -> io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Writes an upload and returns its public path. Empty uploads are
    /// skipped and yield `None`.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> io::Result<Option<String>> {
        if data.is_empty() {
            return Ok(None);
        }
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "upload too large"));
        }

        let file_name = stored_name(original_name, data);
        let path = self.dir.join(&file_name);

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        info!("Stored upload {} ({} bytes)", path.display(), data.len());
        Ok(Some(format!("{}/{}", self.public_prefix, file_name)))
    }

    /// Deletes the file behind a public path. Paths outside the upload
    /// directory (default icons) and already missing files are ignored.
    pub async fn remove(&self, public_path: &str) {
        let Some(path) = self.disk_path(public_path) else {
            return;
        };
        match fs::remove_file(&path).await {
            Ok(()) => info!("Removed upload {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", path.display(), e),
        }
    }

    fn disk_path(&self, public_path: &str) -> Option<PathBuf> {
        let name = public_path
            .strip_prefix(&self.public_prefix)?
            .strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.dir.join(name))
    }
}

/// Content hash prefix plus the sanitized client file name. Identical
/// uploads map to the same file.
pub fn stored_name(original_name: &str, data: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(data));
    let name = sanitize_filename(original_name);
    if name.is_empty() {
        digest[..16].to_string()
    } else {
        format!("{}_{}", &digest[..16], name)
    }
}

/// Keeps ASCII alphanumerics, dots, dashes and underscores of the last
/// path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(MAX_NAME_LEN)
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// A file part of a multipart body.
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// Text fields and the first non-empty file part of a multipart body.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl MultipartForm {
    /// Collects every field. The part named `file_field` is read as
    /// bytes; all others as text.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, MultipartError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == file_field {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if !data.is_empty() && form.file.is_none() {
                    form.file = Some(UploadedFile { file_name, data });
                }
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed value of a text field; missing fields read as empty.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or("")
    }

    /// Trimmed value, `None` when missing or blank.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        Some(self.text(name)).filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self) -> Option<UploadedFile> {
        self.file.take()
    }
}
