//! Image uploads from multipart forms.

use std::path::Path;

use axum::extract::Multipart;

use crate::error::AppResult;

pub const POST_IMAGE_DIR: &str = "post_image";
pub const PROFILE_IMAGE_DIR: &str = "profile_pics";

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Upper bound for a whole form submission.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A submitted file before it is written to disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Multipart form split into text fields (repeatable) and file fields.
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: Vec<(String, Upload)>,
}

impl FormData {
    /// Drain a multipart body. File inputs left empty by the browser are dropped.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.files.push((
                            name,
                            Upload {
                                file_name,
                                bytes: bytes.to_vec(),
                            },
                        ));
                    }
                }
                None => {
                    let value = field.text().await?;
                    form.fields.push((name, value));
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    /// Every value of a repeated field that parses as an id.
    pub fn ids(&self, name: &str) -> Vec<i64> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .filter_map(|(_, v)| v.trim().parse().ok())
            .collect()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        let index = self.files.iter().position(|(n, _)| n == name)?;
        Some(self.files.swap_remove(index).1)
    }
}

/// File extension for a recognised image, judged by content rather than name.
pub fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    (kind.matcher_type() == infer::MatcherType::Image).then(|| kind.extension())
}

/// Write an image under `root/subdir` with a fresh name. Returns the path
/// relative to `root`, which is what gets stored and served under `/media/`.
/// `None` means the bytes are not an image.
pub async fn save_image(root: &Path, subdir: &str, upload: &Upload) -> AppResult<Option<String>> {
    let Some(extension) = image_extension(&upload.bytes) else {
        tracing::warn!(file = %upload.file_name, "Rejected non-image upload");
        return Ok(None);
    };

    let dir = root.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let name = format!("{}.{}", uuid::Uuid::now_v7(), extension);
    tokio::fs::write(dir.join(&name), &upload.bytes).await?;

    tracing::debug!(file = %upload.file_name, stored = %name, "Saved image");
    Ok(Some(format!("{subdir}/{name}")))
}

/// Deletes a stored image that ended up unreferenced. Failures are only logged.
pub async fn remove_image(root: &Path, stored: &str) {
    if let Err(e) = tokio::fs::remove_file(root.join(stored)).await {
        tracing::warn!(file = %stored, "Could not remove image: {}", e);
    }
}
