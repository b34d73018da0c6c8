use crate::error::AppError;
use axum::extract::Multipart;
use ifcmeta_core::paths;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Multipart part carrying the model file.
pub const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// StagedFile: removed when the guard drops
// ---------------------------------------------------------------------------

/// Owns a path on disk for the length of a request and removes the file when
/// dropped. Removal is best-effort: failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match ifcmeta_core::io::remove_if_exists(&self.path) {
            Ok(true) => tracing::debug!(path = %self.path.display(), "removed temp file"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StagedUpload / UploadForm
// ---------------------------------------------------------------------------

/// An uploaded model saved under the upload directory.
#[derive(Debug)]
pub struct StagedUpload {
    file: StagedFile,
    filename: String,
    size: u64,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Sanitized client filename (without the unique prefix).
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Everything a multipart request carried: at most one staged file plus the
/// text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<StagedUpload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Drain a multipart request, streaming the `file` part into `upload_dir`.
///
/// A `file` part without a filename counts as no file. Only the first `file`
/// part is kept, and only the first value of each text field.
pub async fn read_form(mut multipart: Multipart, upload_dir: &Path) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == FILE_FIELD {
            let client_name = field.file_name().unwrap_or_default().to_owned();
            if client_name.is_empty() || form.file.is_some() {
                continue;
            }

            ifcmeta_core::io::ensure_dir(upload_dir)?;
            let filename = paths::secure_filename(&client_name);
            let unique = uuid::Uuid::new_v4().simple().to_string();
            let staged = StagedFile::new(upload_dir.join(paths::staged_filename(&unique, &filename)));

            let mut out = tokio::fs::File::create(staged.path()).await?;
            let mut size = 0u64;
            while let Some(chunk) = field.chunk().await? {
                out.write_all(&chunk).await?;
                size += chunk.len() as u64;
            }
            out.flush().await?;

            tracing::info!(
                filename = %filename,
                path = %staged.path().display(),
                size,
                "upload staged"
            );
            form.file = Some(StagedUpload {
                file: staged,
                filename,
                size,
            });
        } else {
            let value = field.text().await?;
            form.fields.entry(name).or_insert(value);
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn staged_file_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.ifc");
        std::fs::write(&path, b"x").unwrap();
        drop(StagedFile::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn dropping_guard_for_missing_file_is_quiet() {
        let dir = TempDir::new().unwrap();
        drop(StagedFile::new(dir.path().join("never-written.ifc")));
    }

    #[test]
    fn form_field_lookup() {
        let mut form = UploadForm::default();
        form.fields.insert("saveToFolder".into(), "true".into());
        assert_eq!(form.field("saveToFolder"), Some("true"));
        assert_eq!(form.field("ifcSiteValue"), None);
        assert!(form.file.is_none());
    }
}
