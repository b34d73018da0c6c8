use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 500;

/// Runtime settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Where uploads are staged for the length of one request.
    pub upload_dir: PathBuf,
    /// Where modified files are written (and kept, when asked to).
    pub output_dir: PathBuf,
    /// `None`, empty or `*` allows any origin; otherwise a comma-separated
    /// list of allowed origins.
    pub cors_origin: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: ifcmeta_core::paths::default_upload_dir(),
            output_dir: ifcmeta_core::paths::default_output_dir(),
            cors_origin: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn new(upload_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            upload_dir,
            output_dir,
            ..Self::default()
        }
    }

    pub fn with_cors_origin(mut self, origin: Option<String>) -> Self {
        self.cors_origin = origin;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Create the upload and output directories.
    pub fn prepare_dirs(&self) -> ifcmeta_core::Result<()> {
        ifcmeta_core::io::ensure_dir(&self.upload_dir)?;
        ifcmeta_core::io::ensure_dir(&self.output_dir)?;
        tracing::info!(
            upload_dir = %self.upload_dir.display(),
            output_dir = %self.output_dir.display(),
            "storage directories ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_500_mib_uploads() {
        let config = ServerConfig::default();
        assert_eq!(config.max_upload_bytes, 500 * 1024 * 1024);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn prepare_dirs_creates_both_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ServerConfig::new(dir.path().join("in"), dir.path().join("out/nested"));
        config.prepare_dirs().unwrap();
        assert!(config.upload_dir.is_dir());
        assert!(config.output_dir.is_dir());
        // Idempotent.
        config.prepare_dirs().unwrap();
    }

    #[test]
    fn builders_override_defaults() {
        let config = ServerConfig::new("a".into(), "b".into())
            .with_cors_origin(Some("http://localhost:3000".into()))
            .with_max_upload_bytes(10);
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.max_upload_bytes, 10);
    }
}
