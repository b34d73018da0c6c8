use crate::config::ServerConfig;
use std::path::Path;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn new_state_exposes_directories() {
        let state = AppState::new(ServerConfig::new(
            PathBuf::from("/tmp/in"),
            PathBuf::from("/tmp/out"),
        ));
        assert_eq!(state.upload_dir(), Path::new("/tmp/in"));
        assert_eq!(state.output_dir(), Path::new("/tmp/out"));
    }
}
