use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;

/// Durable-storage key under which the bearer token is kept.
pub const TOKEN_KEY: &str = "auth_token";

/// Storage of the bearer token. Shared between the session gate, which writes it, and the API
/// client, which attaches it to every request.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Token kept in a plain text file.
pub struct FileTokenStore {
    filepath: PathBuf,
}

impl FileTokenStore {
    pub fn new(filepath: PathBuf) -> Self {
        Self { filepath }
    }

    /// Token file at `<data_dir>/auth_token`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(TOKEN_KEY))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        if !self.filepath.exists() {
            return None;
        }
        match fs::read_to_string(&self.filepath) {
            Ok(token) => {
                let token = token.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(err) => {
                log::warn!("Could not read token file {:?}: {}", self.filepath, err);
                None
            }
        }
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        fs::write(&self.filepath, token)
            .with_context(|| format!("Writing token file {:?}", self.filepath))
    }

    fn clear(&self) -> anyhow::Result<()> {
        if self.filepath.exists() {
            fs::remove_file(&self.filepath)
                .with_context(|| format!("Removing token file {:?}", self.filepath))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|token| token.clone())
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        let mut stored = self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        *stored = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut stored = self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        *stored = None;
        Ok(())
    }
}
