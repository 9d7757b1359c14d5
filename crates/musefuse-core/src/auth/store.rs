use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::error::AuthError;
use super::session::SessionData;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Durable storage for the single session record.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionData>, AuthError>;
    fn save(&self, data: &SessionData) -> Result<(), AuthError>;
    /// Remove the record. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), AuthError>;
}

/// JSON file under the data directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SessionData>, AuthError> {
        let raw = match fs::read_to_string(self.path()) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, data: &SessionData) -> Result<(), AuthError> {
        let path = self.path();
        Self::ensure_parent(&path)?;
        let contents = serde_json::to_string_pretty(data)?;
        fs::write(&path, contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    data: Mutex<Option<SessionData>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(data: SessionData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }

    pub fn snapshot(&self) -> Option<SessionData> {
        self.data.lock().clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SessionData>, AuthError> {
        Ok(self.snapshot())
    }

    fn save(&self, data: &SessionData) -> Result<(), AuthError> {
        *self.data.lock() = Some(data.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.data.lock() = None;
        Ok(())
    }
}
