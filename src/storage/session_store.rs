use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key holding the login token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the username the token belongs to.
pub const USERNAME_KEY: &str = "username";

/// Session files are two short strings; anything larger is not ours.
const MAX_FILE_SIZE: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode session file: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Durable string key/value store for the login session.
///
/// Access is synchronous. `clear` is the only way to end a session without
/// talking to the server.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Session store persisted as a small TOML table, e.g.
/// `~/.config/snooze/session.toml`.
///
/// The file is read once on open and rewritten atomically on every `set`.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileSessionStore {
    /// Open the store at `path`.
    ///
    /// A missing, empty, oversized or unparsable file opens as an empty store;
    /// the next `set` replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        Self { path, entries }
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > MAX_FILE_SIZE => {
                tracing::warn!(
                    path = %path.display(),
                    size = meta.len(),
                    "Session file too large, ignoring"
                );
                return BTreeMap::new();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No session file, starting anonymous");
                return BTreeMap::new();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat session file");
                return BTreeMap::new();
            }
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read session file");
                return BTreeMap::new();
            }
        };

        match toml::from_str::<BTreeMap<String, String>>(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Corrupt session file, ignoring"
                );
                BTreeMap::new()
            }
        }
    }

    /// Write all entries using write-to-temp-then-rename so the file is never
    /// left half written.
    fn persist(&self) -> Result<(), StoreError> {
        let content = toml::to_string(&self.entries)?;
        let temp_path = self.path.with_extension("toml.tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // The token grants write access to the account.
            options.mode(0o600);
        }

        let write_result = (|| -> std::io::Result<()> {
            let mut file = options.open(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            drop(file);

            #[cfg(windows)]
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }

            std::fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store that forgets everything when the process exits.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snooze_session_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_memory_store_set_get_clear() {
        let mut store = MemorySessionStore::new();
        assert_eq!(store.get(TOKEN_KEY), None);

        store.set(TOKEN_KEY, "tok").unwrap();
        store.set(USERNAME_KEY, "ada").unwrap();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("tok"));
        assert_eq!(store.get(USERNAME_KEY).as_deref(), Some("ada"));

        store.clear().unwrap();
        assert_eq!(store.get(TOKEN_KEY), None);
        assert_eq!(store.get(USERNAME_KEY), None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = test_dir("reopen");
        let path = dir.join("session.toml");

        let mut store = FileSessionStore::open(&path);
        store.set(TOKEN_KEY, "tok-123").unwrap();
        store.set(USERNAME_KEY, "ada").unwrap();

        let reopened = FileSessionStore::open(&path);
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("tok-123"));
        assert_eq!(reopened.get(USERNAME_KEY).as_deref(), Some("ada"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = test_dir("clear");
        let path = dir.join("session.toml");

        let mut store = FileSessionStore::open(&path);
        store.set(TOKEN_KEY, "tok").unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(FileSessionStore::open(&path).get(TOKEN_KEY), None);

        // Clearing twice is fine.
        store.clear().unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let store = FileSessionStore::open("/tmp/snooze_test_nonexistent_session.toml");
        assert_eq!(store.get(TOKEN_KEY), None);
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = test_dir("corrupt");
        let path = dir.join("session.toml");
        std::fs::write(&path, "token = [not toml").unwrap();

        let store = FileSessionStore::open(&path);
        assert_eq!(store.get(TOKEN_KEY), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = test_dir("parent");
        let path = dir.join("nested").join("session.toml");

        let mut store = FileSessionStore::open(&path);
        store.set(USERNAME_KEY, "ada").unwrap();
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_user_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = test_dir("perms");
        let path = dir.join("session.toml");

        let mut store = FileSessionStore::open(&path);
        store.set(TOKEN_KEY, "tok").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        std::fs::remove_dir_all(&dir).ok();
    }
}
