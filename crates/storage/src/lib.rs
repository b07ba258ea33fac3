pub mod interchange;

use directories::ProjectDirs;
use doc_model::{AnnotationState, Preferences};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use interchange::{
    parse_import, suggested_file_name, to_export_json, ImportError, ImportOutcome, ImportReport,
    RejectedRecord,
};

const PREFS_SCHEMA_VERSION: u32 = 1;
const PREFERENCES_KEY: &str = "preferences";
const DOCUMENT_KEY_PREFIX: &str = "annotations:";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// String key/value store the viewer persists into.
///
/// Writes are last-write-wins.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Marginalia", "Marginalia")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", escape(key)))
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let path = self.entry_path(key);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Replace every byte outside `[A-Za-z0-9.-]` with `_` and two hex digits.
/// `_` itself is escaped, so distinct inputs never produce the same output.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("_{byte:02x}"));
        }
    }
    escaped
}

/// Storage key for a document's annotation state, derived from its locator.
pub fn document_key(locator: &str) -> String {
    format!("{DOCUMENT_KEY_PREFIX}{}", escape(locator))
}

/// Load persisted state for a document. Anything unreadable yields an empty
/// state rather than an error.
pub fn load_state(backend: &dyn StorageBackend, locator: &str) -> AnnotationState {
    let key = document_key(locator);

    let raw = match backend.get(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return AnnotationState::default(),
        Err(error) => {
            warn!(?error, %key, "failed to read persisted annotations");
            return AnnotationState::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(error) => {
            warn!(?error, %key, "failed to parse persisted annotations");
            AnnotationState::default()
        }
    }
}

pub fn save_state(
    backend: &mut dyn StorageBackend,
    locator: &str,
    state: &AnnotationState,
) -> Result<(), StorageError> {
    let key = document_key(locator);
    let json = serde_json::to_string(state)?;
    backend.set(&key, &json)?;
    debug!(%key, bytes = json.len(), "persisted annotations");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: Preferences,
}

pub fn load_preferences(backend: &dyn StorageBackend) -> Result<Preferences, StorageError> {
    let Some(raw) = backend.get(PREFERENCES_KEY)? else {
        return Ok(Preferences::default());
    };

    let envelope: PreferencesEnvelope = serde_json::from_str(&raw)?;
    if envelope.version != PREFS_SCHEMA_VERSION {
        warn!(version = envelope.version, "unexpected preferences schema version");
    }

    Ok(envelope.preferences)
}

pub fn save_preferences(
    backend: &mut dyn StorageBackend,
    preferences: &Preferences,
) -> Result<(), StorageError> {
    let envelope =
        PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

    let json = serde_json::to_string_pretty(&envelope)?;
    backend.set(PREFERENCES_KEY, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{NormalizedRect, Theme, Tool};

    fn sample_state() -> AnnotationState {
        let mut state = AnnotationState::new();
        state.push_annotation(1, NormalizedRect::new(0.1, 0.1, 0.3, 0.2));
        state
    }

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStorage::with_root(temp.path());

        let prefs = Preferences {
            theme: Theme::Dark,
            default_tool: Tool::Note,
            history_limit: 12,
            min_drag_px: 2.0,
        };

        save_preferences(&mut store, &prefs).expect("save should succeed");
        let loaded = load_preferences(&store).expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn load_defaults_when_preferences_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStorage::with_root(temp.path());

        let loaded = load_preferences(&store).expect("load should succeed");
        assert_eq!(loaded, Preferences::default());
    }

    #[test]
    fn document_keys_are_escaped_and_distinct() {
        assert_eq!(document_key("/docs/a b.pdf"), "annotations:_2fdocs_2fa_20b.pdf");
        assert_eq!(document_key("notes-1.txt"), "annotations:notes-1.txt");
        assert_ne!(document_key("/docs/a.pdf"), document_key("/docs/b.pdf"));
    }

    #[test]
    fn similar_locators_do_not_share_a_key() {
        assert_ne!(document_key("/a/b.pdf"), document_key("/a_b.pdf"));
        assert_ne!(document_key("a b.pdf"), document_key("a_b.pdf"));
        assert_ne!(document_key("caf\u{e9}.pdf"), document_key("caf_.pdf"));
    }

    #[test]
    fn similar_locators_keep_separate_state_on_disk() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStorage::with_root(temp.path());

        save_state(&mut store, "/a/b.pdf", &sample_state()).expect("save should succeed");

        assert_eq!(load_state(&store, "/a/b.pdf"), sample_state());
        assert!(load_state(&store, "/a_b.pdf").is_empty());
    }

    #[test]
    fn state_round_trips_through_file_storage() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStorage::with_root(temp.path());

        save_state(&mut store, "/docs/report.pdf", &sample_state()).expect("save should succeed");

        assert_eq!(load_state(&store, "/docs/report.pdf"), sample_state());
        assert!(load_state(&store, "/docs/other.pdf").is_empty());
    }

    #[test]
    fn corrupt_persisted_state_falls_back_to_empty() {
        let mut store = MemoryStorage::new();
        store.set(&document_key("doc.txt"), "{not json").expect("set should succeed");

        assert!(load_state(&store, "doc.txt").is_empty());
    }

    #[test]
    fn file_storage_get_missing_key_is_none_and_remove_is_idempotent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStorage::with_root(temp.path().join("nested"));

        assert!(store.get("absent").expect("get should succeed").is_none());
        store.remove("absent").expect("remove should succeed");

        store.set("k", "v").expect("set should succeed");
        assert_eq!(store.get("k").expect("get should succeed").as_deref(), Some("v"));
        store.remove("k").expect("remove should succeed");
        assert!(store.get("k").expect("get should succeed").is_none());
    }
}
