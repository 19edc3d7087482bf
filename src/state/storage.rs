//! Storage backends for persisted interaction state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use wasm_bindgen::JsValue;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage callback failed: {0}")]
    Callback(String),
}

/// A string key-value store scoped to one browsing or CLI session.
pub trait StateStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File for `key`. Bytes outside `[A-Za-z0-9_-]` are percent-escaped,
    /// so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file.push(char::from(byte));
            } else {
                file.push_str(&format!("%{:02X}", byte));
            }
        }
        self.dir.join(format!("{}.json", file))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl StateStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| io_error(&path, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// Storage delegating to JavaScript callbacks, e.g. wrappers around
/// `sessionStorage.setItem`.
///
/// `save` is called as `save(key, value)`, `remove` as `remove(key)`.
/// Loading happens on the JavaScript side before the session is created.
pub struct CallbackStorage {
    save: js_sys::Function,
    remove: Option<js_sys::Function>,
}

impl CallbackStorage {
    pub fn new(save: js_sys::Function, remove: Option<js_sys::Function>) -> Self {
        Self { save, remove }
    }
}

fn callback_error(err: JsValue) -> StorageError {
    StorageError::Callback(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

impl StateStorage for CallbackStorage {
    fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.save
            .call2(&JsValue::NULL, &JsValue::from_str(key), &JsValue::from_str(value))
            .map(|_| ())
            .map_err(callback_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match &self.remove {
            Some(remove) => remove
                .call1(&JsValue::NULL, &JsValue::from_str(key))
                .map(|_| ())
                .map_err(callback_error),
            None => Ok(()),
        }
    }
}
