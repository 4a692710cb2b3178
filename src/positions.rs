//! Durable reading positions and bookmarks per document

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const LAST_PAGE_PREFIX: &str = "lastPage:";
const BOOKMARKS_PREFIX: &str = "bookmarks:";

/// Key-value durable storage
pub trait Storage {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Storage that lives only as long as the process
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub updated: chrono::DateTime<chrono::Utc>,
}

/// Storage kept in a pretty-printed JSON file.
///
/// Without a file path it behaves like [`MemoryStorage`] and never touches
/// disk. Every write rewrites the whole file.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFileStorage {
    entries: HashMap<String, StoredValue>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl JsonFileStorage {
    pub fn ephemeral() -> Self {
        Self {
            entries: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            entries: HashMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load positions from {}: {}", path.display(), e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut storage: Self = serde_json::from_str(&content)?;
            storage.file_path = Some(file_path.to_path_buf());
            Ok(storage)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            // Ephemeral storage doesn't save to disk
            None => Ok(()),
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Document whose position was written last
    pub fn most_recent_document(&self) -> Option<String> {
        self.entries
            .iter()
            .filter(|(key, _)| key.starts_with(LAST_PAGE_PREFIX))
            .max_by_key(|(_, stored)| stored.updated)
            .map(|(key, _)| key[LAST_PAGE_PREFIX.len()..].to_string())
    }
}

impl Storage for JsonFileStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|stored| stored.value.clone()))
    }

    fn write(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                updated: chrono::Utc::now(),
            },
        );
        self.save()
    }
}

/// Last-viewed page and bookmarks, scoped by document key.
///
/// Last write wins. Storage failures are logged and otherwise ignored so a
/// broken disk never interrupts reading.
#[derive(Debug)]
pub struct PositionStore<S: Storage> {
    storage: S,
}

impl<S: Storage> PositionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    pub fn load(&self, document_key: &str) -> Option<usize> {
        let key = format!("{LAST_PAGE_PREFIX}{document_key}");
        match self.storage.read(&key) {
            Ok(Some(value)) => match value.trim().parse::<usize>() {
                Ok(page) if page >= 1 => Some(page),
                _ => {
                    log::warn!("Ignoring invalid stored page {value:?} for {document_key}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to read position for {document_key}: {e}");
                None
            }
        }
    }

    pub fn save(&mut self, document_key: &str, page: usize) {
        let key = format!("{LAST_PAGE_PREFIX}{document_key}");
        if let Err(e) = self.storage.write(&key, &page.to_string()) {
            log::error!("Failed to save position for {document_key}: {e}");
        }
    }

    pub fn load_bookmarks(&self, document_key: &str) -> Vec<usize> {
        let key = format!("{BOOKMARKS_PREFIX}{document_key}");
        let value = match self.storage.read(&key) {
            Ok(Some(value)) => value,
            Ok(None) => return vec![],
            Err(e) => {
                log::error!("Failed to read bookmarks for {document_key}: {e}");
                return vec![];
            }
        };

        let mut pages: Vec<usize> = serde_json::from_str(&value).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt bookmarks for {document_key}: {e}");
            vec![]
        });
        // Callers binary-search the list
        pages.retain(|&page| page >= 1);
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    pub fn save_bookmarks(&mut self, document_key: &str, pages: &[usize]) {
        let key = format!("{BOOKMARKS_PREFIX}{document_key}");
        let result = serde_json::to_string(pages)
            .map_err(anyhow::Error::from)
            .and_then(|value| self.storage.write(&key, &value));
        if let Err(e) = result {
            log::error!("Failed to save bookmarks for {document_key}: {e}");
        }
    }
}
