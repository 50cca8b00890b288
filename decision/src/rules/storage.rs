//! Rule storage backends
//!
//! Storage deals in raw records so that a malformed entry written by hand is
//! carried through rewrites untouched; parsing into [`super::Rule`] happens in
//! the repository.

use crate::config::is_yaml;
use crate::errors::RuleStoreError;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub rules: Vec<Value>,
}

fn default_schema_version() -> String {
    super::SCHEMA_VERSION.to_string()
}

impl Default for RuleDocument {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            rules: Vec::new(),
        }
    }
}

/// Backend holding the ordered rule records
pub trait RuleStorage: Send + Sync {
    /// Human-readable location for logs
    fn describe(&self) -> String;

    fn load(&self) -> Result<RuleDocument, RuleStoreError>;

    /// Append one record durably; returns the document as now persisted.
    ///
    /// Implementations serialize concurrent appends and re-read the current
    /// contents first, so records appended by other writers are kept.
    fn append(&self, record: Value) -> Result<RuleDocument, RuleStoreError>;
}

/// YAML or JSON file, chosen by extension
#[derive(Debug)]
pub struct FileRuleStorage {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl FileRuleStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn parse(&self, contents: &str) -> Result<RuleDocument, RuleStoreError> {
        if contents.trim().is_empty() {
            return Ok(RuleDocument::default());
        }
        let parsed = if is_yaml(&self.path) {
            serde_yaml::from_str(contents).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(contents).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| RuleStoreError::Parse {
            path: self.path.clone(),
            message,
        })
    }

    fn render(&self, doc: &RuleDocument) -> Result<String, RuleStoreError> {
        if is_yaml(&self.path) {
            serde_yaml::to_string(doc).map_err(|e| RuleStoreError::Serialize(e.to_string()))
        } else {
            serde_json::to_string_pretty(doc)
                .map_err(|e| RuleStoreError::Serialize(e.to_string()))
        }
    }

    /// Temp file + fsync + rename
    fn write_atomic(&self, contents: &str) -> Result<(), RuleStoreError> {
        let write_err = |path: &Path, source: std::io::Error| RuleStoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| write_err(dir, e))?;
        }

        let mut temp_name = std::ffi::OsString::from(".");
        temp_name.push(self.path.file_name().unwrap_or_default());
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        let mut file =
            std::fs::File::create(&temp_path).map_err(|e| write_err(&temp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| write_err(&temp_path, e))?;
        file.sync_all().map_err(|e| write_err(&temp_path, e))?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| write_err(&self.path, e))?;
        Ok(())
    }
}

impl RuleStorage for FileRuleStorage {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<RuleDocument, RuleStoreError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "rule store not found, starting empty");
            return Ok(RuleDocument::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| RuleStoreError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        self.parse(&contents)
    }

    fn append(&self, record: Value) -> Result<RuleDocument, RuleStoreError> {
        // In-process writers queue here, other processes on the lock file.
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let lock_path = self.lock_path();
        if let Some(dir) = lock_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| RuleStoreError::Write {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| RuleStoreError::Write {
                path: lock_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| RuleStoreError::Write {
                path: lock_path.clone(),
                source: e,
            })?;

        let result = self.load().and_then(|mut doc| {
            doc.rules.push(record);
            let rendered = self.render(&doc)?;
            self.write_atomic(&rendered)?;
            Ok(doc)
        });

        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!(
                path = %lock_path.display(),
                error = %e,
                "failed to release rule store lock"
            );
        }
        result
    }
}

/// Volatile backend for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryRuleStorage {
    doc: Mutex<RuleDocument>,
}

impl InMemoryRuleStorage {
    pub fn new(rules: Vec<Value>) -> Self {
        Self {
            doc: Mutex::new(RuleDocument {
                rules,
                ..RuleDocument::default()
            }),
        }
    }
}

impl RuleStorage for InMemoryRuleStorage {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<RuleDocument, RuleStoreError> {
        Ok(self
            .doc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn append(&self, record: Value) -> Result<RuleDocument, RuleStoreError> {
        let mut doc = self
            .doc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        doc.rules.push(record);
        Ok(doc.clone())
    }
}
