//! Named, file-backed value.

use crate::config::default_persistence_folder;
use crate::error::{ColonyError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// A value cached in memory and mirrored to `folder/name`.
///
/// Reads never touch the disk; [`refresh`](Self::refresh) re-loads. Writes
/// go to a temporary file in the same folder which is synced and renamed over
/// the target, so a crash leaves either the old or the new content.
#[derive(Debug)]
pub struct PersistentVariable<T = Value> {
    name: String,
    folder: PathBuf,
    path: PathBuf,
    value: Option<T>,
}

fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ColonyError::Persistence(format!(
            "Invalid variable name '{}': must be a single path component",
            name
        ))),
    }
}

impl<T: Serialize + DeserializeOwned> PersistentVariable<T> {
    /// Open the variable in the default persistence folder.
    pub fn in_default_folder(name: impl Into<String>) -> Result<Self> {
        Self::new(name, default_persistence_folder())
    }

    /// Open the variable and load whatever is on disk.
    pub fn new(name: impl Into<String>, folder: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        let folder = folder.into();
        let path = folder.join(&name);
        let mut variable = Self {
            name,
            folder,
            path,
            value: None,
        };
        variable.refresh();
        Ok(variable)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Update the in-memory value, then write it durably.
    pub fn set(&mut self, value: T) -> Result<()> {
        let value = self.value.insert(value);
        let content = serde_json::to_string_pretty(value)?;
        write_atomic(&self.folder, &self.path, content.as_bytes())
    }

    /// Write `value` durably and only then make it current. When the write
    /// fails the previous value is kept.
    pub fn commit(&mut self, value: T) -> Result<()> {
        let content = serde_json::to_string_pretty(&value)?;
        write_atomic(&self.folder, &self.path, content.as_bytes())?;
        self.value = Some(value);
        Ok(())
    }

    /// Re-read the file. Missing or malformed files leave the variable unset.
    pub fn refresh(&mut self) {
        self.value = self.load();
    }

    fn load(&self) -> Option<T> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed persisted value {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

fn write_atomic(folder: &Path, path: &Path, content: &[u8]) -> Result<()> {
    std::fs::create_dir_all(folder).map_err(|e| {
        ColonyError::Persistence(format!(
            "Failed to create folder {}: {}",
            folder.display(),
            e
        ))
    })?;

    let mut tmp = NamedTempFile::new_in(folder).map_err(|e| {
        ColonyError::Persistence(format!("Failed to create temporary file: {}", e))
    })?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| {
        ColonyError::Persistence(format!("Failed to replace {}: {}", path.display(), e.error))
    })?;

    tracing::trace!("Persisted {}", path.display());
    Ok(())
}
