use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Scalar key-value persistence used for settings and reading positions.
///
/// Reads never fail: a missing or mistyped key yields the default. Writes are
/// durable when they return `Ok`.
pub trait KeyValueStore {
    fn get_int(&self, key: &str, default: i64) -> i64;
    fn put_int(&mut self, key: &str, value: i64) -> anyhow::Result<()>;

    fn get_float(&self, key: &str, default: f32) -> f32;
    fn put_float(&mut self, key: &str, value: f32) -> anyhow::Result<()>;

    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn put_bool(&mut self, key: &str, value: bool) -> anyhow::Result<()>;

    fn get_string(&self, key: &str) -> Option<String>;
    fn put_string(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// JSON-backed preferences. Every write is flushed to disk immediately;
/// an ephemeral instance keeps everything in memory.
#[derive(Debug, Serialize, Deserialize)]
pub struct Preferences {
    values: BTreeMap<String, PrefValue>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl Preferences {
    pub fn ephemeral() -> Self {
        Self {
            values: BTreeMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            values: BTreeMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load preferences from {}: {:#}", path.display(), e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)
                .with_context(|| format!("Failed to read {}", file_path.display()))?;
            let mut prefs: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file_path.display()))?;
            prefs.file_path = Some(file_path.to_path_buf());
            Ok(prefs)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory {}", parent.display())
                    })?;
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(())
            }
            // Ephemeral preferences don't save to disk
            None => Ok(()),
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn put(&mut self, key: &str, value: PrefValue) -> anyhow::Result<()> {
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }
        let previous = self.values.insert(key.to_string(), value);
        if let Err(e) = self.save() {
            // Memory must match disk, or a retry of the same value is skipped
            match previous {
                Some(old) => self.values.insert(key.to_string(), old),
                None => self.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for Preferences {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(PrefValue::Int(v)) => *v,
            _ => default,
        }
    }

    fn put_int(&mut self, key: &str, value: i64) -> anyhow::Result<()> {
        self.put(key, PrefValue::Int(value))
    }

    fn get_float(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(PrefValue::Float(v)) => *v as f32,
            Some(PrefValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    fn put_float(&mut self, key: &str, value: f32) -> anyhow::Result<()> {
        self.put(key, PrefValue::Float(f64::from(value)))
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(PrefValue::Bool(v)) => *v,
            _ => default,
        }
    }

    fn put_bool(&mut self, key: &str, value: bool) -> anyhow::Result<()> {
        self.put(key, PrefValue::Bool(value))
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(PrefValue::Text(v)) => Some(v.clone()),
            _ => None,
        }
    }

    fn put_string(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.put(key, PrefValue::Text(value.to_string()))
    }
}
