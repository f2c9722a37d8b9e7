//! Flat `key=value` property files.
//!
//! Everything from a `#` to the end of the line is a comment, blank lines are
//! skipped, and keys keep the order in which they were first seen (defaults
//! first, then new keys in file order).

use std::fmt;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PropertiesError {
    #[error("No '=' in line {line}: '{content}'")]
    MissingSeparator { line: usize, content: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered string-to-string map read from and written to property files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace a value. Replacing keeps the key's original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse property text on top of `defaults`.
    pub fn parse(text: &str, defaults: &Properties) -> Result<Self, PropertiesError> {
        let mut props = defaults.clone();
        for (index, line) in text.lines().enumerate() {
            let important = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            }
            .trim();
            if important.is_empty() {
                continue;
            }
            let (key, value) =
                important
                    .split_once('=')
                    .ok_or_else(|| PropertiesError::MissingSeparator {
                        line: index + 1,
                        content: line.to_string(),
                    })?;
            props.insert(key.trim_end(), value.trim_start());
        }
        Ok(props)
    }

    /// Load properties from `path`, returning a copy of `defaults` when the
    /// file does not exist.
    pub fn load_from(path: &Path, defaults: &Properties) -> Result<Self, PropertiesError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, defaults),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(defaults.clone()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write all entries to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), PropertiesError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}
