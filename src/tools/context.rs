use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Per-session state shared by tool calls
///
/// Tracks the corpus used when a tool receives an empty corpus name, and
/// remembers which user-facing names resolved to existing corpora so that
/// repeated calls skip the listing round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolContext {
    current_corpus: Option<String>,
    /// User-facing corpus name → full resource name
    known_corpora: HashMap<String, String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_corpus(&self) -> Option<&str> {
        self.current_corpus.as_deref()
    }

    pub fn set_current_corpus(&mut self, name: &str) {
        debug!("Current corpus set to '{}'", name);
        self.current_corpus = Some(name.to_string());
    }

    /// Record that `name` refers to the corpus `resource_name`
    pub fn remember(&mut self, name: &str, resource_name: &str) {
        self.known_corpora
            .insert(name.to_string(), resource_name.to_string());
    }

    pub fn known(&self, name: &str) -> Option<&str> {
        self.known_corpora.get(name).map(String::as_str)
    }

    /// Drop every cached entry pointing at `resource_name`, and clear the
    /// current corpus if it was one of them
    pub fn forget(&mut self, resource_name: &str) {
        let removed: Vec<String> = self
            .known_corpora
            .iter()
            .filter(|(name, resource)| *resource == resource_name || *name == resource_name)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &removed {
            self.known_corpora.remove(name);
        }

        let clear = match &self.current_corpus {
            Some(current) => current == resource_name || removed.contains(current),
            None => false,
        };
        if clear {
            self.current_corpus = None;
        }
    }

    /// Load a saved session, starting fresh if the file does not exist
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }
}
