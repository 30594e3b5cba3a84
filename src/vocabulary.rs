/// Vocabulary of recognizable words
///
/// The vocabulary file maps a vocabulary name to an ordered list of word ids. List order is
/// the label index order used by classifiers and confusion matrices.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{GestureError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    name: String,
    words: Vec<String>,
    #[serde(default)]
    display: HashMap<String, String>,
}

impl Vocabulary {
    pub fn new(name: &str, words: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            words,
            display: HashMap::new(),
        }
    }

    /// Load the named word list from a vocabulary file
    pub async fn load(path: &Path, name: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GestureError::Configuration(format!(
                "Failed to read vocabulary file {}: {}",
                path.display(),
                e
            ))
        })?;
        let vocabulary = Self::parse(&content, name)?;
        info!(
            "📖 Loaded vocabulary '{}' with {} words from: {}",
            name,
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn parse(content: &str, name: &str) -> Result<Self> {
        let mut lists: HashMap<String, Vec<String>> = serde_json::from_str(content)?;
        let words = lists.remove(name).ok_or_else(|| {
            GestureError::Configuration(format!("vocabulary file has no list named '{}'", name))
        })?;

        if words.is_empty() {
            return Err(GestureError::Configuration(format!(
                "vocabulary '{}' is empty",
                name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = words.iter().find(|w| !seen.insert(w.as_str())) {
            return Err(GestureError::Configuration(format!(
                "word '{}' listed twice in vocabulary '{}'",
                duplicate, name
            )));
        }

        Ok(Self::new(name, words))
    }

    /// Attach display text overrides
    pub fn with_display(mut self, display: HashMap<String, String>) -> Self {
        self.display = display;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, label: usize) -> Option<&str> {
        self.words.get(label).map(String::as_str)
    }

    pub fn label_of(&self, word: &str) -> Option<usize> {
        self.words.iter().position(|w| w == word)
    }

    /// Human-readable text for a word id
    pub fn display_text(&self, word: &str) -> String {
        self.display
            .get(word)
            .cloned()
            .unwrap_or_else(|| word.replace('_', " ").to_uppercase())
    }
}
