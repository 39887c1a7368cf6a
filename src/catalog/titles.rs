//! Display-title overrides
//!
//! An optional external title list, shaped either as `["a", "b", ...]` or
//! `[{"title": "a"}, ...]`. Anything else is rejected and the caller keeps
//! the catalog titles.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, RoomError};

/// Replacement display titles, one per scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleOverrides {
    titles: Vec<String>,
}

impl TitleOverrides {
    pub fn new(titles: Vec<String>) -> Self {
        Self { titles }
    }

    /// Parse a title list, requiring exactly `expected_len` entries
    ///
    /// # Errors
    /// Returns [`RoomError::Serialization`] for malformed JSON and
    /// [`RoomError::InvalidTitles`] for any other shape or length.
    pub fn parse(json: &str, expected_len: usize) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(items) = value else {
            return Err(RoomError::InvalidTitles {
                reason: "expected a JSON array".to_string(),
            });
        };
        if items.len() != expected_len {
            return Err(RoomError::InvalidTitles {
                reason: format!("expected {} titles, got {}", expected_len, items.len()),
            });
        }

        let titles = if items.iter().all(Value::is_string) {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        } else if items
            .iter()
            .all(|v| v.get("title").is_some_and(Value::is_string))
        {
            items
                .iter()
                .filter_map(|v| v.get("title").and_then(Value::as_str).map(str::to_string))
                .collect()
        } else {
            return Err(RoomError::InvalidTitles {
                reason: "entries must all be strings or all be objects with a string title"
                    .to_string(),
            });
        };

        Ok(Self { titles })
    }

    /// Read and parse a title file
    pub fn load(path: &Path, expected_len: usize) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::parse(&json, expected_len)
    }

    /// Read a title file, returning `None` on any failure
    ///
    /// Title data is cosmetic: a missing or malformed file is logged and
    /// ignored.
    pub fn load_opportunistic(path: &Path, expected_len: usize) -> Option<Self> {
        match Self::load(path, expected_len) {
            Ok(titles) => Some(titles),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring title overrides");
                None
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.titles.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
