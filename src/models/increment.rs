use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named, prioritized list of Story references used for release planning.
///
/// `stories` holds plain Story names. The increment never owns or
/// dereferences tree nodes; keeping the names in sync with renames and
/// deletes is an explicit operation on the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Increment {
    pub name: String,
    pub priority: i64,
    #[serde(default)]
    pub stories: Vec<String>,
    /// Optional fields written by other tooling, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Increment {
    pub fn new(name: impl Into<String>, priority: i64) -> Self {
        Self {
            name: name.into(),
            priority,
            stories: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn references(&self, story: &str) -> bool {
        self.stories.iter().any(|s| s == story)
    }
}

/// Where to place an increment relative to another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Before(String),
    After(String),
}
