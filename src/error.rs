//! Error type shared by the story map engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::NodeKind;

/// Failures raised by the story map.
///
/// Validation variants are raised before any mutation is applied, so a
/// returned error always means the tree is unchanged.
#[derive(Debug, Error)]
pub enum StoryMapError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name `{name}` contains forbidden characters (< > \\ | * ? \")")]
    InvalidCharacters { name: String },

    #[error("a sibling named `{name}` already exists under `{parent}`")]
    DuplicateSiblingName { name: String, parent: String },

    #[error("{child} cannot be placed under {parent}: {reason}")]
    HierarchyViolation {
        child: NodeKind,
        parent: NodeKind,
        reason: String,
    },

    #[error("cannot move `{node}` into its own descendant `{target}`")]
    CircularReference { node: String, target: String },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid node path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("story map document not found at {0}")]
    DocumentNotFound(PathBuf),

    #[error("malformed story map document: {0}")]
    MalformedDocument(String),

    #[error("increment `{0}` already exists")]
    DuplicateIncrement(String),

    #[error("increment not found: {0}")]
    IncrementNotFound(String),

    #[error("increment `{increment}` already references story `{story}`")]
    DuplicateStoryReference { increment: String, story: String },

    #[error("increment `{increment}` does not reference story `{story}`")]
    StoryReferenceNotFound { increment: String, story: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoryMapError {
    pub(crate) fn hierarchy(child: NodeKind, parent: NodeKind, reason: impl Into<String>) -> Self {
        Self::HierarchyViolation {
            child,
            parent,
            reason: reason.into(),
        }
    }

    /// True for errors raised by structural validation (nothing was mutated).
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::Io(_) | Self::Json(_) | Self::DocumentNotFound(_) | Self::MalformedDocument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StoryMapError>;
