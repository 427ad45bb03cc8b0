//! Seam to the external test-file source mover.
//!
//! When a Story moves between SubEpics that declare different test files,
//! its test class is relocated from one file to the other. The relocation is
//! best effort and not transactional with the tree change.

use std::path::{Path, PathBuf};

/// Relocates a symbol's code block between two source files.
pub trait TestCodeMover {
    /// Move the code block defining `symbol` from `source` into `target`.
    fn relocate(&self, source: &Path, target: &Path, symbol: &str) -> anyhow::Result<()>;
}

impl<F> TestCodeMover for F
where
    F: Fn(&Path, &Path, &str) -> anyhow::Result<()>,
{
    fn relocate(&self, source: &Path, target: &Path, symbol: &str) -> anyhow::Result<()> {
        self(source, target, symbol)
    }
}

/// What happened to the test code when a Story moved.
///
/// - `NotRequired`: the node is not a Story, or both locations share a test file
/// - `Relocated`: the mover moved the test class
/// - `Skipped`: relocation was needed but could not be attempted
/// - `Failed`: the mover ran and returned an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    NotRequired,
    Relocated {
        symbol: String,
        from: PathBuf,
        to: PathBuf,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

impl Relocation {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// True when the tree moved but the test files were left untouched.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Skipped { .. } | Self::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Relocated { .. } => "relocated",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}
