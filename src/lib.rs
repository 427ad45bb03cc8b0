//! Hierarchical story map backlog.
//!
//! A [`StoryMap`] owns Epics, SubEpics, StoryGroups, Stories, Scenarios,
//! acceptance criteria and steps, plus an [`IncrementIndex`] that groups
//! Stories by name for release planning. Maps load from and write through
//! to a single JSON document.

pub mod config;
pub mod error;
pub mod increments;
pub mod map;
pub mod models;
pub mod mover;
pub mod store;
pub mod tree_render;

pub use error::{Result, StoryMapError};
pub use increments::IncrementIndex;
pub use map::path::NodePath;
pub use map::{MoveOutcome, MoveTarget, StoryMap};
pub use mover::{Relocation, TestCodeMover};
pub use store::document::{IncludeLevel, NodeDoc, StoryMapDocument};
pub use store::StoryMapStore;
