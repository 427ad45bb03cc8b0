//! Domain models for the story map.
//!
//! # Core Concepts
//!
//! ## Owned hierarchy
//!
//! - [`NodeKind::Epic`]: top-level grouping, carries domain concepts.
//! - [`NodeKind::SubEpic`]: nested grouping, optionally tied to a test file.
//! - [`NodeKind::StoryGroup`]: hidden wrapper that holds Stories under an Epic or SubEpic.
//! - [`NodeKind::Story`]: unit of user-facing work, optionally tied to a test class.
//! - [`NodeKind::Scenario`]: behavioral example under a Story, optionally tied to a test method.
//! - [`NodeKind::AcceptanceCriteria`] and [`NodeKind::Step`]: leaf text nodes.
//!
//! ## Cross references
//!
//! - [`Increment`]: a prioritized list of Story names used for release planning.
//!   Increments never own nodes.
//!
//! ## Derived state
//!
//! - [`BehaviorStage`]: the workflow stage still outstanding for a node.

mod behavior;
mod increment;
mod node;

pub use behavior::*;
pub use increment::*;
pub use node::*;
