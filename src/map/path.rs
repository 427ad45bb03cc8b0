//! Quoted dotted node paths, e.g. `"Checkout"."Pay by card".Refund`.
//!
//! A path lists node names from an Epic downward. Segments are separated by
//! `.`; a segment may be wrapped in double quotes so it can contain dots or
//! surrounding spaces. StoryGroups never appear in paths.

use std::fmt;

use tracing::debug;

use crate::error::{Result, StoryMapError};
use crate::models::NodeId;

use super::StoryMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| StoryMapError::InvalidPath {
            path: input.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut chars = input.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}

            let segment = if chars.next_if_eq(&'"').is_some() {
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => quoted.push(c),
                        None => return Err(invalid("unterminated quote")),
                    }
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                quoted
            } else {
                let mut bare = String::new();
                while let Some(c) = chars.next_if(|c| *c != '.') {
                    if c == '"' {
                        return Err(invalid("quote inside an unquoted segment"));
                    }
                    bare.push(c);
                }
                bare.trim().to_string()
            };

            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            segments.push(segment);

            match chars.next() {
                None => break,
                Some('.') => continue,
                Some(_) => return Err(invalid("expected `.` after a quoted segment")),
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.segments.iter().map(|s| format!("\"{s}\"")).collect();
        f.write_str(&quoted.join("."))
    }
}

impl StoryMap {
    /// Walk `path` down from the Epics. At each level the first child with a
    /// matching name is taken.
    pub fn resolve_path(&self, path: &NodePath) -> Result<NodeId> {
        let not_found = || StoryMapError::NodeNotFound(path.to_string());

        let mut candidates = self.epics().to_vec();
        let mut current = None;
        for segment in path.segments() {
            let next = candidates
                .iter()
                .copied()
                .find(|id| self.get(*id).is_some_and(|n| n.name() == segment))
                .ok_or_else(not_found)?;
            candidates = self.children(next);
            current = Some(next);
        }
        debug!(path = %path, "resolved node path");
        current.ok_or_else(not_found)
    }

    pub fn resolve(&self, path: &str) -> Result<NodeId> {
        self.resolve_path(&NodePath::parse(path)?)
    }

    /// Path of `id` as consumers address it. A StoryGroup maps to the path
    /// of its owner.
    pub fn path_of(&self, id: NodeId) -> Result<NodePath> {
        let node = self.node(id)?;
        let mut segments: Vec<String> = self
            .ancestors(id)
            .into_iter()
            .rev()
            .filter_map(|a| self.get(a))
            .filter(|n| n.kind() != crate::models::NodeKind::StoryGroup)
            .map(|n| n.name().to_string())
            .collect();
        if node.kind() != crate::models::NodeKind::StoryGroup {
            segments.push(node.name().to_string());
        }
        Ok(NodePath::new(segments))
    }
}
