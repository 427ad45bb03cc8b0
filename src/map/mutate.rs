//! Create, rename, move and delete.
//!
//! Each operation validates fully before mutating, then writes the whole map
//! through to its backing file.

use tracing::{debug, info, warn};

use crate::error::{Result, StoryMapError};
use crate::models::*;
use crate::mover::Relocation;

use super::path::NodePath;
use super::validate::{
    check_can_hold, check_not_circular, check_unique, default_name, sibling_scope, validate_name,
};
use super::StoryMap;

/// Destination of a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    Node(NodeId),
    /// Quoted dotted path resolved from the tree root, e.g. `"Epic"."Sub Epic"`.
    Path(String),
}

impl From<NodeId> for MoveTarget {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<&str> for MoveTarget {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

/// Result of a successful move.
///
/// The tree change is always committed when this is returned; `relocation`
/// reports whether the accompanying test-code relocation happened.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub node: NodeId,
    /// New raw parent; a StoryGroup when a Story was moved.
    pub parent: Option<NodeId>,
    pub relocation: Relocation,
}

impl MoveOutcome {
    /// True when the tree moved but the test-code relocation did not.
    pub fn is_partial(&self) -> bool {
        self.relocation.is_partial()
    }
}

/// Where a Story lands inside an Epic or SubEpic.
enum StorySlot {
    Group(NodeId, Option<usize>),
    NewGroup,
}

impl StoryMap {
    pub(crate) fn commit(&mut self) -> Result<()> {
        if self.source().is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Insert `child` into `parent`'s collection of its kind at `position`
    /// (appended when `None` or past the end) and resequence the collection.
    fn attach(&mut self, parent: Option<NodeId>, child: NodeId, position: Option<usize>) -> Result<()> {
        let kind = self.kind(child)?;
        let Some(parent) = parent else {
            let epics = self.epics_mut();
            let at = position.unwrap_or(epics.len()).min(epics.len());
            epics.insert(at, child);
            self.node_mut(child)?.parent = None;
            self.resequence(None, NodeKind::Epic);
            return Ok(());
        };

        let siblings = self.children_of_kind(parent, kind);
        let at = position.unwrap_or(siblings.len()).min(siblings.len());
        let raw = &self.node(parent)?.children;
        let raw_index = if at < siblings.len() {
            raw.iter().position(|c| *c == siblings[at]).unwrap_or(raw.len())
        } else if let Some(last) = siblings.last() {
            raw.iter().position(|c| c == last).map(|i| i + 1).unwrap_or(raw.len())
        } else {
            raw.len()
        };

        self.node_mut(parent)?.children.insert(raw_index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.resequence(Some(parent), kind);
        Ok(())
    }

    /// Unlink `child` from its parent and resequence what remains.
    fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>> {
        let kind = self.kind(child)?;
        let parent = self.parent(child);
        match parent {
            Some(p) => self.node_mut(p)?.children.retain(|c| *c != child),
            None => self.epics_mut().retain(|c| *c != child),
        }
        self.node_mut(child)?.parent = None;
        self.resequence(parent, kind);
        Ok(parent)
    }

    /// Drop an emptied StoryGroup from its owner.
    fn prune_empty_group(&mut self, group: NodeId) -> Result<()> {
        let Some(node) = self.get(group) else {
            return Ok(());
        };
        if node.kind() == NodeKind::StoryGroup && node.children.is_empty() {
            self.detach(group)?;
            self.free(group);
            debug!(group = %group, "removed empty story group");
        }
        Ok(())
    }

    fn story_slot(&self, container: NodeId, position: Option<usize>) -> StorySlot {
        let groups = self.story_groups(container);
        let Some(last) = groups.last().copied() else {
            return StorySlot::NewGroup;
        };
        if let Some(mut remaining) = position {
            for group in &groups {
                let len = self.children_of_kind(*group, NodeKind::Story).len();
                if remaining < len {
                    return StorySlot::Group(*group, Some(remaining));
                }
                remaining -= len;
            }
        }
        StorySlot::Group(last, None)
    }

    /// Resolve a Story container to a concrete StoryGroup, creating one when
    /// the container has none yet.
    fn story_destination(&mut self, container: NodeId, position: Option<usize>) -> Result<(NodeId, Option<usize>)> {
        if self.kind(container)? == NodeKind::StoryGroup {
            return Ok((container, position));
        }
        match self.story_slot(container, position) {
            StorySlot::Group(group, at) => Ok((group, at)),
            StorySlot::NewGroup => {
                let group = self.alloc(Node::new(String::new(), NodeData::empty(NodeKind::StoryGroup)));
                self.attach(Some(container), group, None)?;
                Ok((group, position))
            }
        }
    }

    fn default_child_kind(&self, parent: NodeId) -> Result<NodeKind> {
        Ok(match self.kind(parent)? {
            NodeKind::Epic => NodeKind::SubEpic,
            NodeKind::SubEpic if !self.story_groups(parent).is_empty() => NodeKind::Story,
            NodeKind::SubEpic => NodeKind::SubEpic,
            NodeKind::StoryGroup => NodeKind::Story,
            NodeKind::Story => NodeKind::Scenario,
            NodeKind::Scenario | NodeKind::AcceptanceCriteria | NodeKind::Step => NodeKind::Step,
        })
    }

    // ============================================================
    // Create
    // ============================================================

    /// Create a top-level Epic.
    pub fn create_epic(&mut self, name: Option<&str>, position: Option<usize>) -> Result<NodeId> {
        let name = match name {
            Some(n) => validate_name(n)?,
            None => default_name(self, None, NodeKind::Epic),
        };
        check_unique(self, None, &name, None)?;

        let id = self.alloc(Node::new(name.clone(), NodeData::empty(NodeKind::Epic)));
        self.attach(None, id, position)?;
        self.commit()?;
        info!(epic = %name, "created epic");
        Ok(id)
    }

    /// Create a child of `parent`.
    ///
    /// `kind` defaults to the natural child of the parent. Stories created
    /// under an Epic or SubEpic are placed in a StoryGroup, which is created
    /// when none exists; `position` then counts across the flattened Story
    /// list. A missing `name` becomes the first free `{Type}{n}`.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        name: Option<&str>,
        kind: Option<NodeKind>,
        position: Option<usize>,
    ) -> Result<NodeId> {
        let kind = match kind {
            Some(k) => k,
            None => self.default_child_kind(parent)?,
        };
        check_can_hold(self, parent, kind, true)?;

        let scope = sibling_scope(self, parent);
        let name = match name {
            Some(n) => validate_name(n)?,
            None => default_name(self, Some(scope), kind),
        };
        check_unique(self, Some(scope), &name, None)?;

        let (container, position) = if kind == NodeKind::Story {
            self.story_destination(parent, position)?
        } else {
            (parent, position)
        };

        let parent_name = self.name(scope)?.to_string();
        let id = self.alloc(Node::new(name.clone(), NodeData::empty(kind)));
        self.attach(Some(container), id, position)?;
        self.commit()?;
        info!(kind = kind.as_str(), name = %name, parent = %parent_name, "created node");
        Ok(id)
    }

    // ============================================================
    // Edit
    // ============================================================

    /// Rename a node. Renaming a Story rewrites every increment reference.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<()> {
        let node = self.node(id)?;
        let kind = node.kind();
        let old = node.name.clone();
        let name = validate_name(new_name)?;
        if name == old {
            return Ok(());
        }
        if kind != NodeKind::StoryGroup {
            check_unique(self, self.logical_parent(id), &name, Some(id))?;
        }

        self.node_mut(id)?.name = name.clone();
        if kind == NodeKind::Story {
            let changed = self.increments_mut().rename_story_references(&old, &name);
            debug!(story = %name, references = changed, "renamed increment references");
        }
        self.commit()?;
        info!(kind = kind.as_str(), from = %old, to = %name, "renamed node");
        Ok(())
    }

    /// Replace the variant payload of a node. The variant itself cannot change.
    pub fn update_data(&mut self, id: NodeId, f: impl FnOnce(&mut NodeData)) -> Result<()> {
        let node = self.node(id)?;
        let kind = node.kind();
        let mut data = node.data.clone();
        f(&mut data);
        if data.kind() != kind {
            return Err(StoryMapError::hierarchy(
                data.kind(),
                kind,
                "a node cannot change its variant",
            ));
        }
        self.node_mut(id)?.data = data;
        self.commit()
    }

    pub fn set_behavior(&mut self, id: NodeId, behavior: Option<&str>) -> Result<()> {
        self.node_mut(id)?.behavior = behavior.map(str::to_string);
        self.commit()
    }

    // ============================================================
    // Move
    // ============================================================

    /// Move a node.
    ///
    /// With `target == None` the node is reordered among its current
    /// siblings. Otherwise it is relocated under the target. Validation
    /// order: cycle, sibling name, hierarchy rules. A Story sent to an Epic
    /// or SubEpic lands in a StoryGroup there, created on demand.
    ///
    /// When a Story crosses SubEpics governed by different test files the
    /// test class is relocated through the configured mover after the tree
    /// change is committed. That step is best effort: its failure is
    /// reported in [`MoveOutcome::relocation`] and never rolls the move back.
    pub fn move_to(&mut self, id: NodeId, target: Option<MoveTarget>, position: Option<usize>) -> Result<MoveOutcome> {
        let node = self.node(id)?;
        let kind = node.kind();
        let name = node.name.clone();
        let current_parent = node.parent;

        let target = match target {
            None => current_parent,
            Some(MoveTarget::Node(t)) => {
                self.node(t)?;
                Some(t)
            }
            Some(MoveTarget::Path(p)) => Some(self.resolve_path(&NodePath::parse(&p)?)?),
        };

        let Some(target) = target else {
            if kind != NodeKind::Epic {
                return Err(StoryMapError::NodeNotFound(format!("target for `{name}`")));
            }
            self.detach(id)?;
            self.attach(None, id, position)?;
            self.commit()?;
            info!(epic = %name, position = ?position, "reordered epic");
            return Ok(MoveOutcome {
                node: id,
                parent: None,
                relocation: Relocation::NotRequired,
            });
        };

        check_not_circular(self, id, target)?;

        let target_scope = sibling_scope(self, target);
        let same_scope = self.logical_parent(id) == Some(target_scope);
        if !same_scope {
            if kind == NodeKind::StoryGroup {
                // A group is nameless to its siblings; its stories are not.
                for story in self.children_of_kind(id, NodeKind::Story) {
                    check_unique(self, Some(target_scope), self.name(story)?, None)?;
                }
            } else {
                check_unique(self, Some(target_scope), &name, Some(id))?;
            }
        }
        check_can_hold(self, target, kind, false)?;

        let source_test_file = self.governing_test_file(id).map(str::to_string);
        let source_group = current_parent.filter(|p| self.get(*p).map(|n| n.kind()) == Some(NodeKind::StoryGroup));

        self.detach(id)?;
        let (container, position) = if kind == NodeKind::Story {
            self.story_destination(target, position)?
        } else {
            (target, position)
        };
        self.attach(Some(container), id, position)?;
        if let Some(group) = source_group {
            self.prune_empty_group(group)?;
        }
        self.commit()?;
        let target_name = self.name(target)?;
        info!(kind = kind.as_str(), node = %name, target = %target_name, "moved node");

        let relocation = if kind == NodeKind::Story {
            let target_test_file = self.governing_test_file(id).map(str::to_string);
            self.relocate_test_code(id, source_test_file.as_deref(), target_test_file.as_deref())
        } else {
            Relocation::NotRequired
        };

        Ok(MoveOutcome {
            node: id,
            parent: Some(container),
            relocation,
        })
    }

    fn relocate_test_code(&self, story: NodeId, source: Option<&str>, target: Option<&str>) -> Relocation {
        let (Some(source), Some(target)) = (source, target) else {
            return Relocation::NotRequired;
        };
        if source == target {
            return Relocation::NotRequired;
        }

        let outcome = self.try_relocate(story, source, target);
        if let Relocation::Skipped { reason } | Relocation::Failed { error: reason } = &outcome {
            warn!(source, target, reason = %reason, "test code not relocated; story map and test files may disagree");
        }
        outcome
    }

    fn try_relocate(&self, story: NodeId, source: &str, target: &str) -> Relocation {
        let Some(relocator) = self.relocator() else {
            return Relocation::skipped("no test code mover configured");
        };
        let symbol = match self.get(story).map(|n| &n.data) {
            Some(NodeData::Story(StoryData {
                test_class: Some(class),
                ..
            })) => class.clone(),
            _ => return Relocation::skipped("story has no test class"),
        };

        let source_path = relocator.test_dir.join(source);
        let target_path = relocator.test_dir.join(target);
        if !source_path.is_file() {
            return Relocation::skipped(format!("source test file {} is missing", source_path.display()));
        }
        if !target_path.is_file() {
            return Relocation::skipped(format!("target test file {} is missing", target_path.display()));
        }

        match relocator.mover.relocate(&source_path, &target_path, &symbol) {
            Ok(()) => {
                info!(symbol = %symbol, from = %source_path.display(), to = %target_path.display(), "relocated test code");
                Relocation::Relocated {
                    symbol,
                    from: source_path,
                    to: target_path,
                }
            }
            Err(e) => Relocation::Failed {
                error: format!("{e:#}"),
            },
        }
    }

    // ============================================================
    // Delete
    // ============================================================

    /// Delete a node and its whole subtree.
    ///
    /// Every deleted Story is purged from the increment index, and a
    /// StoryGroup left empty by the delete is removed as well.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        let name = self.name(id)?.to_string();
        let doomed = self.subtree(id);
        let stories: Vec<String> = doomed
            .iter()
            .filter_map(|d| self.get(*d))
            .filter(|n| n.kind() == NodeKind::Story)
            .map(|n| n.name.clone())
            .collect();

        let parent = self.detach(id)?;
        for d in &doomed {
            self.free(*d);
        }
        if let Some(p) = parent {
            self.prune_empty_group(p)?;
        }
        for story in &stories {
            let removed = self.increments_mut().remove_story_from_all(story);
            if removed > 0 {
                debug!(story = %story, references = removed, "purged increment references");
            }
        }

        self.commit()?;
        info!(node = %name, removed = doomed.len(), "deleted node");
        Ok(())
    }
}
