//! The story map aggregate: an arena of nodes plus the increment index.
//!
//! Nodes live in flat storage addressed by [`NodeId`]. Children are owned
//! through their parent's child list; the `parent` field of each node is a
//! plain handle used for upward queries.

mod behavior;
mod mutate;
pub mod path;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{Result, StoryMapError};
use crate::increments::IncrementIndex;
use crate::models::*;
use crate::mover::TestCodeMover;

pub use mutate::{MoveOutcome, MoveTarget};

/// Test-code relocation wiring used by Story moves.
pub(crate) struct TestRelocator {
    pub(crate) test_dir: PathBuf,
    pub(crate) mover: Box<dyn TestCodeMover>,
}

/// Root aggregate owning the ordered Epic list and the increment index.
pub struct StoryMap {
    nodes: Vec<Option<Node>>,
    epics: Vec<NodeId>,
    increments: IncrementIndex,
    /// Backing file; every successful mutation is written through to it.
    source: Option<PathBuf>,
    /// Modification time of `source` as of the last load or save.
    disk_mtime: Option<SystemTime>,
    relocator: Option<TestRelocator>,
}

impl fmt::Debug for StoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoryMap")
            .field("epics", &self.epics.len())
            .field("nodes", &self.node_count())
            .field("increments", &self.increments.len())
            .field("source", &self.source)
            .finish()
    }
}

impl Default for StoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryMap {
    /// An empty, in-memory map with no backing file.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            epics: Vec::new(),
            increments: IncrementIndex::new(),
            source: None,
            disk_mtime: None,
            relocator: None,
        }
    }

    /// Attach a test-code mover used when a Story moves between SubEpics
    /// governed by different test files.
    pub fn with_test_mover(mut self, test_dir: impl Into<PathBuf>, mover: impl TestCodeMover + 'static) -> Self {
        self.relocator = Some(TestRelocator {
            test_dir: test_dir.into(),
            mover: Box::new(mover),
        });
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn set_source(&mut self, path: Option<PathBuf>, mtime: Option<SystemTime>) {
        self.source = path;
        self.disk_mtime = mtime;
    }

    pub fn disk_mtime(&self) -> Option<SystemTime> {
        self.disk_mtime
    }

    pub(crate) fn relocator(&self) -> Option<&TestRelocator> {
        self.relocator.as_ref()
    }

    // ============================================================
    // Arena access
    // ============================================================

    pub fn epics(&self) -> &[NodeId] {
        &self.epics
    }

    pub(crate) fn epics_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.epics
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| StoryMapError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| StoryMapError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn free(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.kind())
    }

    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(self.node(id)?.name())
    }

    pub fn increments(&self) -> &IncrementIndex {
        &self.increments
    }

    pub(crate) fn increments_mut(&mut self) -> &mut IncrementIndex {
        &mut self.increments
    }

    /// Run `f` against the increment index and write the map through on success.
    pub fn update_increments<T>(&mut self, f: impl FnOnce(&mut IncrementIndex) -> Result<T>) -> Result<T> {
        let out = f(&mut self.increments)?;
        self.commit()?;
        Ok(out)
    }

    // ============================================================
    // Child views
    // ============================================================

    /// Owned children of a given kind, in sibling order.
    pub fn children_of_kind(&self, id: NodeId, kind: NodeKind) -> Vec<NodeId> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        node.children
            .iter()
            .copied()
            .filter(|c| self.get(*c).map(|n| n.kind()) == Some(kind))
            .collect()
    }

    pub fn sub_epics(&self, id: NodeId) -> Vec<NodeId> {
        self.children_of_kind(id, NodeKind::SubEpic)
    }

    pub fn story_groups(&self, id: NodeId) -> Vec<NodeId> {
        self.children_of_kind(id, NodeKind::StoryGroup)
    }

    /// Stories directly under `id`. For Epics and SubEpics the StoryGroup
    /// wrappers are flattened in group order.
    pub fn stories(&self, id: NodeId) -> Vec<NodeId> {
        match self.get(id).map(|n| n.kind()) {
            Some(NodeKind::StoryGroup) => self.children_of_kind(id, NodeKind::Story),
            Some(NodeKind::Epic) | Some(NodeKind::SubEpic) => self
                .story_groups(id)
                .into_iter()
                .flat_map(|g| self.children_of_kind(g, NodeKind::Story))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn acceptance_criteria(&self, id: NodeId) -> Vec<NodeId> {
        self.children_of_kind(id, NodeKind::AcceptanceCriteria)
    }

    pub fn scenarios(&self, id: NodeId) -> Vec<NodeId> {
        self.children_of_kind(id, NodeKind::Scenario)
    }

    pub fn steps(&self, id: NodeId) -> Vec<NodeId> {
        self.children_of_kind(id, NodeKind::Step)
    }

    /// Ordered view of direct children as consumers see them.
    ///
    /// StoryGroups are transparent: an Epic or SubEpic lists its nested
    /// SubEpics followed by the Stories of every group.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        match node.kind() {
            NodeKind::Epic | NodeKind::SubEpic => {
                let mut out = self.sub_epics(id);
                out.extend(self.stories(id));
                out
            }
            NodeKind::StoryGroup => self.stories(id),
            NodeKind::Story => {
                let mut out = self.acceptance_criteria(id);
                out.extend(self.scenarios(id));
                out
            }
            NodeKind::Scenario => self.steps(id),
            NodeKind::AcceptanceCriteria | NodeKind::Step => Vec::new(),
        }
    }

    // ============================================================
    // Upward queries
    // ============================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Parent as consumers see it, skipping a StoryGroup wrapper.
    pub fn logical_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        match self.get(parent).map(|n| n.kind()) {
            Some(NodeKind::StoryGroup) => self.parent(parent),
            _ => Some(parent),
        }
    }

    /// Ancestors nearest first, StoryGroups included.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(pid) = current {
            out.push(pid);
            current = self.parent(pid);
        }
        out
    }

    /// True when `candidate` sits anywhere below `ancestor`.
    pub fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// Nearest enclosing node of `kind`, not counting `id` itself.
    pub fn enclosing(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.get(*a).map(|n| n.kind()) == Some(kind))
    }

    /// Test file declared by the nearest SubEpic at or above `id`.
    pub fn governing_test_file(&self, id: NodeId) -> Option<&str> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|a| self.get(a))
            .find_map(|n| match &n.data {
                NodeData::SubEpic(data) => data.test_file.as_deref(),
                _ => None,
            })
    }

    /// Relative path of the markdown artifact documenting a Story,
    /// `{epic}/{sub-epic...}/{story}.md`.
    pub fn file_link(&self, id: NodeId) -> Option<String> {
        let node = self.get(id)?;
        if node.kind() != NodeKind::Story {
            return None;
        }
        let mut segments: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .rev()
            .filter_map(|a| self.get(a))
            .filter(|n| matches!(n.kind(), NodeKind::Epic | NodeKind::SubEpic))
            .map(|n| n.name())
            .collect();
        let file = format!("{}.md", node.name());
        segments.push(&file);
        Some(segments.join("/"))
    }

    // ============================================================
    // Traversal and search
    // ============================================================

    /// Pre-order walk over the consumer view of the tree: Epics in list
    /// order, depth-first within each. StoryGroups are not visited.
    pub fn walk(&self) -> Vec<NodeId> {
        fn visit(map: &StoryMap, id: NodeId, out: &mut Vec<NodeId>) {
            out.push(id);
            for child in map.children(id) {
                visit(map, child, out);
            }
        }

        let mut out = Vec::new();
        for epic in &self.epics {
            visit(self, *epic, &mut out);
        }
        out
    }

    /// Pre-order walk of the subtree rooted at `id` over raw storage,
    /// StoryGroups included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// First node named `name` in walk order.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        let found = self
            .walk()
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|n| n.name == name));
        debug!(name, found = found.is_some(), "find_node");
        found
    }

    /// First Story named `name` in walk order.
    pub fn find_story(&self, name: &str) -> Option<NodeId> {
        self.walk().into_iter().find(|id| {
            self.get(*id)
                .is_some_and(|n| n.kind() == NodeKind::Story && n.name == name)
        })
    }

    pub fn find_all_by_name(&self, name: &str) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(|n| n.name == name))
            .collect()
    }

    /// Every Story in walk order.
    pub fn all_stories(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(|n| n.kind() == NodeKind::Story))
            .collect()
    }

    /// Structural copy holding only the ancestor chain down to the first
    /// node named `name`, plus that node's full subtree.
    ///
    /// The copy has no backing file and an empty increment index, so
    /// mutating it never touches the original map or its document.
    pub fn filter_by_name(&self, name: &str) -> Result<StoryMap> {
        let target = self
            .find_node(name)
            .ok_or_else(|| StoryMapError::NodeNotFound(name.to_string()))?;

        let mut chain = self.ancestors(target);
        chain.reverse();

        let mut filtered = StoryMap::new();
        let mut parent: Option<NodeId> = None;
        for ancestor in chain {
            let src = self.node(ancestor)?;
            let mut copy = Node::new(src.name.clone(), src.data.clone());
            copy.sequential_order = src.sequential_order;
            copy.behavior = src.behavior.clone();
            let id = filtered.graft(parent, copy);
            parent = Some(id);
        }
        self.copy_subtree(target, &mut filtered, parent)?;
        Ok(filtered)
    }

    fn copy_subtree(&self, src: NodeId, dst: &mut StoryMap, dst_parent: Option<NodeId>) -> Result<NodeId> {
        let node = self.node(src)?;
        let mut copy = Node::new(node.name.clone(), node.data.clone());
        copy.sequential_order = node.sequential_order;
        copy.behavior = node.behavior.clone();
        let id = dst.graft(dst_parent, copy);
        for child in &node.children {
            self.copy_subtree(*child, dst, Some(id))?;
        }
        Ok(id)
    }

    /// Append an already-ordered node under `parent` (or as an Epic) without
    /// touching sequence numbers. Used when building from documents and copies.
    pub(crate) fn graft(&mut self, parent: Option<NodeId>, mut node: Node) -> NodeId {
        node.parent = parent;
        let id = self.alloc(node);
        match parent.and_then(|p| self.nodes.get_mut(p.0)).and_then(|s| s.as_mut()) {
            Some(p) => p.children.push(id),
            None => self.epics.push(id),
        }
        id
    }

    /// Renumber the `kind` collection under `parent` (Epics when `None`) to
    /// `0..n` in list order.
    pub(crate) fn resequence(&mut self, parent: Option<NodeId>, kind: NodeKind) {
        let siblings = match parent {
            Some(p) => self.children_of_kind(p, kind),
            None => self.epics.clone(),
        };
        for (i, id) in siblings.into_iter().enumerate() {
            if let Some(Some(node)) = self.nodes.get_mut(id.0) {
                node.sequential_order = i;
            }
        }
    }
}
