use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable handle to a node stored in a [`StoryMap`](crate::StoryMap) arena.
///
/// Handles stay valid until the node is deleted. They are plain indices and
/// never keep a node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of node variants in the hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Epic,
    SubEpic,
    StoryGroup,
    Story,
    Scenario,
    AcceptanceCriteria,
    Step,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::SubEpic => "sub_epic",
            Self::StoryGroup => "story_group",
            Self::Story => "story",
            Self::Scenario => "scenario",
            Self::AcceptanceCriteria => "acceptance_criteria",
            Self::Step => "step",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "epic" => Some(Self::Epic),
            "sub_epic" | "subepic" => Some(Self::SubEpic),
            "story_group" | "storygroup" => Some(Self::StoryGroup),
            "story" => Some(Self::Story),
            "scenario" => Some(Self::Scenario),
            "acceptance_criteria" | "acceptancecriteria" | "ac" => Some(Self::AcceptanceCriteria),
            "step" => Some(Self::Step),
            _ => None,
        }
    }

    /// Prefix used for generated default names, e.g. `SubEpic3`.
    pub fn default_name_prefix(&self) -> &'static str {
        match self {
            Self::Epic => "Epic",
            Self::SubEpic => "SubEpic",
            Self::StoryGroup => "StoryGroup",
            Self::Story => "Story",
            Self::Scenario => "Scenario",
            Self::AcceptanceCriteria => "AcceptanceCriteria",
            Self::Step => "Step",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name_prefix())
    }
}

/// A domain concept attached to an Epic.
///
/// Only `name` is interpreted; any other fields written by upstream tooling
/// are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DomainConcept {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How the Stories inside a StoryGroup relate to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    #[default]
    And,
    Or,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Data-driven variants of a Scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExamplesTable {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl ExamplesTable {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpicData {
    pub domain_concepts: Vec<DomainConcept>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubEpicData {
    pub domain_concepts: Vec<DomainConcept>,
    /// Test file governing the Stories below, relative to the workspace test directory.
    pub test_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoryGroupData {
    pub group_type: GroupType,
    pub connector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoryData {
    pub test_class: Option<String>,
    pub users: Vec<String>,
    pub story_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenarioData {
    pub background: Vec<String>,
    pub examples: Option<ExamplesTable>,
    pub test_method: Option<String>,
    pub scenario_type: Option<String>,
}

/// Variant-specific payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Epic(EpicData),
    SubEpic(SubEpicData),
    StoryGroup(StoryGroupData),
    Story(StoryData),
    Scenario(ScenarioData),
    AcceptanceCriteria,
    Step,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Epic(_) => NodeKind::Epic,
            Self::SubEpic(_) => NodeKind::SubEpic,
            Self::StoryGroup(_) => NodeKind::StoryGroup,
            Self::Story(_) => NodeKind::Story,
            Self::Scenario(_) => NodeKind::Scenario,
            Self::AcceptanceCriteria => NodeKind::AcceptanceCriteria,
            Self::Step => NodeKind::Step,
        }
    }

    /// Empty payload for a freshly created node of `kind`.
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Epic => Self::Epic(EpicData::default()),
            NodeKind::SubEpic => Self::SubEpic(SubEpicData::default()),
            NodeKind::StoryGroup => Self::StoryGroup(StoryGroupData::default()),
            NodeKind::Story => Self::Story(StoryData::default()),
            NodeKind::Scenario => Self::Scenario(ScenarioData::default()),
            NodeKind::AcceptanceCriteria => Self::AcceptanceCriteria,
            NodeKind::Step => Self::Step,
        }
    }
}

/// A node stored in the arena.
///
/// `parent` is a plain handle used for upward queries only. Ownership flows
/// strictly downward through `children`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) sequential_order: usize,
    pub(crate) behavior: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(name: String, data: NodeData) -> Self {
        Self {
            name,
            sequential_order: 0,
            behavior: None,
            parent: None,
            children: Vec::new(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequential_order(&self) -> usize {
        self.sequential_order
    }

    /// Workflow-stage hint carried over from upstream tooling.
    pub fn behavior(&self) -> Option<&str> {
        self.behavior.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Raw owned children in storage order, StoryGroups included.
    pub fn raw_children(&self) -> &[NodeId] {
        &self.children
    }
}
