//! Canonical JSON shape of the story map document.
//!
//! Field names are fixed: `epics`, `increments`, `sub_epics`,
//! `story_groups`, `stories`, `acceptance_criteria`, `scenarios`, `steps`,
//! `sequential_order`. An [`IncludeLevel`] selects how much descendant
//! detail an export carries; persisted documents always use
//! [`IncludeLevel::Full`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Result, StoryMapError};
use crate::increments::IncrementIndex;
use crate::map::validate::{check_can_hold, check_unique, sibling_scope};
use crate::map::StoryMap;
use crate::models::*;

/// How much detail an export carries, least to most.
///
/// - `DomainConcepts`: Epic and SubEpic names with their domain concepts
/// - `Stories`: adds StoryGroups and Stories
/// - `AcceptanceCriteria`: adds acceptance criteria
/// - `Scenarios`: adds scenario names and background
/// - `Full`: adds steps, examples, test files, classes, methods and file links
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncludeLevel {
    DomainConcepts,
    Stories,
    AcceptanceCriteria,
    Scenarios,
    #[default]
    Full,
}

impl IncludeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainConcepts => "domain_concepts",
            Self::Stories => "stories",
            Self::AcceptanceCriteria => "acceptance_criteria",
            Self::Scenarios => "scenarios",
            Self::Full => "full",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "domain_concepts" => Some(Self::DomainConcepts),
            "stories" => Some(Self::Stories),
            "acceptance_criteria" => Some(Self::AcceptanceCriteria),
            "scenarios" => Some(Self::Scenarios),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

// ============================================================
// Document types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StoryMapDocument {
    #[serde(default)]
    pub epics: Vec<EpicDoc>,
    #[serde(default)]
    pub increments: Vec<Increment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpicDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_order: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default)]
    pub domain_concepts: Vec<DomainConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_epics: Option<Vec<SubEpicDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_groups: Option<Vec<StoryGroupDoc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubEpicDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_order: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_concepts: Vec<DomainConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_epics: Option<Vec<SubEpicDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_groups: Option<Vec<StoryGroupDoc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryGroupDoc {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_order: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default)]
    pub stories: Vec<StoryDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_order: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_class: Option<String>,
    /// Derived on export, ignored on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<LeafDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<ScenarioDoc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_order: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<ExamplesTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<LeafDoc>>,
}

/// Shape shared by AcceptanceCriteria and Step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeafDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_order: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

/// A serialized node of any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeDoc {
    Epic(EpicDoc),
    SubEpic(SubEpicDoc),
    StoryGroup(StoryGroupDoc),
    Story(StoryDoc),
    Scenario(ScenarioDoc),
    AcceptanceCriteria(LeafDoc),
    Step(LeafDoc),
}

impl NodeDoc {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Epic(_) => NodeKind::Epic,
            Self::SubEpic(_) => NodeKind::SubEpic,
            Self::StoryGroup(_) => NodeKind::StoryGroup,
            Self::Story(_) => NodeKind::Story,
            Self::Scenario(_) => NodeKind::Scenario,
            Self::AcceptanceCriteria(_) => NodeKind::AcceptanceCriteria,
            Self::Step(_) => NodeKind::Step,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Epic(d) => serde_json::to_value(d)?,
            Self::SubEpic(d) => serde_json::to_value(d)?,
            Self::StoryGroup(d) => serde_json::to_value(d)?,
            Self::Story(d) => serde_json::to_value(d)?,
            Self::Scenario(d) => serde_json::to_value(d)?,
            Self::AcceptanceCriteria(d) | Self::Step(d) => serde_json::to_value(d)?,
        })
    }

    /// Parse a JSON object as a node of `kind`.
    pub fn from_value(kind: NodeKind, value: Value) -> Result<Self> {
        let malformed = |e: serde_json::Error| StoryMapError::MalformedDocument(format!("{}: {e}", kind.as_str()));
        Ok(match kind {
            NodeKind::Epic => Self::Epic(serde_json::from_value(value).map_err(malformed)?),
            NodeKind::SubEpic => Self::SubEpic(serde_json::from_value(value).map_err(malformed)?),
            NodeKind::StoryGroup => Self::StoryGroup(serde_json::from_value(value).map_err(malformed)?),
            NodeKind::Story => Self::Story(serde_json::from_value(value).map_err(malformed)?),
            NodeKind::Scenario => Self::Scenario(serde_json::from_value(value).map_err(malformed)?),
            NodeKind::AcceptanceCriteria => {
                Self::AcceptanceCriteria(serde_json::from_value(value).map_err(malformed)?)
            }
            NodeKind::Step => Self::Step(serde_json::from_value(value).map_err(malformed)?),
        })
    }
}

// ============================================================
// Tree -> document
// ============================================================

fn order(n: usize) -> Option<Number> {
    Some(Number::from(n as u64))
}

impl StoryMap {
    /// Serialize the whole map at `level`.
    pub fn to_document(&self, level: IncludeLevel) -> Result<StoryMapDocument> {
        let epics = self
            .epics()
            .iter()
            .map(|id| self.epic_doc(*id, level))
            .collect::<Result<Vec<_>>>()?;
        Ok(StoryMapDocument {
            epics,
            increments: self.increments().as_slice().to_vec(),
        })
    }

    /// Serialize one node and its descendants at `level`.
    pub fn node_doc(&self, id: NodeId, level: IncludeLevel) -> Result<NodeDoc> {
        Ok(match self.kind(id)? {
            NodeKind::Epic => NodeDoc::Epic(self.epic_doc(id, level)?),
            NodeKind::SubEpic => NodeDoc::SubEpic(self.sub_epic_doc(id, level)?),
            NodeKind::StoryGroup => NodeDoc::StoryGroup(self.story_group_doc(id, level)?),
            NodeKind::Story => NodeDoc::Story(self.story_doc(id, level)?),
            NodeKind::Scenario => NodeDoc::Scenario(self.scenario_doc(id, level)?),
            NodeKind::AcceptanceCriteria => NodeDoc::AcceptanceCriteria(self.leaf_doc(id)?),
            NodeKind::Step => NodeDoc::Step(self.leaf_doc(id)?),
        })
    }

    /// `node_doc` rendered as a JSON object.
    pub fn to_dict(&self, id: NodeId, level: IncludeLevel) -> Result<Value> {
        self.node_doc(id, level)?.to_value()
    }

    fn story_groups_doc(&self, id: NodeId, level: IncludeLevel) -> Result<Option<Vec<StoryGroupDoc>>> {
        if level < IncludeLevel::Stories {
            return Ok(None);
        }
        self.story_groups(id)
            .into_iter()
            .map(|g| self.story_group_doc(g, level))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn epic_doc(&self, id: NodeId, level: IncludeLevel) -> Result<EpicDoc> {
        let node = self.node(id)?;
        let NodeData::Epic(data) = &node.data else {
            return Err(StoryMapError::NodeNotFound(format!("epic {id}")));
        };
        Ok(EpicDoc {
            name: node.name.clone(),
            sequential_order: order(node.sequential_order),
            behavior: node.behavior.clone(),
            domain_concepts: data.domain_concepts.clone(),
            sub_epics: Some(
                self.sub_epics(id)
                    .into_iter()
                    .map(|s| self.sub_epic_doc(s, level))
                    .collect::<Result<Vec<_>>>()?,
            ),
            story_groups: self.story_groups_doc(id, level)?,
        })
    }

    fn sub_epic_doc(&self, id: NodeId, level: IncludeLevel) -> Result<SubEpicDoc> {
        let node = self.node(id)?;
        let NodeData::SubEpic(data) = &node.data else {
            return Err(StoryMapError::NodeNotFound(format!("sub-epic {id}")));
        };
        Ok(SubEpicDoc {
            name: node.name.clone(),
            sequential_order: order(node.sequential_order),
            behavior: node.behavior.clone(),
            domain_concepts: data.domain_concepts.clone(),
            test_file: data.test_file.clone().filter(|_| level == IncludeLevel::Full),
            sub_epics: Some(
                self.sub_epics(id)
                    .into_iter()
                    .map(|s| self.sub_epic_doc(s, level))
                    .collect::<Result<Vec<_>>>()?,
            ),
            story_groups: self.story_groups_doc(id, level)?,
        })
    }

    fn story_group_doc(&self, id: NodeId, level: IncludeLevel) -> Result<StoryGroupDoc> {
        let node = self.node(id)?;
        let NodeData::StoryGroup(data) = &node.data else {
            return Err(StoryMapError::NodeNotFound(format!("story group {id}")));
        };
        Ok(StoryGroupDoc {
            name: node.name.clone(),
            group_type: data.group_type,
            connector: data.connector.clone(),
            sequential_order: order(node.sequential_order),
            behavior: node.behavior.clone(),
            stories: self
                .children_of_kind(id, NodeKind::Story)
                .into_iter()
                .map(|s| self.story_doc(s, level))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    fn story_doc(&self, id: NodeId, level: IncludeLevel) -> Result<StoryDoc> {
        let node = self.node(id)?;
        let NodeData::Story(data) = &node.data else {
            return Err(StoryMapError::NodeNotFound(format!("story {id}")));
        };
        let full = level == IncludeLevel::Full;
        let acceptance_criteria = if level >= IncludeLevel::AcceptanceCriteria {
            Some(
                self.acceptance_criteria(id)
                    .into_iter()
                    .map(|a| self.leaf_doc(a))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };
        let scenarios = if level >= IncludeLevel::Scenarios {
            Some(
                self.scenarios(id)
                    .into_iter()
                    .map(|s| self.scenario_doc(s, level))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };
        Ok(StoryDoc {
            name: node.name.clone(),
            sequential_order: order(node.sequential_order),
            behavior: node.behavior.clone(),
            users: data.users.clone(),
            story_type: data.story_type.clone(),
            test_class: data.test_class.clone().filter(|_| full),
            file_link: if full { self.file_link(id) } else { None },
            acceptance_criteria,
            scenarios,
        })
    }

    fn scenario_doc(&self, id: NodeId, level: IncludeLevel) -> Result<ScenarioDoc> {
        let node = self.node(id)?;
        let NodeData::Scenario(data) = &node.data else {
            return Err(StoryMapError::NodeNotFound(format!("scenario {id}")));
        };
        let full = level == IncludeLevel::Full;
        let steps = if full {
            Some(
                self.steps(id)
                    .into_iter()
                    .map(|s| self.leaf_doc(s))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };
        Ok(ScenarioDoc {
            name: node.name.clone(),
            sequential_order: order(node.sequential_order),
            behavior: node.behavior.clone(),
            scenario_type: data.scenario_type.clone(),
            background: Some(data.background.clone()),
            examples: data.examples.clone().filter(|_| full),
            test_method: data.test_method.clone().filter(|_| full),
            steps,
        })
    }

    fn leaf_doc(&self, id: NodeId) -> Result<LeafDoc> {
        let node = self.node(id)?;
        Ok(LeafDoc {
            name: node.name.clone(),
            sequential_order: order(node.sequential_order),
            behavior: node.behavior.clone(),
        })
    }
}

// ============================================================
// Document -> tree
// ============================================================

/// Access to the ordering key and name every serialized node carries.
trait Keyed {
    fn key(&self) -> (Option<&Number>, &str);
}

macro_rules! keyed {
    ($($doc:ty),*) => {
        $(impl Keyed for $doc {
            fn key(&self) -> (Option<&Number>, &str) {
                (self.sequential_order.as_ref(), &self.name)
            }
        })*
    };
}

keyed!(EpicDoc, SubEpicDoc, StoryGroupDoc, StoryDoc, ScenarioDoc, LeafDoc);

/// Order a collection whose members must carry `sequential_order`.
fn required<T: Keyed>(docs: Vec<T>, kind: NodeKind) -> Result<Vec<(usize, T)>> {
    let mut keyed = Vec::with_capacity(docs.len());
    for doc in docs {
        let (value, name) = doc.key();
        let Some(number) = value else {
            return Err(StoryMapError::MalformedDocument(format!(
                "{} `{name}` is missing sequential_order",
                kind.as_str()
            )));
        };
        let key = match number.as_f64() {
            Some(v) if v >= 0.0 && v.is_finite() => v,
            _ => {
                return Err(StoryMapError::MalformedDocument(format!(
                    "{} `{name}` has an invalid sequential_order {number}",
                    kind.as_str()
                )))
            }
        };
        keyed.push((key, doc));
    }
    Ok(ordered(keyed))
}

/// Order a collection where a missing key falls back to list position.
fn optional<T: Keyed>(docs: Vec<T>) -> Vec<(usize, T)> {
    let keyed = docs
        .into_iter()
        .enumerate()
        .map(|(i, doc)| {
            let key = doc.key().0.and_then(Number::as_f64).unwrap_or(i as f64);
            (key, doc)
        })
        .collect();
    ordered(keyed)
}

/// Sort by key (stable) and renumber the collection `0..n`, so gaps and
/// repeated keys in the document never survive a load.
fn ordered<T>(mut items: Vec<(f64, T)>) -> Vec<(usize, T)> {
    items.sort_by(|a, b| a.0.total_cmp(&b.0));
    items.into_iter().map(|(_, item)| item).enumerate().collect()
}

fn node_with(name: String, order: usize, behavior: Option<String>, data: NodeData) -> Node {
    let mut node = Node::new(name, data);
    node.sequential_order = order;
    node.behavior = behavior;
    node
}

impl StoryMap {
    /// Build a fresh map from a parsed document.
    pub fn from_document(doc: StoryMapDocument) -> Result<StoryMap> {
        let mut map = StoryMap::new();
        for (order, epic) in optional(doc.epics) {
            map.build_epic(order, epic)?;
        }
        *map.increments_mut() = IncrementIndex::from_increments(doc.increments);
        Ok(map)
    }

    fn build_epic(&mut self, order: usize, doc: EpicDoc) -> Result<NodeId> {
        let data = NodeData::Epic(EpicData {
            domain_concepts: doc.domain_concepts,
        });
        let id = self.graft(None, node_with(doc.name, order, doc.behavior, data));
        self.build_sub_epics(id, doc.sub_epics.unwrap_or_default())?;
        self.build_story_groups(id, doc.story_groups.unwrap_or_default())?;
        Ok(id)
    }

    fn build_sub_epics(&mut self, parent: NodeId, docs: Vec<SubEpicDoc>) -> Result<()> {
        for (order, doc) in required(docs, NodeKind::SubEpic)? {
            self.build_sub_epic(parent, order, doc)?;
        }
        Ok(())
    }

    fn build_sub_epic(&mut self, parent: NodeId, order: usize, doc: SubEpicDoc) -> Result<NodeId> {
        let data = NodeData::SubEpic(SubEpicData {
            domain_concepts: doc.domain_concepts,
            test_file: doc.test_file,
        });
        let id = self.graft(Some(parent), node_with(doc.name, order, doc.behavior, data));
        self.build_sub_epics(id, doc.sub_epics.unwrap_or_default())?;
        self.build_story_groups(id, doc.story_groups.unwrap_or_default())?;
        Ok(id)
    }

    fn build_story_groups(&mut self, parent: NodeId, docs: Vec<StoryGroupDoc>) -> Result<()> {
        for (order, doc) in required(docs, NodeKind::StoryGroup)? {
            self.build_story_group(parent, order, doc)?;
        }
        Ok(())
    }

    fn build_story_group(&mut self, parent: NodeId, order: usize, doc: StoryGroupDoc) -> Result<NodeId> {
        let data = NodeData::StoryGroup(StoryGroupData {
            group_type: doc.group_type,
            connector: doc.connector,
        });
        let id = self.graft(Some(parent), node_with(doc.name, order, doc.behavior, data));
        for (order, story) in required(doc.stories, NodeKind::Story)? {
            self.build_story(id, order, story)?;
        }
        Ok(id)
    }

    fn build_story(&mut self, parent: NodeId, order: usize, doc: StoryDoc) -> Result<NodeId> {
        let data = NodeData::Story(StoryData {
            test_class: doc.test_class,
            users: doc.users,
            story_type: doc.story_type,
        });
        let id = self.graft(Some(parent), node_with(doc.name, order, doc.behavior, data));

        let criteria = doc.acceptance_criteria.unwrap_or_default();
        for (order, ac) in required(criteria, NodeKind::AcceptanceCriteria)? {
            self.build_leaf(id, order, ac, NodeData::AcceptanceCriteria);
        }
        for (order, scenario) in required(doc.scenarios.unwrap_or_default(), NodeKind::Scenario)? {
            self.build_scenario(id, order, scenario);
        }
        Ok(id)
    }

    fn build_scenario(&mut self, parent: NodeId, order: usize, doc: ScenarioDoc) -> NodeId {
        let data = NodeData::Scenario(ScenarioData {
            background: doc.background.unwrap_or_default(),
            examples: doc.examples,
            test_method: doc.test_method,
            scenario_type: doc.scenario_type,
        });
        let id = self.graft(Some(parent), node_with(doc.name, order, doc.behavior, data));
        for (order, step) in optional(doc.steps.unwrap_or_default()) {
            self.build_leaf(id, order, step, NodeData::Step);
        }
        id
    }

    fn build_leaf(&mut self, parent: NodeId, order: usize, doc: LeafDoc, data: NodeData) -> NodeId {
        self.graft(Some(parent), node_with(doc.name, order, doc.behavior, data))
    }

    /// Attach a serialized node under `parent` (top level for Epics).
    ///
    /// The node is placed last in its collection and goes through the same
    /// hierarchy and sibling-name checks as a move. A Story sent to an Epic
    /// or SubEpic lands in that container's last StoryGroup, created when
    /// missing. The document is built in a scratch map first, so a malformed
    /// document leaves this map untouched.
    pub fn from_dict(&mut self, parent: Option<NodeId>, doc: NodeDoc) -> Result<NodeId> {
        let kind = doc.kind();
        let name = match &doc {
            NodeDoc::Epic(d) => d.name.clone(),
            NodeDoc::SubEpic(d) => d.name.clone(),
            NodeDoc::StoryGroup(d) => d.name.clone(),
            NodeDoc::Story(d) => d.name.clone(),
            NodeDoc::Scenario(d) => d.name.clone(),
            NodeDoc::AcceptanceCriteria(d) | NodeDoc::Step(d) => d.name.clone(),
        };

        let id = match (parent, doc) {
            (None, NodeDoc::Epic(d)) => {
                check_unique(self, None, &name, None)?;
                StoryMap::new().build_epic(0, d.clone())?;
                let order = self.epics().len();
                self.build_epic(order, d)?
            }
            (None, _) => {
                return Err(StoryMapError::hierarchy(
                    kind,
                    NodeKind::Epic,
                    "only epics live at the top level",
                ))
            }
            (Some(parent), doc) => {
                check_can_hold(self, parent, kind, false)?;
                let scope = Some(sibling_scope(self, parent));
                match &doc {
                    NodeDoc::StoryGroup(d) => {
                        for story in &d.stories {
                            check_unique(self, scope, &story.name, None)?;
                        }
                    }
                    _ => check_unique(self, scope, &name, None)?,
                }
                let mut scratch = StoryMap::new();
                let root = scratch.graft(None, Node::new(String::new(), NodeData::empty(self.kind(parent)?)));
                scratch.graft_doc(root, doc.clone())?;
                self.graft_doc(parent, doc)?
            }
        };
        self.commit()?;
        Ok(id)
    }

    fn graft_doc(&mut self, parent: NodeId, doc: NodeDoc) -> Result<NodeId> {
        let needs_group = matches!(doc, NodeDoc::Story(_))
            && matches!(self.kind(parent)?, NodeKind::Epic | NodeKind::SubEpic);
        let parent = if needs_group {
            match self.story_groups(parent).last().copied() {
                Some(group) => group,
                None => {
                    let group = node_with(String::new(), 0, None, NodeData::empty(NodeKind::StoryGroup));
                    self.graft(Some(parent), group)
                }
            }
        } else {
            parent
        };

        let next = self.children_of_kind(parent, doc.kind()).len();
        Ok(match doc {
            NodeDoc::Epic(d) => self.build_epic(next, d)?,
            NodeDoc::SubEpic(d) => self.build_sub_epic(parent, next, d)?,
            NodeDoc::StoryGroup(d) => self.build_story_group(parent, next, d)?,
            NodeDoc::Story(d) => self.build_story(parent, next, d)?,
            NodeDoc::Scenario(d) => self.build_scenario(parent, next, d),
            NodeDoc::AcceptanceCriteria(d) => self.build_leaf(parent, next, d, NodeData::AcceptanceCriteria),
            NodeDoc::Step(d) => self.build_leaf(parent, next, d, NodeData::Step),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_closes_gaps_and_repeats() {
        let out = ordered(vec![(5.0, "b"), (0.0, "a"), (5.0, "c"), (9.0, "d")]);
        assert_eq!(out, vec![(0, "a"), (1, "b"), (2, "c"), (3, "d")]);
    }

    #[test]
    fn test_ordered_renumbers_fractional_keys() {
        let out = ordered(vec![(1.0, "b"), (0.5, "a"), (2.0, "c")]);
        assert_eq!(out, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn test_include_level_names() {
        for level in [
            IncludeLevel::DomainConcepts,
            IncludeLevel::Stories,
            IncludeLevel::AcceptanceCriteria,
            IncludeLevel::Scenarios,
            IncludeLevel::Full,
        ] {
            assert_eq!(IncludeLevel::from_str(level.as_str()), Some(level));
        }
        assert_eq!(IncludeLevel::from_str("everything"), None);
    }
}
