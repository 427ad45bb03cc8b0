//! Shared validation helpers for the mutation engine.
//!
//! Every check here is read-only; callers run them all before touching the
//! arena.

use crate::error::{Result, StoryMapError};
use crate::models::{NodeId, NodeKind};

use super::StoryMap;

/// Characters never allowed in a node name.
pub const FORBIDDEN_CHARS: [char; 7] = ['<', '>', '\\', '|', '*', '?', '"'];

/// Trim and check a user-supplied name.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoryMapError::EmptyName);
    }
    if trimmed.contains(FORBIDDEN_CHARS) {
        return Err(StoryMapError::InvalidCharacters {
            name: trimmed.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Whether a node of kind `child` may be placed under `parent`.
///
/// `creating` selects the stricter creation rules: an Epic only creates
/// SubEpics, and StoryGroups are never created explicitly.
pub(crate) fn check_can_hold(map: &StoryMap, parent: NodeId, child: NodeKind, creating: bool) -> Result<()> {
    let parent_kind = map.kind(parent)?;
    let violation = |reason: &str| Err(StoryMapError::hierarchy(child, parent_kind, reason));

    match (parent_kind, child) {
        (_, NodeKind::Epic) => violation("epics only live at the top level"),
        (NodeKind::Epic, NodeKind::SubEpic) => Ok(()),
        (NodeKind::Epic, NodeKind::Story | NodeKind::StoryGroup) if !creating => Ok(()),
        (NodeKind::Epic, _) => violation("an epic can only create sub-epics"),
        (NodeKind::SubEpic, NodeKind::SubEpic) => {
            if map.story_groups(parent).is_empty() {
                Ok(())
            } else {
                violation("the sub-epic already holds stories")
            }
        }
        (NodeKind::SubEpic, NodeKind::Story) | (NodeKind::SubEpic, NodeKind::StoryGroup) => {
            if creating && child == NodeKind::StoryGroup {
                violation("story groups are created implicitly with their stories")
            } else if map.sub_epics(parent).is_empty() {
                Ok(())
            } else {
                violation("the sub-epic holds nested sub-epics")
            }
        }
        (NodeKind::SubEpic, _) => violation("a sub-epic holds sub-epics or stories"),
        (NodeKind::StoryGroup, NodeKind::Story) => Ok(()),
        (NodeKind::StoryGroup, _) => violation("a story group only holds stories"),
        (NodeKind::Story, NodeKind::Scenario | NodeKind::AcceptanceCriteria) => Ok(()),
        (NodeKind::Story, _) => violation("a story holds scenarios or acceptance criteria"),
        (NodeKind::Scenario, NodeKind::Step) => Ok(()),
        (NodeKind::Scenario, _) => violation("a scenario only holds steps"),
        (NodeKind::AcceptanceCriteria | NodeKind::Step, _) => violation("leaf nodes hold no children"),
    }
}

/// The node whose consumer-visible children are the siblings of anything
/// placed in `container`. StoryGroups defer to their owner.
pub(crate) fn sibling_scope(map: &StoryMap, container: NodeId) -> NodeId {
    match map.get(container).map(|n| n.kind()) {
        Some(NodeKind::StoryGroup) => map.parent(container).unwrap_or(container),
        _ => container,
    }
}

/// Names of the siblings in `scope` (Epics when `None`), skipping `exclude`.
fn sibling_names(map: &StoryMap, scope: Option<NodeId>, exclude: Option<NodeId>) -> Vec<&str> {
    let siblings = match scope {
        Some(s) => map.children(s),
        None => map.epics().to_vec(),
    };
    siblings
        .into_iter()
        .filter(|id| Some(*id) != exclude)
        .filter_map(|id| map.get(id))
        .map(|n| n.name())
        .collect()
}

pub(crate) fn check_unique(map: &StoryMap, scope: Option<NodeId>, name: &str, exclude: Option<NodeId>) -> Result<()> {
    if sibling_names(map, scope, exclude).contains(&name) {
        let parent = match scope {
            Some(s) => map.name(s)?.to_string(),
            None => "<root>".to_string(),
        };
        return Err(StoryMapError::DuplicateSiblingName {
            name: name.to_string(),
            parent,
        });
    }
    Ok(())
}

/// First free `{Type}{n}` name in `scope`, counting from 1.
pub(crate) fn default_name(map: &StoryMap, scope: Option<NodeId>, kind: NodeKind) -> String {
    let taken = sibling_names(map, scope, None);
    (1..)
        .map(|n| format!("{}{}", kind.default_name_prefix(), n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| kind.default_name_prefix().to_string())
}

/// Reject moving `node` into itself or anything below it.
pub(crate) fn check_not_circular(map: &StoryMap, node: NodeId, target: NodeId) -> Result<()> {
    if node == target || map.is_descendant(target, node) {
        return Err(StoryMapError::CircularReference {
            node: map.name(node)?.to_string(),
            target: map.name(target)?.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Login  ").unwrap(), "Login");
    }

    #[test]
    fn test_validate_name_rejects_blank() {
        assert!(matches!(validate_name(""), Err(StoryMapError::EmptyName)));
        assert!(matches!(validate_name(" \t "), Err(StoryMapError::EmptyName)));
    }

    #[test]
    fn test_validate_name_rejects_forbidden_characters() {
        for bad in ["a<b", "a>b", "a\\b", "a|b", "a*b", "a?b", "a\"b"] {
            assert!(
                matches!(validate_name(bad), Err(StoryMapError::InvalidCharacters { .. })),
                "{bad} should be rejected"
            );
        }
        assert!(validate_name("Pay: with card (v2) - fast/slow").is_ok());
    }

    #[test]
    fn test_default_name_skips_taken() {
        let mut map = StoryMap::new();
        let epic = map.create_epic(Some("E"), None).unwrap();
        map.create_child(epic, Some("SubEpic1"), None, None).unwrap();
        assert_eq!(default_name(&map, Some(epic), NodeKind::SubEpic), "SubEpic2");
    }
}
