//! The derived `behavior_needed` stage.
//!
//! Recomputed on every call by walking the subtree and reading each Story's
//! governing test file from disk. Nothing is cached.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::models::*;

use super::StoryMap;

impl StoryMap {
    /// Workflow stage still outstanding for `id`.
    ///
    /// Stories follow the ladder in [`BehaviorStage`]. Containers report the
    /// least-advanced stage among their Stories and nested SubEpics; an empty
    /// container reports [`BehaviorStage::Exploration`]. Test files are
    /// resolved against `test_dir`.
    pub fn behavior_needed(&self, id: NodeId, test_dir: &Path) -> Result<BehaviorStage> {
        let node = self.node(id)?;
        Ok(match node.kind() {
            NodeKind::Story => self.story_stage(id, test_dir),
            NodeKind::Epic | NodeKind::SubEpic | NodeKind::StoryGroup => {
                let mut members = self.sub_epics(id);
                members.extend(self.stories(id));
                members
                    .into_iter()
                    .map(|m| self.behavior_needed(m, test_dir))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .min()
                    .unwrap_or(BehaviorStage::Exploration)
            }
            NodeKind::Scenario => {
                let source = self.test_source(id, test_dir);
                if scenario_resolves(node, source.as_deref()) {
                    BehaviorStage::Code
                } else {
                    BehaviorStage::Tests
                }
            }
            NodeKind::AcceptanceCriteria | NodeKind::Step => match self.enclosing(id, NodeKind::Story) {
                Some(story) => self.story_stage(story, test_dir),
                None => BehaviorStage::Exploration,
            },
        })
    }

    fn story_stage(&self, story: NodeId, test_dir: &Path) -> BehaviorStage {
        let has_criteria = !self.acceptance_criteria(story).is_empty();
        let scenarios = self.scenarios(story);

        if scenarios.is_empty() {
            return if has_criteria {
                BehaviorStage::Scenarios
            } else {
                BehaviorStage::Exploration
            };
        }

        let source = self.test_source(story, test_dir);
        let all_resolve = scenarios
            .iter()
            .filter_map(|s| self.get(*s))
            .all(|s| scenario_resolves(s, source.as_deref()));

        if all_resolve {
            BehaviorStage::Code
        } else {
            BehaviorStage::Tests
        }
    }

    /// Contents of the test file governing `id`, if one is declared and readable.
    fn test_source(&self, id: NodeId, test_dir: &Path) -> Option<String> {
        let file = self.governing_test_file(id)?;
        let path = test_dir.join(file);
        match fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "test file not readable");
                None
            }
        }
    }
}

fn scenario_resolves(scenario: &Node, source: Option<&str>) -> bool {
    let (Some(source), NodeData::Scenario(data)) = (source, &scenario.data) else {
        return false;
    };
    data.test_method
        .as_deref()
        .is_some_and(|method| contains_identifier(source, method))
}

/// True when `ident` occurs in `source` as a whole identifier.
pub(crate) fn contains_identifier(source: &str, ident: &str) -> bool {
    if ident.is_empty() {
        return false;
    }
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    source.match_indices(ident).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + ident.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_identifier_whole_word_only() {
        let source = "class TestLogin:\n    def test_valid_login(self):\n        pass\n";
        assert!(contains_identifier(source, "test_valid_login"));
        assert!(contains_identifier(source, "TestLogin"));
        assert!(!contains_identifier(source, "test_valid"));
        assert!(!contains_identifier(source, "valid_login"));
        assert!(!contains_identifier(source, ""));
    }
}
