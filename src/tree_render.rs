//! ASCII tree rendering for story maps.

use std::path::Path;

use crate::map::StoryMap;
use crate::models::{BehaviorStage, NodeId, NodeKind};

const EXPLORATION: char = '◇';
const SCENARIOS: char = '○';
const TESTS: char = '◐';
const CODE: char = '●';

/// Get the status symbol for a behavior stage.
fn stage_symbol(stage: BehaviorStage) -> char {
    match stage {
        BehaviorStage::Exploration => EXPLORATION,
        BehaviorStage::Scenarios => SCENARIOS,
        BehaviorStage::Tests => TESTS,
        BehaviorStage::Code => CODE,
    }
}

/// Render every Epic down to Story level, each node marked with the stage
/// it still needs.
///
/// Example output:
/// ```text
/// Checkout
/// ├── ● Pay by card
/// │   ├── ● Enter card details
/// │   └── ◐ Refund
/// └── ◇ Gift cards
/// ```
pub fn render_tree(map: &StoryMap, test_dir: &Path) -> String {
    let mut output = String::new();
    for epic in map.epics() {
        render_node(&mut output, map, *epic, test_dir, "", true, true, true);
    }
    output
}

/// Render the subtree under `id` in full, scenarios and steps included.
pub fn render_subtree(map: &StoryMap, id: NodeId, test_dir: &Path) -> String {
    let mut output = String::new();
    render_node(&mut output, map, id, test_dir, "", true, true, false);
    output
}

#[allow(clippy::too_many_arguments)]
fn render_node(
    output: &mut String,
    map: &StoryMap,
    id: NodeId,
    test_dir: &Path,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    stop_at_story: bool,
) {
    let Some(node) = map.get(id) else {
        return;
    };

    if is_root {
        output.push_str(node.name());
        output.push('\n');
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        if matches!(node.kind(), NodeKind::AcceptanceCriteria | NodeKind::Step) {
            output.push('•');
        } else {
            let stage = map
                .behavior_needed(id, test_dir)
                .unwrap_or(BehaviorStage::Exploration);
            output.push(stage_symbol(stage));
        }
        output.push(' ');
        output.push_str(node.name());
        output.push('\n');
    }

    if stop_at_story && node.kind() == NodeKind::Story {
        return;
    }

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    let children = map.children(id);
    for (i, child) in children.iter().enumerate() {
        let child_is_last = i == children.len() - 1;
        render_node(output, map, *child, test_dir, &child_prefix, child_is_last, false, stop_at_story);
    }
}
