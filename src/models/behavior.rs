use serde::{Deserialize, Serialize};

/// The workflow stage still outstanding for a node.
///
/// Stages are ordered earliest first, so the least-advanced stage of a set
/// is its minimum.
///
/// - `Exploration`: no acceptance criteria and no scenarios yet
/// - `Scenarios`: acceptance criteria exist, scenarios are missing
/// - `Tests`: scenarios exist, some have no resolvable test method
/// - `Code`: every scenario resolves to a test method on disk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorStage {
    Exploration,
    Scenarios,
    Tests,
    Code,
}

impl BehaviorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploration => "exploration",
            Self::Scenarios => "scenarios",
            Self::Tests => "tests",
            Self::Code => "code",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exploration" => Some(Self::Exploration),
            "scenarios" => Some(Self::Scenarios),
            "tests" => Some(Self::Tests),
            "code" => Some(Self::Code),
            _ => None,
        }
    }

    pub fn is_final(&self) -> bool {
        *self == Self::Code
    }
}
