use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the workspace root.
pub const WORKSPACE_ENV: &str = "STORYMAP_WORKSPACE";
const CONFIG_FILE: &str = "storymap.json";
const DEFAULT_STORY_GRAPH: &str = "docs/story/story-graph.json";
const DEFAULT_TEST_DIR: &str = "test";

/// Optional overrides read from `storymap.json` in the workspace root.
/// Relative paths are resolved against the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Location of the story map document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_graph: Option<PathBuf>,
    /// Directory test files are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    fn try_load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Write the overrides to `storymap.json` under `root`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(root.join(CONFIG_FILE), content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Where the story map document and the test files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub story_graph: PathBuf,
    pub test_dir: PathBuf,
}

impl Workspace {
    /// Resolve the workspace root from `flag`, then `STORYMAP_WORKSPACE`,
    /// then the current directory, and apply any `storymap.json` overrides.
    pub fn resolve(flag: Option<PathBuf>) -> Result<Self> {
        let root = match flag {
            Some(root) => root,
            None => match std::env::var_os(WORKSPACE_ENV) {
                Some(root) => PathBuf::from(root),
                None => std::env::current_dir().context("Failed to determine current directory")?,
            },
        };
        Self::at(root)
    }

    /// Workspace rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = WorkspaceConfig::try_load(&root)?;
        let story_graph = root.join(config.story_graph.unwrap_or_else(|| DEFAULT_STORY_GRAPH.into()));
        let test_dir = root.join(config.test_dir.unwrap_or_else(|| DEFAULT_TEST_DIR.into()));
        tracing::debug!(
            root = %root.display(),
            story_graph = %story_graph.display(),
            test_dir = %test_dir.display(),
            "resolved workspace"
        );
        Ok(Self {
            root,
            story_graph,
            test_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::at(dir.path()).unwrap();
        assert_eq!(ws.story_graph, dir.path().join("docs/story/story-graph.json"));
        assert_eq!(ws.test_dir, dir.path().join("test"));
    }

    #[test]
    fn test_config_file_overrides_paths() {
        let dir = TempDir::new().unwrap();
        WorkspaceConfig {
            story_graph: Some("map.json".into()),
            test_dir: None,
        }
        .save(dir.path())
        .unwrap();

        let ws = Workspace::at(dir.path()).unwrap();
        assert_eq!(ws.story_graph, dir.path().join("map.json"));
        assert_eq!(ws.test_dir, dir.path().join("test"));
    }

    #[test]
    fn test_unparsable_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        let err = Workspace::at(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn test_flag_wins() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::resolve(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(ws.root, dir.path());
    }
}
