//! Loading and saving the story map document.
//!
//! The whole tree is read from and written to a single JSON file. Saves
//! always rewrite the full document.

pub mod document;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::{Result, StoryMapError};
use crate::map::StoryMap;

use document::{IncludeLevel, StoryMapDocument};

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl StoryMap {
    /// Parse a document string into a map with no backing file.
    pub fn from_json(json: &str) -> Result<StoryMap> {
        let doc: StoryMapDocument =
            serde_json::from_str(json).map_err(|e| StoryMapError::MalformedDocument(e.to_string()))?;
        StoryMap::from_document(doc)
    }

    /// Serialize the whole map as pretty JSON at `level`.
    pub fn to_json(&self, level: IncludeLevel) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document(level)?)?)
    }

    /// Load a map from `path`. The map writes every later mutation back to
    /// the same file.
    pub fn load(path: impl AsRef<Path>) -> Result<StoryMap> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoryMapError::DocumentNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        let mut map = StoryMap::from_json(&json)?;
        map.set_source(Some(path.to_path_buf()), modified(path));
        info!(
            path = %path.display(),
            epics = map.epics().len(),
            increments = map.increments().len(),
            "story map loaded"
        );
        Ok(map)
    }

    /// Write the whole map to its backing file. A map without one is left
    /// in memory only.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.source().map(Path::to_path_buf) else {
            debug!("story map has no backing file; skipping save");
            return Ok(());
        };
        self.write_to(&path)
    }

    /// Write the map to `path` and make it the backing file.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to(path.as_ref())
    }

    fn write_to(&mut self, path: &Path) -> Result<()> {
        let json = self.to_json(IncludeLevel::Full)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        self.set_source(Some(path.to_path_buf()), modified(path));
        debug!(path = %path.display(), "story map saved");
        Ok(())
    }
}

/// A story map bound to a file, cached between reads.
///
/// The cached tree is dropped and reloaded whenever the file's modification
/// time no longer matches the one recorded at the last load or save. There
/// is no merge: the newer read wins.
#[derive(Debug)]
pub struct StoryMapStore {
    path: PathBuf,
    cached: Option<StoryMap>,
}

impl StoryMapStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    /// Open `path`, writing an empty document first when it does not exist.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            StoryMap::new().save_as(&path)?;
            info!(path = %path.display(), "created empty story map");
        }
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the cached tree no longer reflects the file on disk.
    pub fn is_stale(&self) -> bool {
        match &self.cached {
            Some(map) => map.disk_mtime().is_none() || map.disk_mtime() != modified(&self.path),
            None => true,
        }
    }

    /// Drop the cached tree so the next access reloads it.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// The current tree, reloaded from disk if the file changed.
    pub fn map(&mut self) -> Result<&mut StoryMap> {
        if self.is_stale() {
            if self.cached.is_some() {
                debug!(path = %self.path.display(), "story map changed on disk; reloading");
            }
            self.cached = None;
            self.cached = Some(StoryMap::load(&self.path)?);
        }
        self.cached
            .as_mut()
            .ok_or_else(|| StoryMapError::DocumentNotFound(self.path.clone()))
    }
}
