//! Priority-ordered index of increments.
//!
//! The index is independent of tree ownership: it stores Story names only.

use tracing::debug;

use crate::error::{Result, StoryMapError};
use crate::map::validate::validate_name;
use crate::models::{Increment, Placement};

/// Increments kept in ascending priority order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementIndex {
    increments: Vec<Increment>,
}

impl IncrementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from loaded increments, ordering them by priority.
    /// Increments sharing a priority keep their document order.
    pub fn from_increments(mut increments: Vec<Increment>) -> Self {
        increments.sort_by_key(|i| i.priority);
        Self { increments }
    }

    pub fn as_slice(&self) -> &[Increment] {
        &self.increments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Increment> {
        self.increments.iter()
    }

    pub fn len(&self) -> usize {
        self.increments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.increments.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Increment> {
        self.increments.iter().find(|i| i.name == name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.increments
            .iter()
            .position(|i| i.name == name)
            .ok_or_else(|| StoryMapError::IncrementNotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Increment> {
        let idx = self.position(name)?;
        Ok(&mut self.increments[idx])
    }

    /// Add an increment.
    ///
    /// With `after`, the new increment is placed immediately after the named
    /// one with priority `after.priority + 1`, and every later increment is
    /// shifted up by one. Otherwise it is inserted by `priority`, defaulting
    /// to one past the current highest priority.
    pub fn add(&mut self, name: &str, priority: Option<i64>, after: Option<&str>) -> Result<&Increment> {
        let name = validate_name(name)?;
        if self.get(&name).is_some() {
            return Err(StoryMapError::DuplicateIncrement(name));
        }

        let idx = match after {
            Some(after) => {
                let anchor = self.position(after)?;
                let priority = self.increments[anchor].priority + 1;
                for later in &mut self.increments[anchor + 1..] {
                    later.priority += 1;
                }
                self.increments.insert(anchor + 1, Increment::new(name, priority));
                anchor + 1
            }
            None => {
                let priority = priority.unwrap_or_else(|| {
                    self.increments.last().map(|i| i.priority + 1).unwrap_or(1)
                });
                let idx = self.increments.partition_point(|i| i.priority <= priority);
                self.increments.insert(idx, Increment::new(name, priority));
                idx
            }
        };

        debug!(increment = %self.increments[idx].name, priority = self.increments[idx].priority, "increment added");
        Ok(&self.increments[idx])
    }

    pub fn remove(&mut self, name: &str) -> Result<Increment> {
        let idx = self.position(name)?;
        Ok(self.increments.remove(idx))
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let new_name = validate_name(new_name)?;
        let idx = self.position(name)?;
        if new_name == name {
            return Ok(());
        }
        if self.get(&new_name).is_some() {
            return Err(StoryMapError::DuplicateIncrement(new_name));
        }
        self.increments[idx].name = new_name;
        Ok(())
    }

    /// Move an increment before or after another one, then renumber every
    /// priority to `1..=n` in list order.
    pub fn reorder(&mut self, name: &str, placement: Placement) -> Result<()> {
        let from = self.position(name)?;
        let anchor_name = match &placement {
            Placement::Before(n) | Placement::After(n) => n.as_str(),
        };
        self.position(anchor_name)?;
        if anchor_name == name {
            return Ok(());
        }

        let moving = self.increments.remove(from);
        let anchor = self.position(anchor_name)?;
        let to = match placement {
            Placement::Before(_) => anchor,
            Placement::After(_) => anchor + 1,
        };
        self.increments.insert(to, moving);
        self.renumber();
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, inc) in self.increments.iter_mut().enumerate() {
            inc.priority = i as i64 + 1;
        }
    }

    /// Add a Story reference at `position` (appended when `None` or past the end).
    pub fn add_story(&mut self, increment: &str, story: &str, position: Option<usize>) -> Result<()> {
        let inc = self.get_mut(increment)?;
        if inc.references(story) {
            return Err(StoryMapError::DuplicateStoryReference {
                increment: increment.to_string(),
                story: story.to_string(),
            });
        }
        let at = position.unwrap_or(inc.stories.len()).min(inc.stories.len());
        inc.stories.insert(at, story.to_string());
        Ok(())
    }

    pub fn remove_story(&mut self, increment: &str, story: &str) -> Result<()> {
        let inc = self.get_mut(increment)?;
        let Some(idx) = inc.stories.iter().position(|s| s == story) else {
            return Err(StoryMapError::StoryReferenceNotFound {
                increment: increment.to_string(),
                story: story.to_string(),
            });
        };
        inc.stories.remove(idx);
        Ok(())
    }

    pub fn reorder_story(&mut self, increment: &str, story: &str, position: usize) -> Result<()> {
        let inc = self.get_mut(increment)?;
        let Some(idx) = inc.stories.iter().position(|s| s == story) else {
            return Err(StoryMapError::StoryReferenceNotFound {
                increment: increment.to_string(),
                story: story.to_string(),
            });
        };
        let moving = inc.stories.remove(idx);
        let at = position.min(inc.stories.len());
        inc.stories.insert(at, moving);
        Ok(())
    }

    /// Replace every reference to `old` with `new` in place. An increment that
    /// already references `new` just loses its `old` entry, so no increment
    /// ever lists a story twice. Returns the number of references changed.
    pub fn rename_story_references(&mut self, old: &str, new: &str) -> usize {
        if old == new {
            return 0;
        }
        let mut changed = 0;
        for inc in &mut self.increments {
            if inc.references(new) {
                let before = inc.stories.len();
                inc.stories.retain(|s| s != old);
                changed += before - inc.stories.len();
                continue;
            }
            for story in inc.stories.iter_mut().filter(|s| s.as_str() == old) {
                *story = new.to_string();
                changed += 1;
            }
        }
        changed
    }

    /// Drop every reference to `story`. Returns the number of references removed.
    pub fn remove_story_from_all(&mut self, story: &str) -> usize {
        let mut removed = 0;
        for inc in &mut self.increments {
            let before = inc.stories.len();
            inc.stories.retain(|s| s != story);
            removed += before - inc.stories.len();
        }
        removed
    }

    /// Names of the increments referencing `story`, in priority order.
    pub fn increments_referencing(&self, story: &str) -> Vec<&str> {
        self.increments
            .iter()
            .filter(|i| i.references(story))
            .map(|i| i.name.as_str())
            .collect()
    }
}
