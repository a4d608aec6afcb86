//! Installation levels and the per-block slot record

use std::collections::BTreeMap;
use std::fmt;

use crate::block::BlockRecord;
use crate::requirement::Identifier;

/// Stage a copy of a block occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    /// Working copy under the workspace path.
    Downloaded,
    /// "latest" copy in the cache.
    Installed,
    /// Listed by a vendor index only.
    Available,
    /// Frozen pin in the cache (`v1`, `v1.2`, `v1.2.3`).
    Versioned,
    /// Scratch copy used during installation; never registered.
    Transient,
}

impl Level {
    /// Ascending specificity; `None` for the transient level.
    pub fn rank(self) -> Option<u8> {
        match self {
            Level::Downloaded => Some(0),
            Level::Installed => Some(1),
            Level::Available => Some(2),
            Level::Versioned => Some(3),
            Level::Transient => None,
        }
    }

    /// Levels that correspond to real version-control working copies.
    pub fn has_repository(self) -> bool {
        matches!(self, Level::Downloaded | Level::Installed | Level::Transient)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Downloaded => "downloaded",
            Level::Installed => "installed",
            Level::Available => "available",
            Level::Versioned => "versioned",
            Level::Transient => "transient",
        };
        write!(f, "{}", name)
    }
}

/// Address of a registered record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockRef {
    /// Lowercased identifier.
    pub key: Identifier,
    pub level: Level,
    /// Pin directory name, only for [`Level::Versioned`].
    pub pin: Option<String>,
}

impl BlockRef {
    pub fn new(id: &Identifier, level: Level) -> Self {
        Self {
            key: id.key(),
            level,
            pin: None,
        }
    }

    pub fn pinned(id: &Identifier, pin: impl Into<String>) -> Self {
        Self {
            key: id.key(),
            level: Level::Versioned,
            pin: Some(pin.into()),
        }
    }

    /// Same block at another level.
    pub fn at(&self, level: Level) -> Self {
        Self {
            key: self.key.clone(),
            level,
            pin: None,
        }
    }
}

/// Every copy of one block, one named slot per level.
#[derive(Default)]
pub struct LevelSlots {
    pub downloaded: Option<BlockRecord>,
    pub installed: Option<BlockRecord>,
    pub available: Option<BlockRecord>,
    pub versioned: BTreeMap<String, BlockRecord>,
}

impl LevelSlots {
    pub fn get(&self, level: Level, pin: Option<&str>) -> Option<&BlockRecord> {
        match level {
            Level::Downloaded => self.downloaded.as_ref(),
            Level::Installed => self.installed.as_ref(),
            Level::Available => self.available.as_ref(),
            Level::Versioned => pin.and_then(|p| self.versioned.get(p)),
            Level::Transient => None,
        }
    }

    pub fn get_mut(&mut self, level: Level, pin: Option<&str>) -> Option<&mut BlockRecord> {
        match level {
            Level::Downloaded => self.downloaded.as_mut(),
            Level::Installed => self.installed.as_mut(),
            Level::Available => self.available.as_mut(),
            Level::Versioned => match pin {
                Some(p) => self.versioned.get_mut(p),
                None => None,
            },
            Level::Transient => None,
        }
    }

    /// Place a record in its slot. An occupied slot hands the record back.
    pub fn put(&mut self, record: BlockRecord) -> Result<(), BlockRecord> {
        let slot = match record.level() {
            Level::Downloaded => &mut self.downloaded,
            Level::Installed => &mut self.installed,
            Level::Available => &mut self.available,
            Level::Versioned => {
                let Some(pin) = record.pin().map(str::to_string) else {
                    return Err(record);
                };
                if self.versioned.contains_key(&pin) {
                    return Err(record);
                }
                self.versioned.insert(pin, record);
                return Ok(());
            }
            Level::Transient => return Err(record),
        };
        if slot.is_some() {
            return Err(record);
        }
        *slot = Some(record);
        Ok(())
    }

    pub fn take(&mut self, level: Level, pin: Option<&str>) -> Option<BlockRecord> {
        match level {
            Level::Downloaded => self.downloaded.take(),
            Level::Installed => self.installed.take(),
            Level::Available => self.available.take(),
            Level::Versioned => pin.and_then(|p| self.versioned.remove(p)),
            Level::Transient => None,
        }
    }

    /// Number of occupied slots, pins included.
    pub fn occupied(&self) -> usize {
        [&self.downloaded, &self.installed, &self.available]
            .iter()
            .filter(|s| s.is_some())
            .count()
            + self.versioned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    pub fn records(&self) -> impl Iterator<Item = &BlockRecord> {
        self.downloaded
            .iter()
            .chain(self.installed.iter())
            .chain(self.available.iter())
            .chain(self.versioned.values())
    }

    /// Any record, most authoritative first, for display purposes.
    pub fn representative(&self) -> Option<&BlockRecord> {
        self.downloaded
            .as_ref()
            .or(self.installed.as_ref())
            .or(self.available.as_ref())
            .or_else(|| self.versioned.values().next())
    }
}
