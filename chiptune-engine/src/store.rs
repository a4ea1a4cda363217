//! String key/value store and the three song slots.
//!
//! Values are plain strings, the same shape the device keeps in flash.
//! [`FileStore`] persists them as a flat TOML table and writes through on
//! every `set`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use chiptune_core::Song;

use crate::error::{AudioError, Result};

/// Minimal string store.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<K: KvStore + ?Sized> KvStore for &mut K {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct Table(BTreeMap<String, String>);

/// Volatile store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    table: Table,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.0.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.table.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.table.0.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// TOML-backed store, one file per store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: Table,
}

impl FileStore {
    /// Open `path`. A missing file is an empty store; a malformed one is
    /// ignored with a warning and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Table>(&contents) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!(target: "store", "ignoring malformed store {}: {}", path.display(), e);
                    Table::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::default(),
            Err(e) => return Err(e.into()),
        };
        log::debug!(target: "store", "opened {} ({} keys)", path.display(), table.0.len());
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let text = toml::to_string(&self.table).map_err(|e| AudioError::Store(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.table.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.table.0.insert(key.to_owned(), value.to_owned());
        self.flush()
    }
}

// ----- Song slots -----

/// One of the three persisted song slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SongSlot(u8);

impl SongSlot {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 3;

    /// `None` outside 1..=3.
    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Self(n))
    }

    pub fn key(self) -> &'static str {
        match self.0 {
            1 => "song1",
            2 => "song2",
            _ => "song3",
        }
    }

    pub fn all() -> impl Iterator<Item = SongSlot> {
        (Self::MIN..=Self::MAX).map(SongSlot)
    }
}

impl fmt::Display for SongSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Saved song in `slot`, `None` when the slot was never written or is empty.
pub fn load_song<K: KvStore + ?Sized>(store: &K, slot: SongSlot) -> Option<Song> {
    let raw = store.get(slot.key())?;
    if raw.is_empty() {
        return None;
    }
    Some(Song::parse(&raw))
}

pub fn save_song<K: KvStore + ?Sized>(store: &mut K, slot: SongSlot, song: &Song) -> Result<()> {
    log::debug!(target: "store", "saving slot {slot}");
    store.set(slot.key(), &song.to_persisted())
}
