//! Persisted sound on/off switch and master volume.

use crate::error::Result;
use crate::store::KvStore;

pub const KEY_ENABLED: &str = "sound_enabled";
pub const KEY_VOLUME: &str = "sound_volume";

/// Volume changes smaller than this are not written back.
pub const VOLUME_EPSILON: f32 = 0.001;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SoundSettings {
    enabled: bool,
    volume: f32,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self { enabled: true, volume: 1.0 }
    }
}

impl SoundSettings {
    /// Read both keys; absent or unreadable values keep their defaults.
    pub fn load<K: KvStore + ?Sized>(store: &K) -> Self {
        let mut s = Self::default();
        if let Some(v) = store.get(KEY_ENABLED).filter(|v| !v.is_empty()) {
            s.enabled = !(v == "false" || v == "0");
        }
        if let Some(v) = store.get(KEY_VOLUME).filter(|v| !v.is_empty()) {
            match v.trim().parse::<f32>() {
                Ok(x) if !x.is_nan() => s.volume = x.clamp(0.0, 1.0),
                _ => log::warn!(target: "store", "ignoring bad {KEY_VOLUME} value {v:?}"),
            }
        }
        s
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Returns whether the value changed.
    pub fn set_enabled<K: KvStore + ?Sized>(
        &mut self,
        store: &mut K,
        value: bool,
        persist: bool,
    ) -> Result<bool> {
        if self.enabled == value {
            return Ok(false);
        }
        self.enabled = value;
        if persist {
            self.persist(store)?;
        }
        Ok(true)
    }

    /// Clamps to [0, 1]; NaN is ignored. Returns whether the value changed.
    pub fn set_volume<K: KvStore + ?Sized>(
        &mut self,
        store: &mut K,
        value: f32,
        persist: bool,
    ) -> Result<bool> {
        if value.is_nan() {
            return Ok(false);
        }
        let clamped = value.clamp(0.0, 1.0);
        if (self.volume - clamped).abs() < VOLUME_EPSILON {
            return Ok(false);
        }
        self.volume = clamped;
        if persist {
            self.persist(store)?;
        }
        Ok(true)
    }

    /// Write both keys.
    pub fn persist<K: KvStore + ?Sized>(&self, store: &mut K) -> Result<()> {
        store.set(KEY_ENABLED, if self.enabled { "true" } else { "false" })?;
        store.set(KEY_VOLUME, &format!("{:.3}", self.volume))
    }

    /// Master gain applied on top of a preset's own volume; 0 when muted.
    pub fn apply(&self, volume: f32) -> f32 {
        if self.enabled {
            volume * self.volume
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn defaults_when_store_is_empty() {
        let s = SoundSettings::load(&MemoryStore::new());
        assert!(s.enabled());
        assert_eq!(s.volume(), 1.0);
    }

    #[test]
    fn load_parses_and_clamps() {
        let mut store = MemoryStore::new();
        store.set(KEY_ENABLED, "0").unwrap();
        store.set(KEY_VOLUME, "1.700").unwrap();
        let s = SoundSettings::load(&store);
        assert!(!s.enabled());
        assert_eq!(s.volume(), 1.0);

        store.set(KEY_ENABLED, "yes").unwrap();
        store.set(KEY_VOLUME, "NaN").unwrap();
        let s = SoundSettings::load(&store);
        assert!(s.enabled());
        assert_eq!(s.volume(), 1.0);
    }

    #[test]
    fn set_volume_persists_formatted() {
        let mut store = MemoryStore::new();
        let mut s = SoundSettings::default();
        assert!(s.set_volume(&mut store, 0.25, true).unwrap());
        assert_eq!(store.get(KEY_VOLUME).as_deref(), Some("0.250"));
        assert_eq!(store.get(KEY_ENABLED).as_deref(), Some("true"));
        assert_eq!(SoundSettings::load(&store), s);
    }

    #[test]
    fn tiny_changes_are_not_written() {
        let mut store = MemoryStore::new();
        let mut s = SoundSettings::default();
        assert!(!s.set_volume(&mut store, 0.9995, true).unwrap());
        assert!(!s.set_volume(&mut store, f32::NAN, true).unwrap());
        assert!(!s.set_enabled(&mut store, true, true).unwrap());
        assert!(store.is_empty());

        assert!(s.set_volume(&mut store, -3.0, false).unwrap());
        assert_eq!(s.volume(), 0.0);
        assert!(store.is_empty());
    }

    #[test]
    fn mute_zeroes_gain() {
        let mut store = MemoryStore::new();
        let mut s = SoundSettings::default();
        s.set_volume(&mut store, 0.5, false).unwrap();
        assert_eq!(s.apply(0.9), 0.45);
        s.set_enabled(&mut store, false, true).unwrap();
        assert_eq!(s.apply(0.9), 0.0);
        assert_eq!(store.get(KEY_ENABLED).as_deref(), Some("false"));
    }
}
