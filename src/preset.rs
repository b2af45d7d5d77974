//! Preset registry: externally owned instrument definitions.
//!
//! Presets live in their own registry with their own lifecycle. A
//! soundfont only *references* presets; each listing holds an
//! `Arc<Preset>` clone, so the Arc strong count is the preset's
//! reference count and a listed preset outlives its listing.

use std::sync::Arc;

use dashmap::DashMap;

use crate::handle::PresetId;

/// An instrument definition referenced by soundfonts.
#[derive(Debug)]
pub struct Preset {
    id: PresetId,
    bank: u16,
    program: u16,
}

impl Preset {
    pub fn new(id: PresetId, bank: u16, program: u16) -> Self {
        Self { id, bank, program }
    }

    pub fn id(&self) -> PresetId {
        self.id
    }

    /// MIDI bank number.
    pub fn bank(&self) -> u16 {
        self.bank
    }

    /// MIDI program number.
    pub fn program(&self) -> u16 {
        self.program
    }
}

/// Registry of presets, independent of any soundfont's lifetime.
pub struct PresetRegistry {
    presets: DashMap<u32, Arc<Preset>>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self {
            presets: DashMap::new(),
        }
    }

    /// Insert a preset, keyed by its id. Returns the shared handle to it.
    ///
    /// A preset with the same id is replaced; soundfonts that already
    /// list the old preset keep it alive until they drop their listing.
    pub fn insert(&self, preset: Preset) -> Arc<Preset> {
        let preset = Arc::new(preset);
        self.presets.insert(preset.id().raw(), Arc::clone(&preset));
        preset
    }

    /// Remove a preset from the registry.
    ///
    /// Listings held by soundfonts stay valid; only new lookups fail.
    pub fn remove(&self, id: PresetId) -> Option<Arc<Preset>> {
        self.presets.remove(&id.raw()).map(|(_, preset)| preset)
    }

    /// Resolve a preset id. The 0 sentinel never resolves.
    pub fn lookup(&self, id: PresetId) -> Option<Arc<Preset>> {
        self.presets.get(&id.raw()).map(|entry| entry.value().clone())
    }

    /// Number of registered presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Check if no presets are registered.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
