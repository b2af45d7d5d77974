//! Operation layer: the device-scoped soundfont table and its batch
//! lifecycle protocols.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::handle::{IdAllocator, PresetId, SequentialIds, SoundFontId};
use crate::preset::PresetRegistry;
use crate::soundfont::{MappedSamples, SampleFormat, SoundFont, SoundFontUse};

/// Soundfont handle table with batch create/delete and per-resource
/// operations.
///
/// The table is the sole owner of each [`SoundFont`] until it is
/// removed; lookups hand out `Arc` clones only as guard backing, never
/// as long-lived ownership. Entries for different handles can be
/// touched concurrently; insert/remove for the same handle serializes
/// on the map's shard lock.
pub struct SoundFontSystem {
    fonts: DashMap<u32, Arc<SoundFont>>,
    presets: Arc<PresetRegistry>,
    ids: Box<dyn IdAllocator>,
}

impl SoundFontSystem {
    /// Create a system over the given preset registry, with sequential
    /// id allocation.
    pub fn new(presets: Arc<PresetRegistry>) -> Self {
        Self::with_allocator(presets, Box::new(SequentialIds::new()))
    }

    /// Create a system with a caller-supplied id allocator.
    pub fn with_allocator(presets: Arc<PresetRegistry>, ids: Box<dyn IdAllocator>) -> Self {
        Self {
            fonts: DashMap::new(),
            presets,
            ids,
        }
    }

    fn font(&self, id: SoundFontId) -> Result<Arc<SoundFont>> {
        self.fonts
            .get(&id.raw())
            .map(|entry| entry.value().clone())
            .ok_or(Error::InvalidName(id.raw()))
    }

    /// Create `n` zero-initialized soundfonts and return their handles.
    ///
    /// All-or-nothing: if the id allocator fails at any point, every
    /// soundfont created by this call is destroyed and its id released
    /// before the error is returned.
    pub fn create_soundfonts(&self, n: usize) -> Result<Vec<SoundFontId>> {
        let mut created = Vec::new();
        created.try_reserve_exact(n).map_err(|_| Error::OutOfMemory)?;

        for _ in 0..n {
            match self.ids.allocate() {
                Ok(raw) => {
                    let id = SoundFontId::new(raw);
                    self.fonts.insert(raw, Arc::new(SoundFont::new(id)));
                    created.push(id);
                }
                Err(err) => {
                    for id in &created {
                        self.fonts.remove(&id.raw());
                        self.ids.release(id.raw());
                    }
                    debug!(requested = n, created = created.len(), "soundfont batch create rolled back");
                    return Err(err);
                }
            }
        }

        debug!(count = n, "created soundfonts");
        Ok(created)
    }

    /// Delete a batch of soundfonts. The 0 sentinel is skipped.
    ///
    /// Two-phase: first every non-zero handle is validated (resolves,
    /// not in use, not mapped) without touching anything — any failure
    /// fails the whole call with no soundfont destroyed. Only then are
    /// the resources removed and dropped. Each removal re-checks
    /// deletability under the resource's write lock, so a soundfont
    /// that became busy or mapped between the phases is left alive and
    /// reported instead of being destroyed.
    pub fn delete_soundfonts(&self, ids: &[SoundFontId]) -> Result<()> {
        for id in ids {
            if id.is_none() {
                continue;
            }
            let font = self.font(*id)?;
            if !font.is_idle() {
                return Err(Error::InvalidOperation("soundfont is in use or mapped"));
            }
        }

        let mut raced = false;
        for id in ids {
            if id.is_none() {
                continue;
            }
            let Some((raw, font)) = self.fonts.remove(&id.raw()) else {
                continue;
            };
            if !font.try_retire() {
                self.fonts.insert(raw, font);
                raced = true;
                continue;
            }
            self.ids.release(raw);
            trace!(id = raw, "destroyed soundfont");
        }
        if raced {
            return Err(Error::InvalidOperation(
                "soundfont became busy during delete",
            ));
        }
        Ok(())
    }

    /// Check whether a handle denotes a live soundfont.
    ///
    /// The 0 sentinel is always valid ("no soundfont" is a legal value
    /// everywhere a handle is accepted).
    pub fn is_soundfont(&self, id: SoundFontId) -> bool {
        id.is_none() || self.fonts.contains_key(&id.raw())
    }

    /// Upload `count` samples to a soundfont.
    ///
    /// `format` must be [`SampleFormat::Short`]. With `data` absent the
    /// buffer is resized in place: the existing prefix is kept and any
    /// grown region is zero-filled.
    pub fn set_samples(
        &self,
        id: SoundFontId,
        format: SampleFormat,
        count: usize,
        data: Option<&[i16]>,
    ) -> Result<()> {
        self.font(id)?.set_samples(format, count, data)
    }

    /// Current sample count of a soundfont.
    pub fn num_samples(&self, id: SoundFontId) -> Result<usize> {
        Ok(self.font(id)?.num_samples())
    }

    /// Map a byte range of a soundfont's sample buffer for direct
    /// access.
    ///
    /// Fails while the soundfont is in use and while another mapping is
    /// outstanding. The returned view stays usable until
    /// [`unmap_samples`](Self::unmap_samples); dropping it does not
    /// unmap.
    pub fn map_samples(
        &self,
        id: SoundFontId,
        offset_bytes: usize,
        len_bytes: usize,
    ) -> Result<MappedSamples> {
        let font = self.font(id)?;
        font.map_range(offset_bytes, len_bytes)?;
        trace!(id = %id, offset = offset_bytes, len = len_bytes, "mapped samples");
        Ok(MappedSamples::new(font, offset_bytes, len_bytes))
    }

    /// End the outstanding mapping of a soundfont.
    pub fn unmap_samples(&self, id: SoundFontId) -> Result<()> {
        self.font(id)?.unmap()
    }

    /// Number of presets attached to a soundfont.
    pub fn preset_count(&self, id: SoundFontId) -> Result<usize> {
        Ok(self.font(id)?.preset_count())
    }

    /// Ids of the presets attached to a soundfont, in list order.
    pub fn preset_ids(&self, id: SoundFontId) -> Result<Vec<PresetId>> {
        Ok(self.font(id)?.preset_ids())
    }

    /// Replace a soundfont's preset list.
    ///
    /// Every id must resolve in the preset registry; any unknown id
    /// fails the whole call and leaves the installed list unchanged.
    pub fn set_presets(&self, id: SoundFontId, preset_ids: &[PresetId]) -> Result<()> {
        self.font(id)?.set_presets(preset_ids, &self.presets)
    }

    /// Register a playback consumer on a soundfont.
    ///
    /// While the returned guard is alive the soundfont counts as busy:
    /// sample upload, preset replacement, mapping, and validated
    /// deletion all fail with `InvalidOperation`.
    pub fn begin_use(&self, id: SoundFontId) -> Result<SoundFontUse> {
        Ok(SoundFontUse::new(self.font(id)?))
    }

    /// Forced teardown: destroy every soundfont unconditionally.
    ///
    /// Skips the usage/mapped validation — the caller (device shutdown)
    /// must guarantee no consumer still holds a mapping or usage guard.
    /// Outstanding `Arc`-backed guards keep their resource's storage
    /// alive until dropped, but its handle is gone immediately.
    pub fn release_all(&self) {
        let raw_ids: Vec<u32> = self.fonts.iter().map(|entry| *entry.key()).collect();
        let count = raw_ids.len();
        for raw in raw_ids {
            if self.fonts.remove(&raw).is_some() {
                self.ids.release(raw);
            }
        }
        debug!(count, "released all soundfonts");
    }

    /// Number of live soundfonts.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Check if no soundfonts are live.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Handles of all live soundfonts (unspecified order).
    pub fn handles(&self) -> Vec<SoundFontId> {
        self.fonts
            .iter()
            .map(|entry| SoundFontId::new(*entry.key()))
            .collect()
    }
}
