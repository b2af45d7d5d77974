//! The soundfont resource and its mutation state machine.
//!
//! A [`SoundFont`] owns a 16-bit sample buffer and a list of preset
//! references. Buffer and preset list form one mutation unit guarded by
//! a single writer lock; `usage_count` and `mapped` are atomics so the
//! busy check a mutator performs is never torn. The preset list is also
//! published through an [`ArcSwap`] snapshot so property reads stay
//! lock-free without ever observing a torn pointer/count pair.
//!
//! State rules:
//! - buffer mutation requires `usage_count == 0 && !mapped`
//! - the `mapped` flag only transitions while `usage_count == 0`,
//!   via compare-and-set
//! - destruction requires `usage_count == 0 && !mapped`, except forced
//!   teardown which skips validation

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::handle::{PresetId, SoundFontId};
use crate::preset::{Preset, PresetRegistry};

/// Bytes per sample in the owned buffer.
pub const SAMPLE_SIZE: usize = core::mem::size_of::<i16>();

/// Sample encodings accepted by sample upload.
///
/// Only [`SampleFormat::Short`] is supported; the other markers exist so
/// callers of the loader path get a proper `InvalidValue` instead of a
/// silent reinterpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit signed PCM (unsupported).
    Byte,
    /// 16-bit signed PCM, the only supported encoding.
    Short,
    /// 32-bit signed PCM (unsupported).
    Int,
    /// 32-bit float PCM (unsupported).
    Float,
}

/// A soundfont resource: sample buffer plus attached preset references.
///
/// Constructed zero-initialized (empty buffer, empty preset list, not in
/// use, not mapped) by the registry's batch create.
pub struct SoundFont {
    id: SoundFontId,
    /// Active consumer count. Owned by the playback collaborator via
    /// [`SoundFontUse`]; increments serialize against `samples`.
    usage_count: AtomicU32,
    mapped: AtomicBool,
    samples: RwLock<Vec<i16>>,
    /// Lock-free mirror of the buffer length, updated under the write
    /// lock, read by property queries.
    num_samples: AtomicUsize,
    /// Installed preset list, swapped as one immutable snapshot.
    presets: ArcSwap<Vec<Arc<Preset>>>,
}

impl SoundFont {
    pub(crate) fn new(id: SoundFontId) -> Self {
        Self {
            id,
            usage_count: AtomicU32::new(0),
            mapped: AtomicBool::new(false),
            samples: RwLock::new(Vec::new()),
            num_samples: AtomicUsize::new(0),
            presets: ArcSwap::new(Arc::new(Vec::new())),
        }
    }

    pub fn id(&self) -> SoundFontId {
        self.id
    }

    /// Current sample count, read without taking the lock.
    pub fn num_samples(&self) -> usize {
        self.num_samples.load(Ordering::Acquire)
    }

    /// Number of active consumers.
    pub fn usage_count(&self) -> u32 {
        self.usage_count.load(Ordering::Acquire)
    }

    /// True while the sample buffer is exposed through a mapping.
    pub fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    /// Number of attached presets (lock-free snapshot read).
    pub fn preset_count(&self) -> usize {
        self.presets.load().len()
    }

    /// Ids of the attached presets, in list order (lock-free snapshot read).
    pub fn preset_ids(&self) -> Vec<PresetId> {
        self.presets.load().iter().map(|p| p.id()).collect()
    }

    /// Deletable right now: no consumers and not mapped.
    pub(crate) fn is_idle(&self) -> bool {
        self.usage_count.load(Ordering::Acquire) == 0 && !self.mapped.load(Ordering::Acquire)
    }

    /// Final deletability check, run under the write lock so it cannot
    /// interleave with an in-flight mutation or serialized usage bump.
    pub(crate) fn try_retire(&self) -> bool {
        let _guard = self.samples.write();
        self.is_idle()
    }

    /// Register a consumer.
    ///
    /// Takes the shared lock around the increment so the busy check a
    /// mutator performs under the write lock can never race with a new
    /// consumer appearing.
    pub(crate) fn begin_use(&self) {
        let _guard = self.samples.read();
        self.usage_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Deregister a consumer. No lock needed: dropping to zero can only
    /// make previously forbidden transitions legal.
    pub(crate) fn end_use(&self) {
        let prev = self.usage_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "usage count underflow");
    }

    /// Replace the sample buffer with `count` samples.
    ///
    /// `data`, when present, must hold exactly `count` samples. When
    /// absent, existing samples are kept in the prefix and any grown
    /// region is zero-filled.
    pub(crate) fn set_samples(
        &self,
        format: SampleFormat,
        count: usize,
        data: Option<&[i16]>,
    ) -> Result<()> {
        if format != SampleFormat::Short {
            return Err(Error::InvalidValue(format!(
                "unsupported sample format {format:?}, only Short is accepted"
            )));
        }
        if count == 0 {
            return Err(Error::InvalidValue("sample count must be > 0".into()));
        }
        if let Some(data) = data {
            if data.len() != count {
                return Err(Error::InvalidValue(format!(
                    "sample data holds {} samples, expected {count}",
                    data.len()
                )));
            }
        }

        let mut samples = self.samples.write();
        if self.usage_count.load(Ordering::Acquire) != 0 {
            return Err(Error::InvalidOperation("soundfont is in use"));
        }
        if self.mapped.load(Ordering::Acquire) {
            return Err(Error::InvalidOperation("soundfont samples are mapped"));
        }

        if count > samples.len() {
            let grow = count - samples.len();
            samples
                .try_reserve_exact(grow)
                .map_err(|_| Error::OutOfMemory)?;
        }
        samples.resize(count, 0);
        if let Some(data) = data {
            samples.copy_from_slice(data);
        }
        self.num_samples.store(count, Ordering::Release);
        Ok(())
    }

    /// Validate a byte range and transition to mapped.
    ///
    /// Bounds: `offset <= total`, `0 < len <= total - offset`, with
    /// `total = num_samples * SAMPLE_SIZE`. Fails while in use; fails
    /// with "already mapped" if the compare-and-set loses.
    ///
    /// Bounds are computed under the shared lock, in one critical
    /// section with the mapped transition: a concurrent resize cannot
    /// land between the check and the flag, and once the flag is set
    /// resizes are rejected, so an established mapping's range stays
    /// in bounds for its whole lifetime.
    pub(crate) fn map_range(&self, offset: usize, len: usize) -> Result<()> {
        let samples = self.samples.read();
        let total = samples.len() * SAMPLE_SIZE;
        if offset > total {
            return Err(Error::InvalidValue(format!(
                "map offset {offset} exceeds buffer size {total}"
            )));
        }
        if len == 0 || len > total - offset {
            return Err(Error::InvalidValue(format!(
                "map length {len} out of range for offset {offset} of {total} bytes"
            )));
        }

        if self.usage_count.load(Ordering::Acquire) != 0 {
            return Err(Error::InvalidOperation("soundfont is in use"));
        }
        self.mapped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::InvalidOperation("samples already mapped"))?;
        Ok(())
    }

    /// Transition out of mapped.
    pub(crate) fn unmap(&self) -> Result<()> {
        self.mapped
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::InvalidOperation("samples are not mapped"))?;
        Ok(())
    }

    /// Replace the preset list.
    ///
    /// Resolution happens with the write lock held; any unknown id fails
    /// the whole call and leaves the installed list untouched. The new
    /// snapshot takes its references before being published, and the old
    /// snapshot's references drop only after the lock is released, so a
    /// listed preset is never transiently under-referenced.
    pub(crate) fn set_presets(&self, ids: &[PresetId], registry: &PresetRegistry) -> Result<()> {
        let guard = self.samples.write();
        if self.usage_count.load(Ordering::Acquire) != 0 {
            return Err(Error::InvalidOperation("soundfont is in use"));
        }

        let mut next = Vec::new();
        next.try_reserve_exact(ids.len())
            .map_err(|_| Error::OutOfMemory)?;
        for id in ids {
            let preset = registry
                .lookup(*id)
                .ok_or_else(|| Error::InvalidValue(format!("no preset with id {id}")))?;
            next.push(preset);
        }

        let old = self.presets.swap(Arc::new(next));
        drop(guard);
        drop(old);
        Ok(())
    }
}

/// Active-consumer guard handed to the playback collaborator.
///
/// While alive, the soundfont counts as busy: sample upload, preset
/// replacement, mapping, and validated deletion all fail. Dropping the
/// guard releases the usage.
pub struct SoundFontUse {
    font: Arc<SoundFont>,
}

impl SoundFontUse {
    pub(crate) fn new(font: Arc<SoundFont>) -> Self {
        font.begin_use();
        Self { font }
    }

    pub fn id(&self) -> SoundFontId {
        self.font.id()
    }
}

impl Drop for SoundFontUse {
    fn drop(&mut self) {
        self.font.end_use();
    }
}

/// View over a mapped byte range of a soundfont's sample buffer.
///
/// Obtained from [`SoundFontSystem::map_samples`]. The view stays safe
/// to use for as long as the mapping is active; dropping it does *not*
/// unmap — unmapping is the explicit
/// [`SoundFontSystem::unmap_samples`] operation, and a second map
/// attempt while one is outstanding fails with `InvalidOperation`.
///
/// [`SoundFontSystem::map_samples`]: crate::system::SoundFontSystem::map_samples
/// [`SoundFontSystem::unmap_samples`]: crate::system::SoundFontSystem::unmap_samples
pub struct MappedSamples {
    font: Arc<SoundFont>,
    offset: usize,
    len: usize,
}

impl fmt::Debug for MappedSamples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedSamples")
            .field("font", &self.font.id())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl MappedSamples {
    pub(crate) fn new(font: Arc<SoundFont>, offset: usize, len: usize) -> Self {
        Self { font, offset, len }
    }

    pub fn id(&self) -> SoundFontId {
        self.font.id()
    }

    /// Byte offset of this view into the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of this view in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the mapped bytes out (native sample endianness).
    pub fn to_vec(&self) -> Vec<u8> {
        let samples = self.font.samples.read();
        let mut out = Vec::with_capacity(self.len);
        // The range may start or end mid-sample.
        for at in self.offset..self.offset + self.len {
            out.push(samples[at / SAMPLE_SIZE].to_ne_bytes()[at % SAMPLE_SIZE]);
        }
        out
    }

    /// Copy bytes into the start of the view. Returns the number of
    /// bytes written (`min(data.len(), self.len())`).
    ///
    /// Writing through the view is legal while mapped; every other
    /// mutation path is rejected by the mapped flag.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut samples = self.font.samples.write();
        let n = data.len().min(self.len);
        for (i, &byte) in data[..n].iter().enumerate() {
            let at = self.offset + i;
            let mut word = samples[at / SAMPLE_SIZE].to_ne_bytes();
            word[at % SAMPLE_SIZE] = byte;
            samples[at / SAMPLE_SIZE] = i16::from_ne_bytes(word);
        }
        n
    }
}
