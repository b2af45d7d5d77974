//! SoundFont resource lifecycle management.
//!
//! Manages in-memory soundfont resources identified by opaque integer
//! handles and shared across threads: a device-scoped handle table plus
//! a per-resource state machine governing when sample upload, mapping,
//! preset replacement, and deletion are legal.
//!
//! # Features
//!
//! - **Handle table**: batch create/delete with all-or-nothing
//!   semantics over a sharded concurrent map
//! - **Guarded mutation**: sample buffer and preset list form one
//!   writer-locked unit; busy/mapped state lives in atomics
//! - **Lock-free queries**: preset properties read an atomically
//!   swapped snapshot, never a torn pointer/count pair
//! - **Collaborator contracts**: RAII usage guards for the playback
//!   engine, an id-allocator seam, and an external preset registry
//!
//! Synthesis and playback are out of scope: this crate only owns the
//! resources the engine consumes.
//!
//! # Example
//!
//! ```ignore
//! use soundbank::{PresetRegistry, SampleFormat, SoundFontSystem};
//! use std::sync::Arc;
//!
//! let presets = Arc::new(PresetRegistry::new());
//! let system = SoundFontSystem::new(Arc::clone(&presets));
//!
//! let ids = system.create_soundfonts(1)?;
//! system.set_samples(ids[0], SampleFormat::Short, 4, Some(&[1, 2, 3, 4]))?;
//!
//! let view = system.map_samples(ids[0], 0, 8)?;
//! let bytes = view.to_vec();
//! system.unmap_samples(ids[0])?;
//!
//! system.delete_soundfonts(&ids)?;
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

// Handles and id allocation
pub mod handle;
pub use handle::{IdAllocator, PresetId, SequentialIds, SoundFontId};

// External preset collaborator
pub mod preset;
pub use preset::{Preset, PresetRegistry};

// The resource state machine
pub mod soundfont;
pub use soundfont::{MappedSamples, SampleFormat, SoundFont, SoundFontUse, SAMPLE_SIZE};

// Operation layer / handle table
pub mod system;
pub use system::SoundFontSystem;
