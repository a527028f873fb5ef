//! Core snapshot ingestion engine for the network snapshot loader.

/// Fixed target-memory layout and snapshot-format constants.
pub mod layout;
pub use layout::{
    is_kilobyte_boundary, BANKED_WINDOW_BASE, BANK_4_BASE, BANK_5_BASE, BANK_8_BASE, BANK_ID_BASE,
    BANK_ID_MAX, BANK_ID_MIN, BANK_LENGTH_UNCOMPRESSED, DEFAULT_BANK, ESCAPE, KILOBYTE,
    LINEAR_IMAGE_LENGTH, LOADER_PAGE_OUT, LOAD_BASE, MEMCFG_48K, MEMCFG_LOCK, MEMCFG_ROM_48K,
    PAGE_SIZE, RUNTIME_DATA, RUNTIME_DATA_LENGTH, SOUND_REGISTER_COUNT,
};

/// Fatal error taxonomy and halt-signal colour codes.
pub mod fault;
pub use fault::{LoaderError, HALT_CODE_INCOMPATIBLE, HALT_CODE_MALFORMED};

/// Captured machine-state model.
pub mod machine;
pub use machine::{HardwareClass, InterruptMode, MachineState, SoundState};

/// Snapshot header accumulation and decoding.
pub mod header;
pub use header::{
    BodyFormat, HeaderAccumulator, SnapshotHeader, BASE_HEADER_LENGTH, V2_EXTENSION_LENGTH,
};

/// Resumable chunk-decoder state machine primitives.
pub mod decoder;
pub use decoder::{Cursor, DecoderState};

/// Hazard-window evacuation of the loader's resident footprint.
pub mod evacuation;
pub use evacuation::{EvacuationGuard, HazardWindow};

/// Target-platform abstraction.
pub mod platform;
pub use platform::Platform;

/// Final context switch to the captured machine state.
pub mod context_switch;
pub use context_switch::{compensated_refresh, context_switch, SwitchPort, Trampoline};

/// Snapshot ingestion driver.
pub mod loader;
pub use loader::Loader;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
