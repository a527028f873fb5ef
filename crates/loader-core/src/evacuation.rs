//! Hazard-window evacuation for the loader's resident footprint.
//!
//! The loader's own code, stack, and variables occupy a block of target RAM
//! that the incoming snapshot also wants. Bytes destined for that block are
//! diverted into a staging buffer instead of being written through; when the
//! write position leaves the block the staged bytes are parked in holding
//! storage in a single transfer, and the context switch copies them to
//! their true addresses after the loader no longer needs its footprint.

use crate::layout::{RUNTIME_DATA, RUNTIME_DATA_LENGTH};
use crate::platform::Platform;

/// Half-open target-address range `[start, end)` requiring evacuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HazardWindow {
    /// First address inside the window.
    pub start: u16,
    /// First address past the window.
    pub end: u16,
}

impl HazardWindow {
    /// Builds a window from its half-open bounds.
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// The loader's standard resident footprint.
    #[must_use]
    pub const fn runtime_data() -> Self {
        Self::new(RUNTIME_DATA, RUNTIME_DATA + RUNTIME_DATA_LENGTH)
    }

    /// An empty window; every write passes straight through.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Returns `true` when `address` falls inside the window.
    #[must_use]
    pub const fn contains(&self, address: u16) -> bool {
        self.start <= address && address < self.end
    }

    /// Window length in bytes.
    #[must_use]
    pub const fn len(&self) -> u16 {
        self.end - self.start
    }

    /// Returns `true` for a zero-length window.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvacuationState {
    /// Write position has not yet entered the window.
    Idle,
    /// Inside the window; writes go to the staging buffer.
    Diverting,
}

/// Write-path guard that diverts hazard-window bytes into a staging buffer.
///
/// Only writes on non-banked hardware pass through the guard with a live
/// window; banked loads and host-side reference runs use a disabled window
/// and the guard degenerates to plain write-through.
#[derive(Debug)]
pub struct EvacuationGuard {
    window: HazardWindow,
    staging: Box<[u8]>,
    state: EvacuationState,
    stashed: bool,
}

impl EvacuationGuard {
    /// Creates a guard over `window`, with staging space sized to match.
    #[must_use]
    pub fn new(window: HazardWindow) -> Self {
        Self {
            window,
            staging: vec![0; usize::from(window.len())].into_boxed_slice(),
            state: EvacuationState::Idle,
            stashed: false,
        }
    }

    /// Routes one decoded byte: staged if `address` is inside the hazard
    /// window, written through otherwise. The first write-through at or past
    /// the window's end flushes the staged block to holding storage.
    pub fn write<P: Platform + ?Sized>(&mut self, address: u16, value: u8, platform: &mut P) {
        if self.window.contains(address) {
            if let Some(slot) = self.staging.get_mut(usize::from(address - self.window.start)) {
                *slot = value;
            }
            self.state = EvacuationState::Diverting;
            return;
        }
        if self.state == EvacuationState::Diverting && address >= self.window.end {
            self.flush(platform);
        }
        platform.write_byte(address, value);
    }

    /// Parks the staged block in holding storage and leaves diversion mode.
    ///
    /// Idempotent per load; also called directly when a stream ends with the
    /// write position still inside the window.
    pub fn flush<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        if self.state == EvacuationState::Diverting {
            platform.stash_evacuated(self.window, &self.staging);
            self.state = EvacuationState::Idle;
            self.stashed = true;
        }
    }

    /// Clears diversion state and staged contents ahead of a new load.
    /// The window itself is a property of the platform and stays put.
    pub fn reset(&mut self) {
        self.staging.fill(0);
        self.state = EvacuationState::Idle;
        self.stashed = false;
    }

    /// The window whose contents were parked, if a flush has happened.
    ///
    /// Feeds the context switch's decision to issue a restore.
    #[must_use]
    pub const fn stashed_window(&self) -> Option<HazardWindow> {
        if self.stashed {
            Some(self.window)
        } else {
            None
        }
    }
}
