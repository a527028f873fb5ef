//! Target-platform abstraction the loader drives while ingesting a stream.

use crate::context_switch::SwitchPort;
use crate::evacuation::HazardWindow;

/// Services the loader requires from the machine it is loading into.
///
/// One implementation per target: the firmware build backs these with port
/// writes and controller SRAM transfers, host-side tools back them with an
/// in-memory image. The context-switch half lives in the [`SwitchPort`]
/// supertrait because a completed load hands control off from inside the
/// feed path rather than returning first.
pub trait Platform: SwitchPort {
    /// Writes one decoded byte to target memory.
    ///
    /// `address` is a target address; on banked hardware it falls inside
    /// the switchable window for all chunk data and the implementation
    /// resolves it against the currently selected bank.
    fn write_byte(&mut self, address: u16, value: u8);

    /// Maps RAM bank `bank` (0-7) at the switchable window.
    ///
    /// Only called for banked snapshots, once per chunk, before any of the
    /// chunk's data bytes are written.
    fn select_bank(&mut self, bank: u8);

    /// Parks the diverted hazard-window contents in holding storage.
    ///
    /// Called at most once per load, when the write position leaves the
    /// hazard window. The data stays parked until
    /// [`SwitchPort::restore_evacuated`] copies it back during the final
    /// context switch.
    fn stash_evacuated(&mut self, window: HazardWindow, data: &[u8]);

    /// Progress hook, invoked once at the start of loading with zero
    /// kilobytes loaded and again after each further kilobyte of decoded
    /// output.
    fn report_progress(&mut self, kilobytes_loaded: u16, kilobytes_expected: u16);
}
