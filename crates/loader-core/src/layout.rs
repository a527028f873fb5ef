//! Fixed target-memory layout and snapshot-format constants.

/// Size in bytes of one memory bank/page.
pub const PAGE_SIZE: u16 = 0x4000;

/// Output granularity of the progress hook.
pub const KILOBYTE: u16 = 0x0400;

/// Lowest RAM address; linear version-1 images start loading here.
pub const LOAD_BASE: u16 = 0x4000;

/// Decoded length of a version-1 linear image: all RAM above [`LOAD_BASE`].
pub const LINEAR_IMAGE_LENGTH: u16 = 0xC000;

/// Chunk-length sentinel meaning "one full page, stored uncompressed".
pub const BANK_LENGTH_UNCOMPRESSED: u16 = 0xFFFF;

/// Escape byte introducing a run descriptor in compressed chunk data.
pub const ESCAPE: u8 = 0xED;

/// Lowest valid chunk bank id.
pub const BANK_ID_MIN: u8 = 3;
/// Highest valid chunk bank id.
pub const BANK_ID_MAX: u8 = 10;
/// Subtracted from a chunk bank id to obtain the hardware RAM bank number.
pub const BANK_ID_BASE: u8 = 3;

/// Fixed destination for bank id 8 on non-banked hardware. This range stays
/// mapped regardless of paging state and doubles as evacuation scratch space.
pub const BANK_8_BASE: u16 = 0x4000;
/// Fixed destination for bank id 4 on non-banked hardware.
pub const BANK_4_BASE: u16 = 0x8000;
/// Fixed destination for bank id 5 on non-banked hardware.
pub const BANK_5_BASE: u16 = 0xC000;
/// Destination window for all chunks on banked hardware.
pub const BANKED_WINDOW_BASE: u16 = 0xC000;

/// RAM bank mapped at the switchable window after reset.
pub const DEFAULT_BANK: u8 = 0;

/// First address of the loader's resident code/stack/variable footprint.
pub const RUNTIME_DATA: u16 = 0x5800;
/// Length of the resident footprint; a multiple of [`KILOBYTE`] so the
/// kilobyte-granular progress accounting lines up with the window edges.
pub const RUNTIME_DATA_LENGTH: u16 = 0x0800;

/// Paging-port bit locking further paging writes out.
pub const MEMCFG_LOCK: u8 = 0x20;
/// Paging-port bit selecting the 48K BASIC ROM.
pub const MEMCFG_ROM_48K: u8 = 0x10;

/// Paging-port value applied for snapshots that carry no paging state:
/// 48K ROM, default bank at the switchable window, paging locked.
pub const MEMCFG_48K: u8 = MEMCFG_LOCK | MEMCFG_ROM_48K | DEFAULT_BANK;

/// Control-port value that pages the loader's own ROM out of the address
/// space; written by the trampoline as part of the final transfer.
pub const LOADER_PAGE_OUT: u8 = 0x20;

/// Number of byte-wide sound-chip registers captured in extended headers.
pub const SOUND_REGISTER_COUNT: usize = 16;

/// Returns `true` when `addr` sits on an integral kilobyte boundary.
#[must_use]
pub const fn is_kilobyte_boundary(addr: u16) -> bool {
    addr & (KILOBYTE - 1) == 0
}
