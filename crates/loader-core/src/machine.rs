//! Captured machine-state model decoded from a snapshot header.

use crate::layout::{MEMCFG_48K, SOUND_REGISTER_COUNT};

/// Z80 interrupt mode captured in the snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterruptMode {
    /// IM 0: instruction supplied on the data bus.
    Mode0,
    /// IM 1: fixed restart to 0x0038.
    #[default]
    Mode1,
    /// IM 2: vectored through the I register.
    Mode2,
}

impl InterruptMode {
    /// Decodes the low two bits of the header's interrupt-mode byte.
    ///
    /// Mode value 3 is not architecturally defined; the format reference
    /// treats it as mode 2 on the grounds that only bits 0-1 are meaningful.
    #[must_use]
    pub const fn from_header_byte(byte: u8) -> Self {
        match byte & 0x03 {
            0 => Self::Mode0,
            1 => Self::Mode1,
            _ => Self::Mode2,
        }
    }
}

/// Sound-chip register block captured for banked-hardware snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SoundState {
    /// Contents of the sixteen byte-wide sound registers.
    pub registers: [u8; SOUND_REGISTER_COUNT],
    /// Register number last written to the selection port.
    pub selected: u8,
}

/// Hardware class the snapshot was captured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HardwareClass {
    /// Small-memory machine: fixed mapping, no paging or sound state.
    Spectrum48,
    /// Banked-memory machine: paging-port state and sound registers follow.
    Spectrum128 {
        /// Captured value of the memory-paging port.
        port_7ffd: u8,
        /// Captured sound-chip register block.
        sound: SoundState,
    },
}

impl HardwareClass {
    /// Returns `true` for hardware whose chunks require bank switching.
    #[must_use]
    pub const fn is_banked(&self) -> bool {
        matches!(self, Self::Spectrum128 { .. })
    }

    /// Paging-port value to apply during the context switch.
    ///
    /// Non-banked snapshots carry no paging state, but the hardware port
    /// still has to be written to a known configuration before handing off.
    #[must_use]
    pub const fn paging_config(&self) -> u8 {
        match self {
            Self::Spectrum48 => MEMCFG_48K,
            Self::Spectrum128 { port_7ffd, .. } => *port_7ffd,
        }
    }
}

/// Complete CPU and hardware state captured from a snapshot header.
///
/// Produced once per snapshot by the header decoder, immutable afterwards,
/// and consumed exactly once by the context switch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineState {
    /// Accumulator and flags.
    pub af: u16,
    /// BC register pair.
    pub bc: u16,
    /// DE register pair.
    pub de: u16,
    /// HL register pair.
    pub hl: u16,
    /// Alternate accumulator and flags.
    pub af_alt: u16,
    /// Alternate BC register pair.
    pub bc_alt: u16,
    /// Alternate DE register pair.
    pub de_alt: u16,
    /// Alternate HL register pair.
    pub hl_alt: u16,
    /// IX index register.
    pub ix: u16,
    /// IY index register.
    pub iy: u16,
    /// Stack pointer.
    pub sp: u16,
    /// Program counter to resume at.
    pub pc: u16,
    /// Interrupt vector register.
    pub i: u8,
    /// Refresh register, full 8 bits (bit 7 recombined from the header's
    /// flags byte).
    pub r: u8,
    /// Interrupt mode in effect at capture time.
    pub interrupt_mode: InterruptMode,
    /// Interrupt-enable flip-flop.
    pub iff1: bool,
    /// Border colour, 3 bits.
    pub border: u8,
    /// Hardware class and any banked-hardware configuration.
    pub hardware: HardwareClass,
}
