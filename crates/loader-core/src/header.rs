//! Snapshot header accumulation and decoding.
//!
//! The header arrives as part of the same byte stream as the image data and
//! may straddle any number of received slices, so it is accumulated byte by
//! byte. The format is self-describing but only after enough bytes are in:
//! a non-zero program counter in the base header marks the short version-1
//! layout, a zero one means an extended header whose length follows.

use crate::fault::LoaderError;
use crate::layout::SOUND_REGISTER_COUNT;
use crate::machine::{HardwareClass, InterruptMode, MachineState, SoundState};

/// Length of the base header common to every format version.
pub const BASE_HEADER_LENGTH: usize = 30;

/// Extended-header length announcing the version-2 layout; any other value
/// is taken as version 3.
pub const V2_EXTENSION_LENGTH: u16 = 23;

/// Bytes of header actually inspected; extension bytes past the sound
/// registers are consumed but ignored.
const HEADER_CAPACITY: usize = 55;

const OFFSET_EXTENSION_PC: usize = 32;
const OFFSET_HARDWARE_TYPE: usize = 34;
const OFFSET_PAGING_PORT: usize = 35;
const OFFSET_HARDWARE_MOD: usize = 37;
const OFFSET_SOUND_SELECTED: usize = 38;
const OFFSET_SOUND_REGISTERS: usize = 39;

const FLAG_R_BIT_7: u8 = 0x01;
const FLAG_SAMROM: u8 = 0x10;
const FLAG_COMPRESSED: u8 = 0x20;

/// Layout of the image data that follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BodyFormat {
    /// Version 1: one linear image starting at the bottom of RAM.
    Linear {
        /// Whether the image uses run-length compression.
        compressed: bool,
    },
    /// Extended versions: a sequence of length-prefixed banked chunks.
    Chunked,
}

/// Fully decoded snapshot header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SnapshotHeader {
    /// Captured machine state to restore on completion.
    pub machine: MachineState,
    /// Layout of the data that follows.
    pub body: BodyFormat,
    /// Total decoded output expected, in kilobytes; reaching it completes
    /// the load.
    pub expected_kilobytes: u16,
}

/// Byte-at-a-time header accumulator.
///
/// Fed from the stream until it announces a decoded header; tolerates
/// slices as small as a single byte.
#[derive(Debug)]
pub struct HeaderAccumulator {
    buf: [u8; HEADER_CAPACITY],
    len: usize,
    total: Option<usize>,
}

impl Default for HeaderAccumulator {
    fn default() -> Self {
        Self {
            buf: [0; HEADER_CAPACITY],
            len: 0,
            total: None,
        }
    }
}

impl HeaderAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs one stream byte.
    ///
    /// Returns the decoded header once the final header byte has been
    /// absorbed, `None` while more bytes are needed.
    ///
    /// # Errors
    ///
    /// [`LoaderError::IncompatibleSnapshot`] for headers the target cannot
    /// represent: a set SAMROM flag, or an unsupported hardware type.
    pub fn push(&mut self, byte: u8) -> Result<Option<SnapshotHeader>, LoaderError> {
        if self.len < HEADER_CAPACITY {
            self.buf[self.len] = byte;
        }
        self.len += 1;

        if self.total.is_none() {
            if self.len == BASE_HEADER_LENGTH && self.base_pc() != 0 {
                self.total = Some(BASE_HEADER_LENGTH);
            } else if self.len == BASE_HEADER_LENGTH + 2 {
                let extension = self.word_at(BASE_HEADER_LENGTH);
                self.total = Some(BASE_HEADER_LENGTH + 2 + usize::from(extension));
            }
        }

        match self.total {
            Some(total) if self.len == total => self.decode().map(Some),
            _ => Ok(None),
        }
    }

    const fn word_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.buf[offset], self.buf[offset + 1]])
    }

    const fn base_pc(&self) -> u16 {
        self.word_at(6)
    }

    fn decode(&self) -> Result<SnapshotHeader, LoaderError> {
        let flags = self.buf[12];
        if flags & FLAG_SAMROM != 0 {
            return Err(LoaderError::IncompatibleSnapshot);
        }

        let extended = self.base_pc() == 0;
        let (pc, hardware, body, expected_kilobytes) = if extended {
            let (hardware, expected) = self.decode_hardware()?;
            (
                self.word_at(OFFSET_EXTENSION_PC),
                hardware,
                BodyFormat::Chunked,
                expected,
            )
        } else {
            (
                self.base_pc(),
                HardwareClass::Spectrum48,
                BodyFormat::Linear {
                    compressed: flags & FLAG_COMPRESSED != 0,
                },
                48,
            )
        };

        let machine = MachineState {
            af: u16::from(self.buf[0]) << 8 | u16::from(self.buf[1]),
            bc: self.word_at(2),
            hl: self.word_at(4),
            sp: self.word_at(8),
            i: self.buf[10],
            r: (self.buf[11] & 0x7F) | ((flags & FLAG_R_BIT_7) << 7),
            de: self.word_at(13),
            bc_alt: self.word_at(15),
            de_alt: self.word_at(17),
            hl_alt: self.word_at(19),
            af_alt: u16::from(self.buf[21]) << 8 | u16::from(self.buf[22]),
            iy: self.word_at(23),
            ix: self.word_at(25),
            iff1: self.buf[27] != 0,
            interrupt_mode: InterruptMode::from_header_byte(self.buf[29]),
            border: (flags >> 1) & 0x07,
            pc,
            hardware,
        };

        Ok(SnapshotHeader {
            machine,
            body,
            expected_kilobytes,
        })
    }

    fn decode_hardware(&self) -> Result<(HardwareClass, u16), LoaderError> {
        let extension = self.word_at(BASE_HEADER_LENGTH);
        let hardware_type = self.buf[OFFSET_HARDWARE_TYPE];
        let version_2 = extension == V2_EXTENSION_LENGTH;

        match (hardware_type, version_2) {
            (0, _) => {
                // Bit 7 of the modification byte downgrades to a 16K machine.
                let small = self.buf[OFFSET_HARDWARE_MOD] & 0x80 != 0;
                Ok((HardwareClass::Spectrum48, if small { 16 } else { 48 }))
            }
            (3, true) | (4, false) => {
                let mut registers = [0; SOUND_REGISTER_COUNT];
                registers.copy_from_slice(
                    &self.buf[OFFSET_SOUND_REGISTERS..OFFSET_SOUND_REGISTERS + SOUND_REGISTER_COUNT],
                );
                Ok((
                    HardwareClass::Spectrum128 {
                        port_7ffd: self.buf[OFFSET_PAGING_PORT],
                        sound: SoundState {
                            registers,
                            selected: self.buf[OFFSET_SOUND_SELECTED],
                        },
                    },
                    128,
                ))
            }
            _ => Err(LoaderError::IncompatibleSnapshot),
        }
    }
}
