//! Snapshot ingestion driver.
//!
//! [`Loader::feed`] consumes stream payloads slice by slice, in whatever
//! sizes the transport delivers them, and drives the header accumulator and
//! the chunk decoder. All state lives in the `Loader` value, so a dry slice
//! simply returns and the next one resumes mid-header, mid-chunk, or even
//! mid-escape-sequence. When the final kilobyte of decoded output lands the
//! loader performs the context switch from inside `feed`; on real hardware
//! that call never returns.

use crate::context_switch::context_switch;
use crate::decoder::{Cursor, DecoderState};
use crate::evacuation::{EvacuationGuard, HazardWindow};
use crate::fault::LoaderError;
use crate::header::{BodyFormat, HeaderAccumulator, SnapshotHeader};
use crate::layout::{
    is_kilobyte_boundary, BANKED_WINDOW_BASE, BANK_4_BASE, BANK_5_BASE, BANK_8_BASE, BANK_ID_BASE,
    BANK_ID_MAX, BANK_ID_MIN, BANK_LENGTH_UNCOMPRESSED, ESCAPE, LINEAR_IMAGE_LENGTH, LOAD_BASE,
    PAGE_SIZE,
};
use crate::platform::Platform;

/// Resumable snapshot-stream loader.
///
/// Create one per snapshot, feed it every payload in arrival order, and call
/// [`end_of_stream`](Self::end_of_stream) when the transport closes. Errors
/// are fatal: once `feed` returns `Err` the target memory is in an undefined
/// mixed state and the loader must not be fed again.
#[derive(Debug)]
pub struct Loader {
    state: DecoderState,
    header: HeaderAccumulator,
    snapshot: Option<SnapshotHeader>,
    guard: EvacuationGuard,
    dest: u16,
    chunk_remaining: u16,
    chunk_compressed: bool,
    kilobytes_loaded: u16,
    kilobytes_expected: u16,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// Creates a loader that evacuates the standard resident footprint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hazard_window(HazardWindow::runtime_data())
    }

    /// Creates a loader with a caller-chosen hazard window.
    ///
    /// [`HazardWindow::disabled`] turns evacuation off entirely, which is
    /// the right choice for host-side reference runs where no loader
    /// footprint occupies target memory.
    #[must_use]
    pub fn with_hazard_window(window: HazardWindow) -> Self {
        Self {
            state: DecoderState::AwaitingHeader,
            header: HeaderAccumulator::new(),
            snapshot: None,
            guard: EvacuationGuard::new(window),
            dest: 0,
            chunk_remaining: 0,
            chunk_compressed: false,
            kilobytes_loaded: 0,
            kilobytes_expected: 0,
        }
    }

    /// Re-arms the loader for a fresh transfer.
    ///
    /// Discards all decoder, header, progress, and evacuation state and
    /// returns to awaiting a snapshot header, as after construction. The
    /// hazard window is kept: it describes the platform, not the transfer.
    pub fn expect_snapshot(&mut self) {
        self.state = DecoderState::AwaitingHeader;
        self.header = HeaderAccumulator::new();
        self.snapshot = None;
        self.guard.reset();
        self.dest = 0;
        self.chunk_remaining = 0;
        self.chunk_compressed = false;
        self.kilobytes_loaded = 0;
        self.kilobytes_expected = 0;
    }

    /// Current decoder state.
    #[must_use]
    pub const fn state(&self) -> DecoderState {
        self.state
    }

    /// Kilobytes of decoded output produced so far.
    #[must_use]
    pub const fn kilobytes_loaded(&self) -> u16 {
        self.kilobytes_loaded
    }

    /// Returns `true` once the snapshot is fully loaded and control has
    /// been handed off.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Decoded header, available once the header stage has finished.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&SnapshotHeader> {
        self.snapshot.as_ref()
    }

    /// Consumes one received payload slice.
    ///
    /// Completion is signalled from inside this call: when the expected
    /// kilobyte count is reached the loader flushes any staged evacuation
    /// data and invokes the context switch on `platform` before returning.
    /// Payload bytes after the completing byte are ignored.
    ///
    /// # Errors
    ///
    /// [`LoaderError::IncompatibleSnapshot`] for header or bank-id values
    /// the target cannot represent; [`LoaderError::MalformedStream`] when
    /// fed again after completion. Both are fatal.
    pub fn feed<P: Platform + ?Sized>(
        &mut self,
        payload: &[u8],
        platform: &mut P,
    ) -> Result<(), LoaderError> {
        if self.state.is_complete() {
            return Err(LoaderError::MalformedStream);
        }

        let mut cursor = Cursor::new(payload);
        loop {
            if let DecoderState::Repeating { remaining, value } = self.state {
                for _ in 0..remaining {
                    if self.write_decoded(value, platform) {
                        return Ok(());
                    }
                }
                self.state = self.chunk_copy_state();
                continue;
            }

            let Some(byte) = cursor.take() else {
                return Ok(());
            };
            self.step(byte, platform)?;
            if self.state.is_complete() {
                return Ok(());
            }
        }
    }

    /// Notification that the transport has closed.
    ///
    /// # Errors
    ///
    /// [`LoaderError::MalformedStream`] if the stream ended before the
    /// expected amount of decoded output was produced.
    pub fn end_of_stream(&self) -> Result<(), LoaderError> {
        if self.state.is_complete() {
            Ok(())
        } else {
            Err(LoaderError::MalformedStream)
        }
    }

    fn step<P: Platform + ?Sized>(
        &mut self,
        byte: u8,
        platform: &mut P,
    ) -> Result<(), LoaderError> {
        match self.state {
            DecoderState::AwaitingHeader => {
                if let Some(header) = self.header.push(byte)? {
                    self.begin_body(header, platform);
                }
            }
            DecoderState::AwaitingChunkLength => {
                self.state = DecoderState::AwaitingChunkLength2 { lo: byte };
            }
            DecoderState::AwaitingChunkLength2 { lo } => {
                let length = u16::from_le_bytes([lo, byte]);
                if length == BANK_LENGTH_UNCOMPRESSED {
                    self.chunk_remaining = PAGE_SIZE;
                    self.chunk_compressed = false;
                } else {
                    self.chunk_remaining = length;
                    self.chunk_compressed = true;
                }
                self.state = DecoderState::AwaitingBankId;
            }
            DecoderState::AwaitingBankId => {
                self.dest = self.chunk_destination(byte, platform)?;
                self.state = self.chunk_copy_state();
            }
            DecoderState::CopyingLiteral => {
                self.consume_chunk_byte();
                if !self.write_decoded(byte, platform) {
                    self.state = self.chunk_copy_state();
                }
            }
            DecoderState::CopyingCompressed => {
                self.consume_chunk_byte();
                if byte == ESCAPE {
                    self.state = DecoderState::EscapeSeen;
                } else if !self.write_decoded(byte, platform) {
                    self.state = self.chunk_copy_state();
                }
            }
            DecoderState::EscapeSeen => {
                self.consume_chunk_byte();
                if byte == ESCAPE {
                    self.state = DecoderState::AwaitingRepCount;
                } else {
                    // False alarm: the escape byte was ordinary data.
                    if self.write_decoded(ESCAPE, platform) || self.write_decoded(byte, platform) {
                        return Ok(());
                    }
                    self.state = self.chunk_copy_state();
                }
            }
            DecoderState::AwaitingRepCount => {
                self.consume_chunk_byte();
                self.state = DecoderState::AwaitingRepValue { count: byte };
            }
            DecoderState::AwaitingRepValue { count } => {
                self.consume_chunk_byte();
                self.state = DecoderState::Repeating {
                    remaining: count,
                    value: byte,
                };
            }
            DecoderState::Repeating { .. } | DecoderState::Complete => {
                // Both are handled before `step` is reached.
            }
        }
        Ok(())
    }

    fn begin_body<P: Platform + ?Sized>(&mut self, header: SnapshotHeader, platform: &mut P) {
        self.kilobytes_expected = header.expected_kilobytes;
        platform.report_progress(0, self.kilobytes_expected);

        match header.body {
            BodyFormat::Linear { compressed } => {
                self.dest = LOAD_BASE;
                self.chunk_remaining = LINEAR_IMAGE_LENGTH;
                self.chunk_compressed = compressed;
                self.state = if compressed {
                    DecoderState::CopyingCompressed
                } else {
                    DecoderState::CopyingLiteral
                };
            }
            BodyFormat::Chunked => {
                self.state = DecoderState::AwaitingChunkLength;
            }
        }
        self.snapshot = Some(header);
    }

    fn chunk_destination<P: Platform + ?Sized>(
        &mut self,
        bank_id: u8,
        platform: &mut P,
    ) -> Result<u16, LoaderError> {
        if !(BANK_ID_MIN..=BANK_ID_MAX).contains(&bank_id) {
            return Err(LoaderError::IncompatibleSnapshot);
        }

        let banked = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.machine.hardware.is_banked());
        if banked {
            platform.select_bank(bank_id - BANK_ID_BASE);
            return Ok(BANKED_WINDOW_BASE);
        }

        match bank_id {
            4 => Ok(BANK_4_BASE),
            5 => Ok(BANK_5_BASE),
            8 => Ok(BANK_8_BASE),
            _ => Err(LoaderError::IncompatibleSnapshot),
        }
    }

    /// Copy state matching the current chunk, or the inter-chunk state once
    /// the chunk's encoded-byte budget is spent.
    const fn chunk_copy_state(&self) -> DecoderState {
        if self.chunk_remaining == 0 {
            DecoderState::AwaitingChunkLength
        } else if self.chunk_compressed {
            DecoderState::CopyingCompressed
        } else {
            DecoderState::CopyingLiteral
        }
    }

    /// Spends one byte of the chunk's encoded budget. Wraps rather than
    /// saturates so an escape sequence straddling a chunk boundary in a
    /// damaged stream cannot stall the decoder.
    const fn consume_chunk_byte(&mut self) {
        self.chunk_remaining = self.chunk_remaining.wrapping_sub(1);
    }

    /// Emits one decoded byte and advances all accounting. Returns `true`
    /// when this byte completed the load, in which case the context switch
    /// has already run.
    fn write_decoded<P: Platform + ?Sized>(&mut self, value: u8, platform: &mut P) -> bool {
        self.guard.write(self.dest, value, platform);
        self.dest = self.dest.wrapping_add(1);

        if is_kilobyte_boundary(self.dest) {
            self.kilobytes_loaded += 1;
            platform.report_progress(self.kilobytes_loaded, self.kilobytes_expected);
            if self.kilobytes_loaded == self.kilobytes_expected {
                self.complete(platform);
                return true;
            }
        }
        false
    }

    fn complete<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        self.guard.flush(platform);
        if let Some(snapshot) = &self.snapshot {
            context_switch(&snapshot.machine, self.guard.stashed_window(), platform);
        }
        self.state = DecoderState::Complete;
    }
}
