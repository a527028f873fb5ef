//! Resumable chunk-decoder state machine primitives.
//!
//! The decoder is driven one state transition at a time by the loader's feed
//! loop. Every state either consumes input from the caller-supplied
//! [`Cursor`], produces decompressed output, or transitions; when the cursor
//! runs dry the loader returns to its caller with the current
//! [`DecoderState`] saved, and the next slice resumes exactly where the
//! previous one stopped.

/// Borrowed view over one slice of newly received stream bytes.
///
/// The decoder never reads past the end of the slice; unconsumed bytes stay
/// available through [`Cursor::remaining`] for the caller.
#[derive(Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Wraps a received slice for consumption.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Consumes and returns the next byte, if one is available.
    pub const fn take(&mut self) -> Option<u8> {
        if self.pos < self.data.len() {
            let byte = self.data[self.pos];
            self.pos += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Number of bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` once the slice is fully consumed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.pos
    }
}

/// Tagged decoder state, saved across `feed` calls.
///
/// The chunk grammar is `AwaitingChunkLength → AwaitingChunkLength2 →
/// AwaitingBankId → {CopyingLiteral | CopyingCompressed}`; compressed copying
/// detours through the escape/run states and every state falls back to
/// `AwaitingChunkLength` when the chunk's byte budget reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecoderState {
    /// Accumulating the snapshot header.
    #[default]
    AwaitingHeader,
    /// Expecting the low byte of a chunk length.
    AwaitingChunkLength,
    /// Expecting the high byte of a chunk length.
    AwaitingChunkLength2 {
        /// Low length byte received in the previous state.
        lo: u8,
    },
    /// Expecting the bank id of the chunk just announced.
    AwaitingBankId,
    /// Copying bytes through without decompression.
    CopyingLiteral,
    /// Copying bytes with escape/run-length expansion.
    CopyingCompressed,
    /// One escape byte seen; the next byte decides literal or run.
    EscapeSeen,
    /// Doubled escape seen; expecting the repeat count.
    AwaitingRepCount,
    /// Expecting the value byte of a run descriptor.
    AwaitingRepValue {
        /// Repeat count received in the previous state.
        count: u8,
    },
    /// Expanding a run descriptor; consumes no input.
    Repeating {
        /// Repetitions still to write.
        remaining: u8,
        /// Byte value being repeated.
        value: u8,
    },
    /// Terminal: the snapshot is fully loaded and control was handed off.
    Complete,
}

impl DecoderState {
    /// Returns `true` once the decoder has reached its terminal state.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}
