use thiserror::Error;

/// Halt-signal colour displayed for an incompatible snapshot (cyan).
pub const HALT_CODE_INCOMPATIBLE: u8 = 5;
/// Halt-signal colour displayed for a truncated stream (red).
pub const HALT_CODE_MALFORMED: u8 = 2;

/// Fatal error taxonomy for the snapshot ingestion engine.
///
/// Both conditions are unconditionally fatal: by the time either is detected
/// the destination memory may hold a mix of old and new state, and there is
/// no persistent medium to recover into. The outer driver halts the machine
/// with the corresponding [`halt_code`](LoaderError::halt_code) and never
/// re-enters the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LoaderError {
    /// Unrecognized hardware-type value, a bank id outside the valid set, or
    /// a header variant the target hardware cannot represent.
    #[error("incompatible snapshot")]
    IncompatibleSnapshot,
    /// The stream ended (or resumed) at a point the snapshot format does not
    /// allow: early end-of-stream, or data after the context switch.
    #[error("malformed snapshot stream")]
    MalformedStream,
}

impl LoaderError {
    /// Returns the halt-signal colour code shown to the user for this error.
    #[must_use]
    pub const fn halt_code(self) -> u8 {
        match self {
            Self::IncompatibleSnapshot => HALT_CODE_INCOMPATIBLE,
            Self::MalformedStream => HALT_CODE_MALFORMED,
        }
    }
}
