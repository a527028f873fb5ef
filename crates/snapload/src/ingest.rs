//! File-level ingestion driver: runs a whole snapshot through the loader
//! into a [`MemoryImage`], slicing the stream the way a network transport
//! would.

use loader_core::{HardwareClass, HazardWindow, Loader, LoaderError, SnapshotHeader};

use crate::image::MemoryImage;

/// Result of a completed host-side load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The loaded RAM image and recorded context switch.
    pub image: MemoryImage,
    /// Decoded snapshot header.
    pub header: SnapshotHeader,
}

impl LoadOutcome {
    /// Serializes the loaded RAM in snapshot-dump order.
    #[must_use]
    pub fn ram_dump(&self) -> Vec<u8> {
        self.image.ram_dump(&self.header.machine.hardware)
    }

    /// Human-readable description of the restored machine state.
    #[must_use]
    pub fn summary(&self) -> String {
        let restored = self.image.restored();
        let (af, bc, de, hl) = restored.primary;
        let (af_alt, bc_alt, de_alt, hl_alt) = restored.alternate;
        let (ix, iy) = restored.index;
        let pc = restored.trampoline.map_or(0, |t| t.pc);
        let interrupts = restored
            .trampoline
            .is_some_and(|t| t.enable_interrupts);

        let hardware = match self.header.machine.hardware {
            HardwareClass::Spectrum48 => "48K",
            HardwareClass::Spectrum128 { .. } => "128K",
        };

        format!(
            "hardware: {hardware}\n\
             loaded: {} KB\n\
             pc={pc:04X} sp={:04X} i={:02X} r={:02X}\n\
             af={af:04X} bc={bc:04X} de={de:04X} hl={hl:04X}\n\
             af'={af_alt:04X} bc'={bc_alt:04X} de'={de_alt:04X} hl'={hl_alt:04X}\n\
             ix={ix:04X} iy={iy:04X}\n\
             border={} im={:?} interrupts={}\n",
            self.image.kilobytes_loaded(),
            restored.sp,
            restored.i,
            restored.r,
            restored.border,
            restored.interrupt_mode,
            if interrupts { "enabled" } else { "disabled" },
        )
    }
}

/// Feeds `stream` to a fresh loader in `slice`-byte pieces.
///
/// Host-side runs have no resident footprint in target memory, so
/// evacuation is disabled and every byte is written straight through.
///
/// # Errors
///
/// Propagates any [`LoaderError`] from the loader, including
/// [`LoaderError::MalformedStream`] for a file that ends before the
/// snapshot is complete.
pub fn ingest_snapshot(stream: &[u8], slice: usize) -> Result<LoadOutcome, LoaderError> {
    let mut loader = Loader::with_hazard_window(HazardWindow::disabled());
    let mut image = MemoryImage::new();

    for piece in stream.chunks(slice.max(1)) {
        loader.feed(piece, &mut image)?;
        if loader.is_complete() {
            break;
        }
    }
    loader.end_of_stream()?;

    let header = loader
        .snapshot()
        .cloned()
        .ok_or(LoaderError::MalformedStream)?;
    Ok(LoadOutcome { image, header })
}
