//! In-memory target machine backing a host-side snapshot load.

use loader_core::{
    HardwareClass, HazardWindow, InterruptMode, Platform, SwitchPort, Trampoline, DEFAULT_BANK,
    PAGE_SIZE, SOUND_REGISTER_COUNT,
};

const BANK_COUNT: usize = 8;
const BANK_5: u8 = 5;
const BANK_2: u8 = 2;

/// Machine state captured by the recording switch port.
///
/// Everything the final context switch would load into hardware registers is
/// recorded here instead, so the CLI can print it and tests can assert on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredState {
    /// Primary register bank, as (AF, BC, DE, HL).
    pub primary: (u16, u16, u16, u16),
    /// Alternate register bank, as (AF', BC', DE', HL').
    pub alternate: (u16, u16, u16, u16),
    /// Index registers, as (IX, IY).
    pub index: (u16, u16),
    /// Interrupt vector register.
    pub i: u8,
    /// Refresh register, compensation already applied.
    pub r: u8,
    /// Stack pointer.
    pub sp: u16,
    /// Border colour.
    pub border: u8,
    /// Interrupt mode.
    pub interrupt_mode: InterruptMode,
    /// Paging-port value applied before the jump.
    pub paging: u8,
    /// Sound-chip registers and selection, for banked snapshots.
    pub sound: Option<([u8; SOUND_REGISTER_COUNT], u8)>,
    /// Final transfer descriptor; present once the load completed.
    pub trampoline: Option<Trampoline>,
}

/// Flat model of the target's RAM banks plus a recording switch port.
///
/// Addresses map the way the real machine wires them: bank 5 behind the
/// screen third of the address space, bank 2 in the middle, and whichever
/// bank is currently selected behind the top window. Writes into the ROM
/// area are dropped.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    banks: Vec<u8>,
    selected: u8,
    holding: Option<(HazardWindow, Vec<u8>)>,
    restored: RestoredState,
    kilobytes_loaded: u16,
    kilobytes_expected: u16,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryImage {
    /// Creates a zero-filled image with the reset-time bank selected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            banks: vec![0; BANK_COUNT * usize::from(PAGE_SIZE)],
            selected: DEFAULT_BANK,
            holding: None,
            restored: RestoredState::default(),
            kilobytes_loaded: 0,
            kilobytes_expected: 0,
        }
    }

    /// Contents of RAM bank `bank` (0-7).
    #[must_use]
    pub fn bank(&self, bank: u8) -> &[u8] {
        let start = usize::from(bank) * usize::from(PAGE_SIZE);
        &self.banks[start..start + usize::from(PAGE_SIZE)]
    }

    fn bank_mut(&mut self, bank: u8, offset: u16) -> &mut u8 {
        let index = usize::from(bank) * usize::from(PAGE_SIZE) + usize::from(offset);
        &mut self.banks[index]
    }

    /// State the context switch recorded.
    #[must_use]
    pub const fn restored(&self) -> &RestoredState {
        &self.restored
    }

    /// Kilobytes decoded so far, as last reported.
    #[must_use]
    pub const fn kilobytes_loaded(&self) -> u16 {
        self.kilobytes_loaded
    }

    /// Kilobytes the snapshot announced.
    #[must_use]
    pub const fn kilobytes_expected(&self) -> u16 {
        self.kilobytes_expected
    }

    /// Serializes the loaded RAM in snapshot-dump order.
    ///
    /// Non-banked hardware yields the three pages in ascending address
    /// order; banked hardware yields all eight banks by bank number.
    #[must_use]
    pub fn ram_dump(&self, hardware: &HardwareClass) -> Vec<u8> {
        match hardware {
            HardwareClass::Spectrum48 => {
                let mut dump = Vec::with_capacity(3 * usize::from(PAGE_SIZE));
                dump.extend_from_slice(self.bank(BANK_5));
                dump.extend_from_slice(self.bank(BANK_2));
                dump.extend_from_slice(self.bank(DEFAULT_BANK));
                dump
            }
            HardwareClass::Spectrum128 { .. } => self.banks.clone(),
        }
    }
}

impl Platform for MemoryImage {
    fn write_byte(&mut self, address: u16, value: u8) {
        let offset = address % PAGE_SIZE;
        match address {
            0x4000..=0x7FFF => *self.bank_mut(BANK_5, offset) = value,
            0x8000..=0xBFFF => *self.bank_mut(BANK_2, offset) = value,
            0xC000..=0xFFFF => {
                let bank = self.selected;
                *self.bank_mut(bank, offset) = value;
            }
            _ => {} // ROM area
        }
    }

    fn select_bank(&mut self, bank: u8) {
        self.selected = bank;
    }

    fn stash_evacuated(&mut self, window: HazardWindow, data: &[u8]) {
        self.holding = Some((window, data.to_vec()));
    }

    fn report_progress(&mut self, kilobytes_loaded: u16, kilobytes_expected: u16) {
        self.kilobytes_loaded = kilobytes_loaded;
        self.kilobytes_expected = kilobytes_expected;
    }
}

impl SwitchPort for MemoryImage {
    fn disable_interrupts(&mut self) {}

    fn configure_paging(&mut self, config: u8) {
        self.restored.paging = config;
        // Bits 0-2 select the bank behind the top window.
        self.selected = config & 0x07;
    }

    fn configure_sound(&mut self, registers: &[u8; SOUND_REGISTER_COUNT], selected: u8) {
        self.restored.sound = Some((*registers, selected));
    }

    fn set_border(&mut self, colour: u8) {
        self.restored.border = colour;
    }

    fn set_interrupt_mode(&mut self, mode: InterruptMode) {
        self.restored.interrupt_mode = mode;
    }

    fn restore_evacuated(&mut self, window: HazardWindow) {
        if let Some((stashed, data)) = self.holding.take() {
            debug_assert_eq!(stashed, window);
            let mut address = window.start;
            for &byte in &data {
                self.write_byte(address, byte);
                address = address.wrapping_add(1);
            }
        }
    }

    fn load_alternate_registers(&mut self, af: u16, bc: u16, de: u16, hl: u16) {
        self.restored.alternate = (af, bc, de, hl);
    }

    fn load_index_registers(&mut self, ix: u16, iy: u16) {
        self.restored.index = (ix, iy);
    }

    fn load_interrupt_vector(&mut self, i: u8) {
        self.restored.i = i;
    }

    fn load_primary_registers(&mut self, af: u16, bc: u16, de: u16, hl: u16) {
        self.restored.primary = (af, bc, de, hl);
    }

    fn load_stack_pointer(&mut self, sp: u16) {
        self.restored.sp = sp;
    }

    fn load_refresh_register(&mut self, r: u8) {
        self.restored.r = r;
    }

    fn transfer(&mut self, trampoline: Trampoline) {
        self.restored.trampoline = Some(trampoline);
    }
}
