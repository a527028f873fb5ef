#![no_main]

use loader_core::{
    HazardWindow, InterruptMode, Loader, Platform, SwitchPort, Trampoline,
};
use libfuzzer_sys::fuzz_target;

struct NoopTarget {
    switched: bool,
}

impl Platform for NoopTarget {
    fn write_byte(&mut self, _address: u16, _value: u8) {}
    fn select_bank(&mut self, _bank: u8) {}
    fn stash_evacuated(&mut self, _window: HazardWindow, _data: &[u8]) {}
    fn report_progress(&mut self, _kilobytes_loaded: u16, _kilobytes_expected: u16) {}
}

impl SwitchPort for NoopTarget {
    fn disable_interrupts(&mut self) {}
    fn configure_paging(&mut self, _config: u8) {}
    fn configure_sound(&mut self, _registers: &[u8; 16], _selected: u8) {}
    fn set_border(&mut self, _colour: u8) {}
    fn set_interrupt_mode(&mut self, _mode: InterruptMode) {}
    fn restore_evacuated(&mut self, _window: HazardWindow) {}
    fn load_alternate_registers(&mut self, _af: u16, _bc: u16, _de: u16, _hl: u16) {}
    fn load_index_registers(&mut self, _ix: u16, _iy: u16) {}
    fn load_interrupt_vector(&mut self, _i: u8) {}
    fn load_primary_registers(&mut self, _af: u16, _bc: u16, _de: u16, _hl: u16) {}
    fn load_stack_pointer(&mut self, _sp: u16) {}
    fn load_refresh_register(&mut self, _r: u8) {}
    fn transfer(&mut self, _trampoline: Trampoline) {
        self.switched = true;
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the slicing stride; the rest is the stream.
    let stride = usize::from(data[0] % 64) + 1;
    let stream = &data[1..];

    let mut loader = Loader::new();
    let mut target = NoopTarget { switched: false };

    for piece in stream.chunks(stride) {
        if loader.feed(piece, &mut target).is_err() {
            return;
        }
        if loader.is_complete() {
            break;
        }
    }

    if loader.is_complete() {
        assert!(target.switched);
    } else {
        assert!(loader.end_of_stream().is_err());
    }
});
