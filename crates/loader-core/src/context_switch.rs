//! Final context switch from loader state to the captured machine state.
//!
//! The restoration order is the whole point of this module: the executing
//! processor has only a handful of working registers and no RAM guaranteed
//! free of the image being restored, so every operation is sequenced to
//! never need a register that has already been finalized. The sequence is
//! expressed as ordered calls on [`SwitchPort`]; on real hardware the port's
//! implementation is the pre-assembled trampoline living in always-mapped
//! display memory, and [`SwitchPort::transfer`] does not return.

use crate::evacuation::HazardWindow;
use crate::layout::LOADER_PAGE_OUT;
use crate::machine::{HardwareClass, InterruptMode, MachineState};

/// Filled-in descriptor for the final control-transfer sequence.
///
/// The instruction template that consumes this descriptor is supplied by the
/// target platform's startup layer and must reside in memory that stays
/// mapped after `memory_config` pages the loader out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Trampoline {
    /// Program counter the restored machine resumes at.
    pub pc: u16,
    /// Control-port value that removes the loader from the address space.
    pub memory_config: u8,
    /// Whether to re-enable interrupts immediately before the jump.
    pub enable_interrupts: bool,
}

/// Ordered restoration operations executed by the platform layer.
///
/// [`context_switch`] calls these methods in a fixed order; implementations
/// must not reorder side effects across calls. Everything before
/// [`transfer`](Self::transfer) is idempotent hardware configuration or a
/// plain register load; `transfer` itself diverges on real hardware.
pub trait SwitchPort {
    /// Refresh-register compensation for the cycles the platform's own
    /// restoration sequence consumes. Empirically calibrated per platform
    /// against the trampoline's instruction count; the default assumes a
    /// zero-cost (test) port.
    const REFRESH_COMPENSATION: u8 = 0;

    /// Masks interrupts for the remainder of the restoration.
    fn disable_interrupts(&mut self);

    /// Writes the memory-paging port.
    fn configure_paging(&mut self, config: u8);

    /// Writes all sound-chip registers, leaving `selected` on the selection
    /// port. Only called for banked hardware.
    fn configure_sound(&mut self, registers: &[u8; 16], selected: u8);

    /// Sets the border colour.
    fn set_border(&mut self, colour: u8);

    /// Sets the interrupt mode.
    fn set_interrupt_mode(&mut self, mode: InterruptMode);

    /// Copies the evacuated block back from holding storage to its true
    /// destination addresses. Only called when an evacuation took place.
    fn restore_evacuated(&mut self, window: HazardWindow);

    /// Loads the alternate register bank.
    fn load_alternate_registers(&mut self, af: u16, bc: u16, de: u16, hl: u16);

    /// Loads both index registers.
    fn load_index_registers(&mut self, ix: u16, iy: u16);

    /// Loads the interrupt vector register.
    fn load_interrupt_vector(&mut self, i: u8);

    /// Loads the primary register bank.
    fn load_primary_registers(&mut self, af: u16, bc: u16, de: u16, hl: u16);

    /// Loads the stack pointer.
    fn load_stack_pointer(&mut self, sp: u16);

    /// Loads the refresh register. The value already includes the
    /// platform's compensation offset.
    fn load_refresh_register(&mut self, r: u8);

    /// Executes the trampoline: applies `memory_config`, conditionally
    /// re-enables interrupts, and jumps to the captured program counter.
    /// Diverges on real hardware; test ports record and return.
    fn transfer(&mut self, trampoline: Trampoline);
}

/// Compensates the captured refresh register for the restoration sequence.
///
/// Only the 7-bit counter is adjusted; bit 7 is software-owned and carried
/// through unchanged.
#[must_use]
pub const fn compensated_refresh(r: u8, offset: u8) -> u8 {
    (r.wrapping_add(offset) & 0x7F) | (r & 0x80)
}

/// Reconstructs the captured machine state and hands off control.
///
/// Runs exactly once, on a successful fully-consumed stream; all validation
/// has already happened, so this path is infallible and diagnostic-free.
/// `evacuated` names the hazard window whose contents were parked in holding
/// storage during loading, if any.
pub fn context_switch<P: SwitchPort + ?Sized>(
    machine: &MachineState,
    evacuated: Option<HazardWindow>,
    port: &mut P,
) {
    port.disable_interrupts();

    port.configure_paging(machine.hardware.paging_config());
    if let HardwareClass::Spectrum128 { sound, .. } = &machine.hardware {
        port.configure_sound(&sound.registers, sound.selected);
    }
    port.set_border(machine.border);
    port.set_interrupt_mode(machine.interrupt_mode);

    if let Some(window) = evacuated {
        port.restore_evacuated(window);
    }

    port.load_alternate_registers(
        machine.af_alt,
        machine.bc_alt,
        machine.de_alt,
        machine.hl_alt,
    );
    port.load_index_registers(machine.ix, machine.iy);
    port.load_interrupt_vector(machine.i);

    port.load_primary_registers(machine.af, machine.bc, machine.de, machine.hl);
    port.load_stack_pointer(machine.sp);
    port.load_refresh_register(compensated_refresh(machine.r, P::REFRESH_COMPENSATION));

    port.transfer(Trampoline {
        pc: machine.pc,
        memory_config: LOADER_PAGE_OUT,
        enable_interrupts: machine.iff1,
    });
}

#[cfg(test)]
mod tests {
    use super::{compensated_refresh, context_switch, SwitchPort, Trampoline};
    use crate::evacuation::HazardWindow;
    use crate::layout::{LOADER_PAGE_OUT, MEMCFG_48K};
    use crate::machine::{HardwareClass, InterruptMode, MachineState, SoundState};

    #[derive(Debug, PartialEq, Eq)]
    enum Op {
        Di,
        Paging(u8),
        Sound,
        Border(u8),
        IntMode(InterruptMode),
        RestoreEvacuated(u16, u16),
        Alternate,
        Index,
        Vector(u8),
        Primary,
        Stack(u16),
        Refresh(u8),
        Transfer(Trampoline),
    }

    #[derive(Default)]
    struct RecordingPort {
        ops: Vec<Op>,
    }

    impl SwitchPort for RecordingPort {
        const REFRESH_COMPENSATION: u8 = 0x11;

        fn disable_interrupts(&mut self) {
            self.ops.push(Op::Di);
        }
        fn configure_paging(&mut self, config: u8) {
            self.ops.push(Op::Paging(config));
        }
        fn configure_sound(&mut self, _registers: &[u8; 16], _selected: u8) {
            self.ops.push(Op::Sound);
        }
        fn set_border(&mut self, colour: u8) {
            self.ops.push(Op::Border(colour));
        }
        fn set_interrupt_mode(&mut self, mode: InterruptMode) {
            self.ops.push(Op::IntMode(mode));
        }
        fn restore_evacuated(&mut self, window: HazardWindow) {
            self.ops.push(Op::RestoreEvacuated(window.start, window.len()));
        }
        fn load_alternate_registers(&mut self, _af: u16, _bc: u16, _de: u16, _hl: u16) {
            self.ops.push(Op::Alternate);
        }
        fn load_index_registers(&mut self, _ix: u16, _iy: u16) {
            self.ops.push(Op::Index);
        }
        fn load_interrupt_vector(&mut self, i: u8) {
            self.ops.push(Op::Vector(i));
        }
        fn load_primary_registers(&mut self, _af: u16, _bc: u16, _de: u16, _hl: u16) {
            self.ops.push(Op::Primary);
        }
        fn load_stack_pointer(&mut self, sp: u16) {
            self.ops.push(Op::Stack(sp));
        }
        fn load_refresh_register(&mut self, r: u8) {
            self.ops.push(Op::Refresh(r));
        }
        fn transfer(&mut self, trampoline: Trampoline) {
            self.ops.push(Op::Transfer(trampoline));
        }
    }

    fn sample_state(hardware: HardwareClass) -> MachineState {
        MachineState {
            af: 0x1234,
            bc: 0x1122,
            de: 0x3344,
            hl: 0x5566,
            af_alt: 0xAABB,
            bc_alt: 0xCCDD,
            de_alt: 0xEEFF,
            hl_alt: 0x0011,
            ix: 0x7788,
            iy: 0x99AA,
            sp: 0x8000,
            pc: 0xABCD,
            i: 0x3F,
            r: 0x85,
            interrupt_mode: InterruptMode::Mode2,
            iff1: true,
            border: 0x05,
            hardware,
        }
    }

    #[test]
    fn restoration_order_for_48k_state() {
        let machine = sample_state(HardwareClass::Spectrum48);
        let mut port = RecordingPort::default();

        context_switch(&machine, None, &mut port);

        assert_eq!(
            port.ops,
            vec![
                Op::Di,
                Op::Paging(MEMCFG_48K),
                Op::Border(0x05),
                Op::IntMode(InterruptMode::Mode2),
                Op::Alternate,
                Op::Index,
                Op::Vector(0x3F),
                Op::Primary,
                Op::Stack(0x8000),
                Op::Refresh(compensated_refresh(0x85, 0x11)),
                Op::Transfer(Trampoline {
                    pc: 0xABCD,
                    memory_config: LOADER_PAGE_OUT,
                    enable_interrupts: true,
                }),
            ]
        );
    }

    #[test]
    fn banked_state_applies_sound_before_register_restore() {
        let machine = sample_state(HardwareClass::Spectrum128 {
            port_7ffd: 0x13,
            sound: SoundState::default(),
        });
        let mut port = RecordingPort::default();

        context_switch(&machine, Some(HazardWindow::new(0x5800, 0x6000)), &mut port);

        assert_eq!(port.ops[1], Op::Paging(0x13));
        assert_eq!(port.ops[2], Op::Sound);
        assert_eq!(port.ops[4], Op::IntMode(InterruptMode::Mode2));
        assert_eq!(port.ops[5], Op::RestoreEvacuated(0x5800, 0x0800));
        assert!(matches!(port.ops.last(), Some(Op::Transfer(_))));
    }

    #[test]
    fn refresh_compensation_preserves_bit_7() {
        assert_eq!(compensated_refresh(0x7F, 0x01), 0x00);
        assert_eq!(compensated_refresh(0xFF, 0x01), 0x80);
        assert_eq!(compensated_refresh(0x80, 0x00), 0x80);
        assert_eq!(compensated_refresh(0x05, 0x10), 0x15);
    }
}
