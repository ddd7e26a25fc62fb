//! Interrupt masking (spec.md C1).
//!
//! Grounded directly on the teacher's `cpu.rs::HeldInterrupts`: a scoped
//! RAII guard that disables interrupts on construction and restores the
//! *previous* state (not unconditionally re-enabling) on drop, so nested
//! critical sections compose correctly. The actual mask/unmask primitive is
//! a collaborator concern (`ClockHardware` doesn't cover it; a real kernel
//! wires this to `cli`/`sti` or the RISC-V `sstatus.SIE` bit) -- this module
//! only owns the nesting discipline, via the `IrqControl` trait below.

/// Low-level interrupt enable/disable, implemented by the boot collaborator.
///
/// Must be callable from any context, including with interrupts already
/// off, and `are_enabled` must reflect the *current* hardware state.
pub trait IrqControl {
    fn are_enabled() -> bool;
    fn disable();
    fn enable();
}

/// A scoped critical section: interrupts are off for as long as this value
/// is alive, restored to whatever they were before on drop.
///
/// Nests correctly: entering a second `CriticalSection` while one is already
/// held just records "interrupts were already off" and does nothing on its
/// own drop, mirroring the teacher's push/pop-style `HeldInterrupts` counter.
pub struct CriticalSection<I: IrqControl> {
    was_enabled: bool,
    _irq: core::marker::PhantomData<I>,
}

impl<I: IrqControl> CriticalSection<I> {
    pub fn enter() -> Self {
        let was_enabled = I::are_enabled();
        I::disable();
        Self {
            was_enabled,
            _irq: core::marker::PhantomData,
        }
    }
}

impl<I: IrqControl> Drop for CriticalSection<I> {
    fn drop(&mut self) {
        if self.was_enabled {
            I::enable();
        }
    }
}
