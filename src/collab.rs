//! External collaborator traits (spec.md §1, §6; expanded in SPEC_FULL §13).
//!
//! VM, the file-descriptor table, ELF loading, and the low-level context
//! switch are all explicitly out of scope for this core -- the spec only
//! enumerates the interfaces it consumes from them. Grouped as one
//! `Collaborators` trait taken as a generic parameter on `Kernel`, the same
//! "generic instead of dyn" choice spec.md §9 makes for the scheduler
//! policy, applied to the whole collaborator boundary rather than a vtable
//! of function pointers the way the original C `sched_class` does it.

use crate::error::KResult;
use crate::irq::IrqControl;

/// A physical page-frame handle. Opaque to the core; only the page
/// allocator collaborator knows how to turn one into a mapped address.
pub type PhysAddr = usize;

pub trait PageAllocator {
    /// Allocates `n` contiguous pages, e.g. for a kernel stack.
    fn alloc_pages(&mut self, n: usize) -> KResult<PhysAddr>;
    fn free_pages(&mut self, addr: PhysAddr, n: usize);
    fn kmalloc(&mut self, size: usize) -> KResult<PhysAddr>;
    fn kfree(&mut self, addr: PhysAddr);
}

/// Opaque address-space descriptor. The core only ever holds a handle to
/// one (`Proc::mm`), refcounted via `pool::RefPool`; it never looks inside.
pub trait AddressSpaceOps {
    type Mm;

    fn mm_create(&mut self) -> KResult<Self::Mm>;
    fn mm_destroy(&mut self, mm: Self::Mm);
    /// Deep-copies `from`'s mappings into a freshly created address space
    /// (the non-`CLONE_VM` fork path), under `mm.sem`.
    fn dup_mmap(&mut self, from: &Self::Mm) -> KResult<Self::Mm>;
    /// Tears down the mappings of an address space reaching refcount 0.
    fn exit_mmap(&mut self, mm: &Self::Mm);
    fn boot_cr3(&self) -> PhysAddr;
    fn lcr3(&mut self, cr3: PhysAddr);
    fn tlb_invalidate_all(&mut self);
}

/// Opaque file-descriptor table descriptor (`Proc::fs`).
pub trait FsTableOps {
    type Fs;

    fn fs_create(&mut self) -> KResult<Self::Fs>;
    fn fs_destroy(&mut self, fs: Self::Fs);
    fn dup_fs(&mut self, from: &Self::Fs) -> KResult<Self::Fs>;
    fn fs_count_inc(&mut self, fs: &Self::Fs);
    /// Returns the new count.
    fn fs_count_dec(&mut self, fs: &Self::Fs) -> i32;
    fn fs_closeall(&mut self, fs: &Self::Fs);
}

/// The two assembly primitives plus kernel-thread dispatch (spec.md §6).
pub trait ContextSwitch {
    type Context;
    type TrapFrame;

    /// A context for `idleproc`, which runs on the boot stack rather than
    /// one `do_fork` set up. `switch_to` treats its `from` argument as an
    /// out-parameter (the assembly saves the live callee-saved registers
    /// into it), so this only needs to be *some* valid storage -- its
    /// contents are overwritten the first time the scheduler switches away
    /// from idle and are never read before that.
    fn idle_context(&mut self) -> Self::Context;

    /// Builds a context whose first dispatch lands in `kernel_thread_entry`
    /// with `fn_ptr`/`arg` as the saved argument registers (spec.md C12).
    fn kernel_thread_context(&mut self, fn_ptr: usize, arg: usize) -> Self::Context;

    /// Builds a context whose first dispatch lands at `forkrets`, which
    /// restores `tf` and returns to user mode.
    fn fork_context(&mut self, tf: &Self::TrapFrame) -> Self::Context;

    /// Copies the parent's trap frame for a child (`do_fork`'s `*tf = *(current->tf)`).
    fn fork_trapframe(&mut self, parent_tf: &Self::TrapFrame) -> Self::TrapFrame;

    /// Overwrites the return-value register so the child observes `fork`
    /// returning `value` (always 0) once `forkrets` resumes it.
    fn set_return_value(&mut self, tf: &mut Self::TrapFrame, value: i32);

    /// Swaps callee-saved registers from `from` to `to`. Returns once this
    /// CPU has been switched back to `from` by some later call.
    fn switch_to(&mut self, from: &mut Self::Context, to: &Self::Context);
}

/// The ELF loader. `load_icode` may only be called with a null
/// `current.mm` (spec.md §7's fatal-condition list). Shares its trap-frame
/// type with `ContextSwitch` rather than declaring its own, since they
/// describe the same on-stack layout.
pub trait ElfLoader: ContextSwitch {
    fn load_icode(&mut self, image: &[u8], argv: &[&[u8]]) -> KResult<Self::TrapFrame>;
}

/// The periodic clock interrupt (spec.md C9).
pub trait ClockHardware {
    /// Reloads the compare register after `run_timer_list` has run.
    fn reload_compare(&mut self);
}

/// Bundles every collaborator the process/scheduler core needs, so
/// `Kernel<C: Collaborators>` only takes one generic parameter. Includes
/// `IrqControl` (spec.md C1) -- interrupt masking is hardware-specific the
/// same way the rest of this bundle is, even though C1's nesting discipline
/// (`irq.rs::CriticalSection`) is core logic, not a collaborator concern.
pub trait Collaborators:
    PageAllocator
    + AddressSpaceOps
    + FsTableOps
    + ElfLoader
    + ContextSwitch
    + ClockHardware
    + IrqControl
{
}

impl<T> Collaborators for T where
    T: PageAllocator
        + AddressSpaceOps
        + FsTableOps
        + ElfLoader
        + ContextSwitch
        + ClockHardware
        + IrqControl
{
}
