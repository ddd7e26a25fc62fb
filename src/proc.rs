//! Process representation (spec.md §3) and the per-slot state the rest of
//! the core hangs its embedded links off of.
//!
//! `ProcId` is the arena index spec.md's design note (§9) asks for in place
//! of the original `parent`/`cptr`/`yptr`/`optr` raw pointers: every tree
//! and membership link below is an `Option<ProcId>` rather than a pointer,
//! which is what lets `Kernel` hold the whole process table as a flat
//! array with no unsafe aliasing.

use crate::collab::ContextSwitch;
use crate::list::ListLink;
use crate::param::PROC_NAME_LEN;
use crate::pool::Handle;
use bitflags::bitflags;

/// Index into `Kernel`'s process table. Distinct from the PID: `ProcId` is
/// a stable slot, while the PID is the user-visible, wrapping-and-reused
/// identifier `get_pid` hands out.
pub type ProcId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Uninit,
    Runnable,
    Sleeping,
    Zombie,
}

bitflags! {
    /// `wait_state` bits (spec.md §3): *why* a process is sleeping.
    pub struct WaitState: u32 {
        const WT_CHILD = 1 << 0;
        const WT_TIMER = 1 << 1;
        const WT_INTERRUPTED = 1 << 2;
    }
}

bitflags! {
    /// `flags` bits (spec.md §3).
    pub struct ProcFlags: u32 {
        const PF_EXITING = 1 << 0;
    }
}

bitflags! {
    /// `clone_flags` accepted by `do_fork` (spec.md §4.7).
    pub struct CloneFlags: u32 {
        /// Share the parent's address space instead of deep-copying it.
        const CLONE_VM = 1 << 0;
        /// Share the parent's file-descriptor table instead of duplicating it.
        const CLONE_FS = 1 << 1;
    }
}

/// One process or kernel thread. Generic over the collaborator set so it
/// can hold the collaborator's own context/trap-frame types inline, the
/// same way the teacher's `Proc` embeds a concrete `TrapFrame`/`Context`
/// rather than boxing them.
pub struct Proc<C: ContextSwitch> {
    pub state: ProcState,
    pub pid: i32,
    pub wait_state: WaitState,
    pub flags: ProcFlags,
    pub need_resched: bool,
    pub runs: u64,
    pub time_slice: u32,
    pub exit_code: i32,

    pub kstack: Option<usize>,
    pub tf: Option<C::TrapFrame>,
    pub context: Option<C::Context>,
    pub cr3: usize,

    pub mm: Option<Handle>,
    pub fs: Option<Handle>,

    pub name: [u8; PROC_NAME_LEN],

    // Tree links (spec.md §3 "Tree links").
    pub parent: Option<ProcId>,
    pub cptr: Option<ProcId>,
    pub yptr: Option<ProcId>,
    pub optr: Option<ProcId>,

    // Membership links (spec.md §3 "Membership links").
    pub list_link: ListLink<ProcId>,
    pub hash_link: ListLink<ProcId>,
    pub run_link: ListLink<ProcId>,

    /// Backs both the semaphore wait queue link and the `expires`/timer
    /// link -- a process is never on both at once, so they're kept as
    /// distinct tagged fields rather than a shared union.
    pub sem_link: ListLink<ProcId>,
    pub wakeup_flag: u32,

    pub timer_link: ListLink<ProcId>,
    pub timer_expires: u32,
}

impl<C: ContextSwitch> Proc<C> {
    /// `alloc_proc`: a zeroed record, `state=UNINIT`, `pid=-1`, all list
    /// links empty, no PID yet (spec.md §4.7). `cr3` is filled in by the
    /// caller from `AddressSpaceOps::boot_cr3` once a collaborator handle
    /// is available.
    pub fn new() -> Self {
        Self {
            state: ProcState::Uninit,
            pid: -1,
            wait_state: WaitState::empty(),
            flags: ProcFlags::empty(),
            need_resched: false,
            runs: 0,
            time_slice: 0,
            exit_code: 0,
            kstack: None,
            tf: None,
            context: None,
            cr3: 0,
            mm: None,
            fs: None,
            name: [0; PROC_NAME_LEN],
            parent: None,
            cptr: None,
            yptr: None,
            optr: None,
            list_link: ListLink::new(),
            hash_link: ListLink::new(),
            run_link: ListLink::new(),
            sem_link: ListLink::new(),
            wakeup_flag: 0,
            timer_link: ListLink::new(),
            timer_expires: 0,
        }
    }

    pub fn set_name(&mut self, name: &[u8]) {
        self.name = [0; PROC_NAME_LEN];
        let n = name.len().min(PROC_NAME_LEN - 1);
        self.name[..n].copy_from_slice(&name[..n]);
    }
}

impl<C: ContextSwitch> Default for Proc<C> {
    fn default() -> Self {
        Self::new()
    }
}
