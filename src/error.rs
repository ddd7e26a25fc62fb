//! Error taxonomy for the process/scheduler core (spec.md §7).
//!
//! Every fallible core entry point returns `Result<T, KernelError>`.
//! Fatal conditions (idle/init exiting, double-unlock, ...) are not
//! represented here -- they go through `kpanic!` instead, since the
//! spec treats them as unrecoverable kernel assertions.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The process table is full.
    NoFreeProc,
    /// A page/slab allocation failed (kstack, mm, pgdir, argv buffer).
    NoMem,
    /// A bad argument was supplied (argc out of range, bad user pointer, ...).
    Inval,
    /// An ELF header or program-header invariant was violated.
    InvalElf,
    /// `do_wait` was called on a PID that doesn't exist or isn't a child.
    BadProc,
    /// A blocked process woke up because it had been marked `PF_EXITING`.
    Killed,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::NoFreeProc => "process table full",
            KernelError::NoMem => "out of memory",
            KernelError::Inval => "invalid argument",
            KernelError::InvalElf => "malformed ELF image",
            KernelError::BadProc => "no such child process",
            KernelError::Killed => "killed while blocked",
        };
        f.write_str(msg)
    }
}

pub type KResult<T> = Result<T, KernelError>;
