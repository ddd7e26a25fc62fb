//! Process lifecycle and preemptive round-robin scheduling core for a
//! teaching kernel.
//!
//! This crate is the hardest part of the kernel it was pulled out of: the
//! process table, the PID allocator, fork/exit/wait/kill/yield/sleep/execve,
//! the round-robin scheduler, the timer delta list, and the wait-queue and
//! semaphore primitives the rest of the kernel blocks and wakes on. Device
//! drivers, the virtual-memory manager, the file system, the ELF loader, and
//! the trap-frame/context-switch layer are all external collaborators --
//! this crate only defines the traits it needs from them (`collab`) and
//! takes a concrete implementation as the generic parameter `C` on
//! [`kernel::Kernel`].
//!
//! `#![no_std]` outside of `cargo test`: the host test binary links `std` so
//! the scheduler/timer/process logic can be exercised without hardware,
//! matching `hadron-core`'s `#![cfg_attr(not(test), no_std)]` idiom (the
//! teacher itself has no equivalent, since it only ever builds for the
//! target).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod atomic;
pub mod collab;
pub mod error;
#[macro_use]
pub mod klog;
pub mod irq;
pub mod kernel;
pub mod list;
pub mod param;
pub mod pool;
pub mod proc;
pub mod sched;
pub mod semaphore;
pub mod tags;
pub mod timer;
pub mod waitqueue;

pub use collab::Collaborators;
pub use error::{KResult, KernelError};
pub use kernel::Kernel;
pub use proc::{CloneFlags, Proc, ProcFlags, ProcId, ProcState, WaitState};

#[cfg(test)]
mod tests;
