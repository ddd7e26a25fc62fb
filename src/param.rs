//! Compile-time tunables for the process/scheduler core.
//!
//! Mirrors the teacher's `param.rs`: these are `const`s, not a runtime
//! config file -- a kernel picks its limits at build time.

/// Upper bound (exclusive) on PID values. PIDs live in `[1, MAX_PID)`.
pub const MAX_PID: i32 = 1 << 15;

/// Maximum number of live processes the table can hold.
pub const MAX_PROCESS: usize = 128;

static_assertions::const_assert!(MAX_PID as usize > MAX_PROCESS);

/// `2^HASH_SHIFT` buckets in the PID hash table.
pub const HASH_SHIFT: u32 = 7;

/// Number of pages backing a kernel stack.
pub const KSTACKPAGE: usize = 2;

/// Page size in bytes, as seen by the page allocator collaborator.
pub const PGSIZE: usize = 4096;

/// Size in bytes of a kernel stack (`KSTACKPAGE * PGSIZE`).
pub const KSTACKSIZE: usize = KSTACKPAGE * PGSIZE;

/// Maximum length of a process name, including the nul terminator.
pub const PROC_NAME_LEN: usize = 16;

/// Maximum number of `argv` entries accepted by `do_execve`.
pub const EXEC_MAX_ARG_NUM: usize = 16;

/// Maximum length of a single `do_execve` argument, including the nul terminator.
pub const EXEC_MAX_ARG_LEN: usize = 1024;

/// Default round-robin quantum, in ticks.
pub const MAX_TIME_SLICE: u32 = 5;

/// Clock ticks between hardware timer interrupts (collaborator-defined unit).
pub const TIMER0_INTERVAL: u32 = 10_000;
