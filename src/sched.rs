//! Scheduler policy and core (spec.md C6/C7).
//!
//! The run queue is the policy's own state (spec.md's RQ bundles
//! "list of RUNNABLE processes, proc_num, max_time_slice" together), so
//! `RoundRobin` owns a `ListHead` tagged `tags::RunQueue` rather than
//! `Kernel` owning a bare list and the policy operating on it from
//! outside. `SchedPolicy` is the generic seam spec.md §9 asks for in place
//! of the original `sched_class` vtable-of-function-pointers -- only one
//! policy is ever live at a time, so a compile-time generic parameter on
//! `Kernel` is zero-cost where a trait object would pay a vtable indirection
//! on every tick.
//!
//! `wakeup_proc`/`schedule`/`cpu_idle` (C7) live on `Kernel` itself
//! (`kernel.rs`), since they need the current-process pointer and the
//! low-level context switch alongside the run queue.

use crate::list::{LinkStorage, ListHead};
use crate::tags;

/// Arena access the round-robin policy needs: run-queue membership plus
/// the per-process quantum.
pub trait TimeSliceAccess<P: Copy + Eq>: LinkStorage<P, tags::RunQueue> {
    fn time_slice(&self, id: P) -> u32;
    fn set_time_slice(&mut self, id: P, slice: u32);
    fn set_need_resched(&mut self, id: P, flag: bool);
}

/// The pluggable seam standing in for `sched_class`: `enqueue`, `dequeue`,
/// `pick_next`, `proc_tick` over whatever arena `S` provides.
pub trait SchedPolicy<P: Copy + Eq, S: TimeSliceAccess<P>> {
    fn enqueue(&mut self, storage: &mut S, id: P);
    fn dequeue(&mut self, storage: &mut S, id: P);
    fn pick_next(&self, storage: &S) -> Option<P>;
    fn proc_tick(&mut self, storage: &mut S, id: P);
    fn proc_num(&self) -> usize;
}

/// Default policy: round-robin with a fixed quantum (spec.md §4.4).
pub struct RoundRobin<P> {
    rq: ListHead<P, tags::RunQueue>,
    proc_num: usize,
    max_time_slice: u32,
}

impl<P: Copy + Eq> RoundRobin<P> {
    pub const fn new(max_time_slice: u32) -> Self {
        Self {
            rq: ListHead::new(),
            proc_num: 0,
            max_time_slice,
        }
    }
}

impl<P: Copy + Eq, S: TimeSliceAccess<P>> SchedPolicy<P, S> for RoundRobin<P> {
    /// Appends to the tail. A just-expired (or never-set) quantum is
    /// refilled to `max_time_slice` on re-entry.
    fn enqueue(&mut self, storage: &mut S, id: P) {
        let slice = storage.time_slice(id);
        if slice == 0 || slice > self.max_time_slice {
            storage.set_time_slice(id, self.max_time_slice);
        }
        self.rq.push_back(storage, id);
        self.proc_num += 1;
    }

    fn dequeue(&mut self, storage: &mut S, id: P) {
        self.rq.remove(storage, id);
        self.proc_num -= 1;
    }

    /// Peeks the head without unlinking it; the caller (`schedule`) is
    /// responsible for calling `dequeue` on whatever this returns.
    fn pick_next(&self, storage: &S) -> Option<P> {
        let _ = storage;
        self.rq.first()
    }

    /// Decrements `time_slice`; requests a reschedule once it reaches 0.
    fn proc_tick(&mut self, storage: &mut S, id: P) {
        let remaining = storage.time_slice(id).saturating_sub(1);
        storage.set_time_slice(id, remaining);
        if remaining == 0 {
            storage.set_need_resched(id, true);
        }
    }

    fn proc_num(&self) -> usize {
        self.proc_num
    }
}
