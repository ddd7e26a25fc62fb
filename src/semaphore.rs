//! Counting semaphore built on the wait queue (spec.md C5).
//!
//! The `down` protocol is spelled out exactly in spec.md §4.3: try the fast
//! path under the critical section, and if it fails, block via the wait
//! queue and `schedule()`, then on resume distinguish "woken because
//! granted" from "woken because killed" by checking the reported flag. This
//! module doesn't own a critical-section gate, a `current` pointer, or a
//! run queue itself -- those are `Kernel`'s job (spec.md: "C4/C5 sit between
//! C11 and C7") -- it only needs the seam `Blocking<P>` describes.

use crate::error::{KResult, KernelError};
use crate::waitqueue::{WaiterAccess, WaitQueue};

/// `WT_INTERRUPTED`, reported while a process is parked on a semaphore.
pub const WT_INTERRUPTED: u32 = 1 << 0;
/// Reported to a waiter that was granted the semaphore by `up`.
pub const SEM_GRANTED: u32 = 1 << 1;

/// Everything `Semaphore::down`/`up` needs from the kernel around it: a
/// critical section, the current process, and the ability to actually move
/// a woken process back onto the run queue.
pub trait Blocking<P: Copy + Eq, Tag = ()>: WaiterAccess<P, Tag> {
    type CriticalSection;

    fn current(&self) -> P;
    fn enter_critical(&mut self) -> Self::CriticalSection;
    fn leave_critical(&mut self, guard: Self::CriticalSection);

    /// Marks `id` `SLEEPING` with the given `wait_state` reason and
    /// enqueues it on `queue` (spec.md's `wait_current_set`).
    fn block_on(&mut self, queue: &mut WaitQueue<P, Tag>, id: P, reason: u32);

    /// `wakeup_proc`: makes `id` runnable again (spec.md §4.5). Called
    /// with the critical section already held.
    fn wakeup_proc(&mut self, id: P);

    /// Gives up the CPU. Must only be called with the critical section
    /// released (spec.md §4.7: "Suspension always happens between a
    /// critical-section leave and the call to schedule").
    fn schedule(&mut self);
}

pub struct Semaphore<P, Tag = ()> {
    value: i32,
    queue: WaitQueue<P, Tag>,
}

impl<P: Copy + Eq, Tag> Semaphore<P, Tag> {
    pub const fn new(value: i32) -> Self {
        Self {
            value,
            queue: WaitQueue::new(),
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    /// `down`: blocks until the semaphore is available, or returns
    /// `Err(KernelError::Killed)` if the wait was cut short by `do_kill`.
    pub fn down<K: Blocking<P, Tag>>(&mut self, kernel: &mut K) -> KResult<()> {
        let guard = kernel.enter_critical();
        if self.value > 0 {
            self.value -= 1;
            kernel.leave_critical(guard);
            return Ok(());
        }

        let me = kernel.current();
        kernel.block_on(&mut self.queue, me, WT_INTERRUPTED);
        kernel.leave_critical(guard);

        kernel.schedule();

        let guard = kernel.enter_critical();
        self.queue.remove(kernel, me);
        let flag = kernel.wakeup_flag(me);
        kernel.leave_critical(guard);

        if flag != SEM_GRANTED {
            Err(KernelError::Killed)
        } else {
            Ok(())
        }
    }

    /// `up`: releases the semaphore, handing it directly to the oldest
    /// waiter if one exists rather than just incrementing `value` and
    /// letting it race for the fast path.
    pub fn up<K: Blocking<P, Tag>>(&mut self, kernel: &mut K) {
        let guard = kernel.enter_critical();
        self.value += 1;
        if let Some(woken) = self.queue.wakeup_first(kernel, SEM_GRANTED) {
            self.value -= 1;
            kernel.wakeup_proc(woken);
        }
        kernel.leave_critical(guard);
    }

    /// Non-blocking acquire attempt; never parks the caller.
    pub fn try_down<K: Blocking<P, Tag>>(&mut self, kernel: &mut K) -> bool {
        let guard = kernel.enter_critical();
        let acquired = if self.value > 0 {
            self.value -= 1;
            true
        } else {
            false
        };
        kernel.leave_critical(guard);
        acquired
    }
}
