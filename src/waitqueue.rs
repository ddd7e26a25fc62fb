//! FIFO wait queue (spec.md C4).
//!
//! A waiter is just a blocked process plus the flag that will be reported
//! back to it on wake (`wait_current_set` in spec.md §4.3) -- rather than
//! allocate a separate waiter node, this reuses the embedded-link idiom of
//! `list.rs`: the blocked process's own arena slot carries the link *and*
//! the pending wakeup flag, the same way the teacher's `Proc` carries
//! `run_link` inline instead of boxing a queue node. `Kernel` (the process
//! arena) implements `WaiterAccess` once, and every wait queue in the
//! kernel -- the semaphore queue, `WT_CHILD`, whatever else blocks on a
//! channel -- is just a `WaitQueue<ProcId>` over that same arena.

use crate::list::{LinkStorage, ListHead};

/// Arena access needed to enqueue/dequeue a process on a wait queue: the
/// list link (from `list.rs`) plus the reported-flag slot. `Tag` picks out
/// which of an arena's several link fields this particular queue uses.
pub trait WaiterAccess<P: Copy + Eq, Tag = ()>: LinkStorage<P, Tag> {
    fn wakeup_flag(&self, id: P) -> u32;
    fn set_wakeup_flag(&mut self, id: P, flag: u32);
}

/// FIFO of blocked processes. First to block is first to wake
/// (spec.md §4.3: "Ordering: FIFO").
pub struct WaitQueue<P, Tag = ()>(ListHead<P, Tag>);

impl<P: Copy + Eq, Tag> Default for WaitQueue<P, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Eq, Tag> WaitQueue<P, Tag> {
    pub const fn new() -> Self {
        Self(ListHead::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<P> {
        self.0.first()
    }

    pub fn last(&self) -> Option<P> {
        self.0.last()
    }

    pub fn next<S: WaiterAccess<P, Tag>>(&self, storage: &S, id: P) -> Option<P> {
        self.0.next(storage, id)
    }

    pub fn iter<'a, S: WaiterAccess<P, Tag>>(
        &self,
        storage: &'a S,
    ) -> crate::list::Iter<'a, P, Tag, S> {
        self.0.iter(storage)
    }

    /// `true` if `id` is currently linked into this queue. Membership isn't
    /// tracked separately, so this is a linear scan -- fine at the queue
    /// depths a single-CPU teaching kernel ever reaches.
    pub fn contains<S: WaiterAccess<P, Tag>>(&self, storage: &S, id: P) -> bool {
        self.iter(storage).any(|cur| cur == id)
    }

    /// `wait_current_set`: binds `id` to `reason` and enqueues it. The
    /// caller is responsible for having already set the process's `state`
    /// to `SLEEPING` and `wait_state` to `reason` (spec.md §4.3) --
    /// this only owns queue membership and the reported flag.
    pub fn enqueue<S: WaiterAccess<P, Tag>>(&mut self, storage: &mut S, id: P, reason: u32) {
        storage.set_wakeup_flag(id, reason);
        self.0.push_back(storage, id);
    }

    /// Unlinks `id` if it is still present; a no-op otherwise (the
    /// semaphore `down` path re-checks presence after resuming from
    /// `schedule()`, since a concurrent wake may have already removed it).
    pub fn remove<S: WaiterAccess<P, Tag>>(&mut self, storage: &mut S, id: P) {
        if self.contains(storage, id) {
            self.0.remove(storage, id);
        }
    }

    /// Dequeues the first waiter and reports `flag` to it (`wakeup_first`).
    pub fn wakeup_first<S: WaiterAccess<P, Tag>>(
        &mut self,
        storage: &mut S,
        flag: u32,
    ) -> Option<P> {
        let id = self.0.pop_front(storage)?;
        storage.set_wakeup_flag(id, flag);
        Some(id)
    }

    /// Drains the whole queue, reporting `flag` to every waiter
    /// (`wakeup_queue`). Returns the woken ids in wake order (FIFO).
    pub fn wakeup_all<S: WaiterAccess<P, Tag>>(
        &mut self,
        storage: &mut S,
        flag: u32,
    ) -> alloc::vec::Vec<P> {
        let mut woken = alloc::vec::Vec::new();
        while let Some(id) = self.wakeup_first(storage, flag) {
            woken.push(id);
        }
        woken
    }
}
