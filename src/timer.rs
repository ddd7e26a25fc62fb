//! Delta-list timer wheel and clock-tick handling (spec.md C8/C9).
//!
//! Each node's `expires` is an offset from its predecessor rather than an
//! absolute deadline, so advancing time is a single decrement at the head
//! (spec.md §4.6) instead of a scan. As with the wait queue, a timer is
//! bound 1:1 to the process it wakes, so its link and `expires` field live
//! in the process arena slot rather than a separately-allocated node --
//! `do_sleep` only ever arms one timer per process at a time.

use crate::list::{LinkStorage, ListHead};

/// Arena access the timer list needs: the embedded link plus the
/// remaining-ticks-from-predecessor field. `Tag` picks out which of an
/// arena's several link fields this timer list uses.
pub trait TimerStorage<P: Copy + Eq, Tag = ()>: LinkStorage<P, Tag> {
    fn expires(&self, id: P) -> u32;
    fn set_expires(&mut self, id: P, ticks: u32);
}

#[derive(Default)]
pub struct TimerList<P, Tag = ()>(ListHead<P, Tag>);

impl<P: Copy + Eq, Tag> TimerList<P, Tag> {
    pub const fn new() -> Self {
        Self(ListHead::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `add_timer`: walks the delta list accumulating offsets; at the first
    /// node whose accumulated expiry exceeds `ticks`, subtracts `ticks`
    /// from that node (so its absolute firing time is unchanged) and
    /// splices the new timer in before it. If none is found, appends at
    /// the tail carrying the residual offset.
    pub fn add_timer<S: TimerStorage<P, Tag>>(&mut self, storage: &mut S, id: P, ticks: u32) {
        storage.set_expires(id, ticks);

        let mut remaining = ticks;
        let mut cursor = self.0.first();
        while let Some(node) = cursor {
            let node_expires = storage.expires(node);
            if node_expires > remaining {
                storage.set_expires(node, node_expires - remaining);
                storage.set_expires(id, remaining);
                self.0.insert_before(storage, node, id);
                return;
            }
            remaining -= node_expires;
            cursor = self.0.next(storage, node);
        }

        storage.set_expires(id, remaining);
        self.0.push_back(storage, id);
    }

    /// `del_timer`: unlinks `id`. If it had a successor, folds `id`'s
    /// remaining offset into the successor so every absolute firing time
    /// after `id` is preserved (spec.md §4.6). A no-op if `id` isn't
    /// currently armed.
    pub fn del_timer<S: TimerStorage<P, Tag>>(&mut self, storage: &mut S, id: P) {
        if !self.contains(storage, id) {
            return;
        }
        let expires = storage.expires(id);
        if let Some(successor) = self.0.next(storage, id) {
            let bumped = storage.expires(successor) + expires;
            storage.set_expires(successor, bumped);
        }
        self.0.remove(storage, id);
    }

    fn contains<S: TimerStorage<P, Tag>>(&self, storage: &S, id: P) -> bool {
        self.0.iter(storage).any(|cur| cur == id)
    }

    /// `run_timer_list`: decrements the head's `expires` by one tick, then
    /// pops and returns every timer whose `expires` has reached zero, in
    /// firing order. The caller (the clock handler) is responsible for
    /// calling `wakeup_proc` on each and then the scheduler policy's
    /// `proc_tick(current)`.
    pub fn tick<S: TimerStorage<P, Tag>>(&mut self, storage: &mut S) -> alloc::vec::Vec<P> {
        let mut fired = alloc::vec::Vec::new();
        let head = match self.0.first() {
            Some(h) => h,
            None => return fired,
        };
        let remaining = storage.expires(head).saturating_sub(1);
        storage.set_expires(head, remaining);

        while let Some(h) = self.0.first() {
            if storage.expires(h) != 0 {
                break;
            }
            self.0.remove(storage, h);
            fired.push(h);
        }
        fired
    }
}
