//! The process table, PID allocator, and process lifecycle (spec.md
//! C10/C11/C12), tied together with the scheduler core (C7) into one
//! `Kernel<C: Collaborators>` context -- spec.md §9's "Global mutable
//! state" note offers this or a single initialized-once global guarded by
//! the interrupt gate; an explicit context is the one that doesn't need
//! `unsafe` to set up, so that's what this crate ships.
//!
//! A handful of methods below take the scheduler's run queue or the timer
//! list out of `self` with `core::mem::replace` before operating on them.
//! `Kernel` itself implements the `LinkStorage` family those structures
//! need, so calling e.g. `self.sched.enqueue(self, id)` directly would
//! borrow `self.sched` and `self` at once; swapping the field out for the
//! duration of the call sidesteps that without `unsafe`.

use crate::collab::{Collaborators, PhysAddr};
use crate::error::{KResult, KernelError};
use crate::irq::CriticalSection;
use crate::list::{LinkStorage, ListHead, ListLink};
use crate::param;
use crate::pool::RefPool;
use crate::proc::{CloneFlags, Proc, ProcFlags, ProcId, ProcState, WaitState};
use crate::sched::{RoundRobin, SchedPolicy, TimeSliceAccess};
use crate::semaphore::{Blocking, Semaphore};
use crate::tags;
use crate::timer::{TimerList, TimerStorage};
use crate::waitqueue::{WaitQueue, WaiterAccess};
use alloc::vec::Vec;
use array_macro::array;

const HASH_BUCKETS: usize = 1 << (param::HASH_SHIFT as usize);

fn pid_hashfn(pid: i32) -> usize {
    (pid as usize) & (HASH_BUCKETS - 1)
}

/// A convenience alias for a semaphore over this kernel's process arena.
pub type ProcSemaphore = Semaphore<ProcId, tags::SemWait>;

pub struct Kernel<C: Collaborators> {
    pub collab: C,

    procs: [Proc<C>; param::MAX_PROCESS],
    global_list: ListHead<ProcId, tags::GlobalList>,
    hash_buckets: [ListHead<ProcId, tags::HashBucket>; HASH_BUCKETS],
    sched: RoundRobin<ProcId>,
    timers: TimerList<ProcId, tags::TimerWheel>,

    mm_pool: RefPool<<C as crate::collab::AddressSpaceOps>::Mm, { param::MAX_PROCESS }>,
    fs_pool: RefPool<<C as crate::collab::FsTableOps>::Fs, { param::MAX_PROCESS }>,

    current: ProcId,
    idleproc: ProcId,
    initproc: ProcId,
    nr_process: usize,
    ticks: u64,

    last_pid: i32,
    next_safe: i32,
}

impl<C: Collaborators> Kernel<C> {
    pub fn new(collab: C) -> Self {
        Self {
            collab,
            procs: array![_ => Proc::new(); param::MAX_PROCESS],
            global_list: ListHead::new(),
            hash_buckets: array![_ => ListHead::new(); HASH_BUCKETS],
            sched: RoundRobin::new(param::MAX_TIME_SLICE),
            timers: TimerList::new(),
            mm_pool: RefPool::new(),
            fs_pool: RefPool::new(),
            current: 0,
            idleproc: 0,
            initproc: 0,
            nr_process: 0,
            ticks: 0,
            last_pid: 0,
            next_safe: param::MAX_PID,
        }
    }

    pub fn current(&self) -> ProcId {
        self.current
    }

    pub fn proc(&self, id: ProcId) -> &Proc<C> {
        &self.procs[id]
    }

    pub fn proc_mut(&mut self, id: ProcId) -> &mut Proc<C> {
        &mut self.procs[id]
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn nr_process(&self) -> usize {
        self.nr_process
    }

    // ---- C1: critical sections ------------------------------------------

    pub fn enter_critical(&mut self) -> CriticalSection<C> {
        CriticalSection::enter()
    }

    pub fn leave_critical(&mut self, guard: CriticalSection<C>) {
        drop(guard);
    }

    // ---- field-swap helpers, see the module note above ------------------

    fn with_sched<R>(&mut self, f: impl FnOnce(&mut Self, &mut RoundRobin<ProcId>) -> R) -> R {
        let mut sched = core::mem::replace(&mut self.sched, RoundRobin::new(0));
        let result = f(self, &mut sched);
        self.sched = sched;
        result
    }

    fn with_timers<R>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut TimerList<ProcId, tags::TimerWheel>) -> R,
    ) -> R {
        let mut timers = core::mem::replace(&mut self.timers, TimerList::new());
        let result = f(self, &mut timers);
        self.timers = timers;
        result
    }

    fn with_global_list<R>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut ListHead<ProcId, tags::GlobalList>) -> R,
    ) -> R {
        let mut list = self.global_list;
        let result = f(self, &mut list);
        self.global_list = list;
        result
    }

    fn with_hash_bucket<R>(
        &mut self,
        bucket: usize,
        f: impl FnOnce(&mut Self, &mut ListHead<ProcId, tags::HashBucket>) -> R,
    ) -> R {
        let mut list = self.hash_buckets[bucket];
        let result = f(self, &mut list);
        self.hash_buckets[bucket] = list;
        result
    }

    // ---- C10: PID allocation ---------------------------------------------

    /// `get_pid`, implementing the corrected rescan (SPEC_FULL §12):
    /// `next_safe` shrinks to the smallest live PID strictly above
    /// `last_pid`, not a fixed `MAX_PID`, so a colliding `last_pid` is
    /// always retried rather than ever handed out twice.
    fn get_pid(&mut self) -> i32 {
        loop {
            self.last_pid += 1;
            if self.last_pid >= param::MAX_PID {
                self.last_pid = 1;
            }
            if self.last_pid < self.next_safe {
                return self.last_pid;
            }

            let live_pids: Vec<i32> = self
                .global_list
                .iter(self)
                .map(|id| self.procs[id].pid)
                .collect();

            let mut next_safe = param::MAX_PID;
            let mut collides = false;
            for pid in &live_pids {
                if *pid == self.last_pid {
                    collides = true;
                } else if *pid > self.last_pid && *pid < next_safe {
                    next_safe = *pid;
                }
            }
            self.next_safe = next_safe;
            if !collides {
                return self.last_pid;
            }
        }
    }

    /// `find_proc(pid)`: O(1) hash lookup.
    pub fn find_proc(&self, pid: i32) -> Option<ProcId> {
        let bucket = &self.hash_buckets[pid_hashfn(pid)];
        bucket.iter(self).find(|&id| self.procs[id].pid == pid)
    }

    fn alloc_slot(&mut self) -> KResult<ProcId> {
        self.procs
            .iter()
            .position(|p| p.state == ProcState::Uninit)
            .ok_or(KernelError::NoFreeProc)
    }

    // ---- C7: scheduler core -----------------------------------------------

    /// `wakeup_proc`: makes `p` runnable. A no-op (with a warning) if `p`
    /// is already `RUNNABLE` -- spec.md's open question preserves this
    /// quirk deliberately, so duplicate wakes stay idempotent.
    pub fn wakeup_proc(&mut self, id: ProcId) {
        assert_ne!(
            self.procs[id].state,
            ProcState::Zombie,
            "wakeup_proc on a zombie process"
        );
        let guard = self.enter_critical();
        self.wakeup_proc_locked(id);
        self.leave_critical(guard);
    }

    /// `wakeup_proc`'s body, callable when the critical section is already
    /// held (the tick handler and `do_exit` run entirely inside one).
    fn wakeup_proc_locked(&mut self, id: ProcId) {
        if self.procs[id].state != ProcState::Runnable {
            self.procs[id].state = ProcState::Runnable;
            self.procs[id].wait_state = WaitState::empty();
            if id != self.current {
                self.with_sched(|k, sched| sched.enqueue(k, id));
            }
        } else {
            kwarn!("wakeup_proc: {} already runnable", self.procs[id].pid);
        }
    }

    /// `schedule()` (spec.md §4.5). `idleproc` is permanently `RUNNABLE` but
    /// is excluded from the re-enqueue in step 2 -- spec.md §4.4 is explicit
    /// that idle is never on the run queue; it's only ever dispatched via
    /// the `pick_next` fallback below.
    pub fn schedule(&mut self) {
        let guard = self.enter_critical();
        self.procs[self.current].need_resched = false;

        if self.procs[self.current].state == ProcState::Runnable && self.current != self.idleproc
        {
            let current = self.current;
            self.with_sched(|k, sched| sched.enqueue(k, current));
        }

        let picked = self.sched.pick_next(self);
        let next = match picked {
            Some(id) => {
                self.with_sched(|k, sched| sched.dequeue(k, id));
                id
            }
            None => self.idleproc,
        };

        self.procs[next].runs += 1;
        if next != self.current {
            let prev = self.current;
            self.current = next;
            let (from_ctx, to_ctx) = Self::two_contexts_mut(&mut self.procs, prev, next);
            let to_ctx = to_ctx
                .as_ref()
                .expect("schedule: dispatch target has no context");
            let from_ctx = from_ctx
                .as_mut()
                .expect("schedule: current has no context");
            self.collab.switch_to(from_ctx, to_ctx);
        }
        self.leave_critical(guard);
    }

    /// Borrows two distinct process slots' `context` fields mutably at
    /// once. Takes `procs` directly (rather than `&mut self`) so the
    /// borrow doesn't extend to `self.collab`, which `schedule` also needs
    /// mutably for the actual switch. `a != b` is the caller's
    /// responsibility (always true here: `next != self.current` is
    /// checked before calling this).
    fn two_contexts_mut(
        procs: &mut [Proc<C>; param::MAX_PROCESS],
        a: ProcId,
        b: ProcId,
    ) -> (&mut Option<C::Context>, &mut Option<C::Context>) {
        assert_ne!(a, b);
        if a < b {
            let (left, right) = procs.split_at_mut(b);
            (&mut left[a].context, &mut right[0].context)
        } else {
            let (left, right) = procs.split_at_mut(a);
            (&mut right[0].context, &mut left[b].context)
        }
    }

    /// `cpu_idle()`: the body of `idleproc`.
    pub fn cpu_idle(&mut self) -> ! {
        loop {
            if self.procs[self.idleproc].need_resched {
                self.schedule();
            }
        }
    }

    // ---- C8/C9: timers ------------------------------------------------------

    pub fn add_timer(&mut self, id: ProcId, ticks: u32) {
        let guard = self.enter_critical();
        self.with_timers(|k, timers| timers.add_timer(k, id, ticks));
        self.leave_critical(guard);
    }

    pub fn del_timer(&mut self, id: ProcId) {
        let guard = self.enter_critical();
        self.with_timers(|k, timers| timers.del_timer(k, id));
        self.leave_critical(guard);
    }

    /// `run_timer_list()`: called from the clock tick. Fires every timer
    /// that has reached zero, then runs the policy's `proc_tick` for the
    /// current process and reloads the hardware compare register.
    pub fn run_timer_list(&mut self) {
        let guard = self.enter_critical();
        self.ticks += 1;
        let fired = self.with_timers(|k, timers| timers.tick(k));
        for id in fired {
            let wait_state = self.procs[id].wait_state;
            if wait_state.is_empty() {
                kwarn!("timer fired for {} with wait_state=0", self.procs[id].pid);
            }
            self.procs[id].wait_state |= WaitState::WT_INTERRUPTED;
            self.wakeup_proc_locked(id);
        }
        let current = self.current;
        self.with_sched(|k, sched| sched.proc_tick(k, current));
        self.leave_critical(guard);
        self.collab.reload_compare();
    }

    // ---- C11: process lifecycle ---------------------------------------------

    /// `proc_init()`: builds `idleproc` (PID 0, running on the boot stack)
    /// and forks `initproc` (PID 1).
    pub fn proc_init(&mut self, boot_stack: PhysAddr, init_entry: usize, init_arg: usize) {
        let idle = self.alloc_slot().expect("proc_init: table not empty");
        let idle_context = self.collab.idle_context();
        {
            let p = &mut self.procs[idle];
            p.state = ProcState::Runnable;
            p.pid = 0;
            p.kstack = Some(boot_stack);
            p.cr3 = self.collab.boot_cr3();
            p.context = Some(idle_context);
        }
        self.idleproc = idle;
        self.current = idle;
        self.nr_process += 1;
        // idleproc is never in the global list or a hash bucket (spec.md
        // invariant 1 explicitly excludes it) and never enqueued on the
        // run queue (spec.md §4.4).

        let init_pid = self
            .do_fork_kernel_thread_inner(init_entry, init_arg, false)
            .expect("proc_init: failed to fork initproc");
        self.initproc = self.find_proc(init_pid).expect("initproc must exist");
    }

    /// `get_pid` plus the bookkeeping every admitted process needs: hash
    /// bucket, global list, `nr_process`.
    fn admit(&mut self, id: ProcId) {
        let pid = self.get_pid();
        self.procs[id].pid = pid;
        let bucket = pid_hashfn(pid);
        self.with_hash_bucket(bucket, |k, list| list.push_back(k, id));
        self.with_global_list(|k, list| list.push_back(k, id));
        self.nr_process += 1;
    }

    /// `do_fork(clone_flags, parent_tf)` (spec.md §4.7). Returns the
    /// child's PID. On any failure after the kernel stack is allocated,
    /// undoes exactly what the preceding steps did and frees the slot,
    /// mirroring the teacher's cascading cleanup.
    pub fn do_fork(&mut self, clone_flags: CloneFlags, parent_tf: &C::TrapFrame) -> KResult<i32> {
        if self.nr_process >= param::MAX_PROCESS {
            return Err(KernelError::NoFreeProc);
        }

        let child = self.alloc_slot()?;
        self.procs[child] = Proc::new();

        let kstack = self.collab.alloc_pages(param::KSTACKPAGE)?;
        self.procs[child].kstack = Some(kstack);

        if let Err(e) = self.do_fork_setup(child, clone_flags, parent_tf) {
            self.undo_fork_fs(child);
            self.collab.free_pages(kstack, param::KSTACKPAGE);
            self.procs[child] = Proc::new();
            return Err(e);
        }

        let guard = self.enter_critical();
        self.admit(child);
        self.attach_child(self.current, child);
        self.leave_critical(guard);
        self.wakeup_proc(child);
        Ok(self.procs[child].pid)
    }

    /// Undoes whatever `do_fork_setup` committed to `child.fs` before a
    /// later step (`mm`) failed -- symmetric to the `fs` teardown in
    /// `do_exit`: drop the shared reference (or, for a freshly-`dup_fs`'d
    /// table that never had a sibling, tear it down outright once its
    /// refcount reaches zero). A no-op if `do_fork_setup` never got past
    /// the `fs` step.
    fn undo_fork_fs(&mut self, child: ProcId) {
        if let Some(fs) = self.procs[child].fs.take() {
            self.collab.fs_count_dec(self.fs_pool.get(fs).unwrap());
            if self.fs_pool.dec_ref(fs) == 0 {
                self.collab.fs_closeall(self.fs_pool.get(fs).unwrap());
                let value = self.fs_pool.release(fs);
                self.collab.fs_destroy(value);
            }
        }
    }

    /// The fallible half of `do_fork`: clones `fs`/`mm` and builds the
    /// child's trap frame and context. Leaves `child`'s `fs`/`mm`/`kstack`
    /// fields populated only as far as it got before any error.
    fn do_fork_setup(
        &mut self,
        child: ProcId,
        clone_flags: CloneFlags,
        parent_tf: &C::TrapFrame,
    ) -> KResult<()> {
        if let Some(parent_fs) = self.procs[self.current].fs {
            if clone_flags.contains(CloneFlags::CLONE_FS) {
                self.fs_pool.inc_ref(parent_fs);
                self.collab.fs_count_inc(self.fs_pool.get(parent_fs).unwrap());
                self.procs[child].fs = Some(parent_fs);
            } else {
                let fs_value = self.collab.dup_fs(self.fs_pool.get(parent_fs).unwrap())?;
                let handle = self.fs_pool.insert(fs_value).ok_or(KernelError::NoMem)?;
                self.procs[child].fs = Some(handle);
            }
        }

        if let Some(parent_mm) = self.procs[self.current].mm {
            if clone_flags.contains(CloneFlags::CLONE_VM) {
                self.mm_pool.inc_ref(parent_mm);
                self.procs[child].mm = Some(parent_mm);
            } else {
                let mm_value = self.collab.dup_mmap(self.mm_pool.get(parent_mm).unwrap())?;
                let handle = self.mm_pool.insert(mm_value).ok_or(KernelError::NoMem)?;
                self.procs[child].mm = Some(handle);
            }
        }

        // Builds the child's trap frame / context so first dispatch lands
        // in `forkrets`, which restores `tf` and returns to user mode with
        // a forced zero return value.
        let mut child_tf = self.collab.fork_trapframe(parent_tf);
        self.collab.set_return_value(&mut child_tf, 0);
        self.procs[child].context = Some(self.collab.fork_context(&child_tf));
        self.procs[child].tf = Some(child_tf);
        Ok(())
    }

    /// The kernel-thread special case (spec.md §4.7 / C12): the caller
    /// supplies `(entry, arg)` instead of a user trap frame; the child's
    /// context is built to dispatch straight into `kernel_thread_entry`
    /// rather than through `forkrets`, with `CLONE_VM` implied (a kernel
    /// thread never has its own address space). Attached as a child of the
    /// currently running process.
    pub fn do_fork_kernel_thread(&mut self, entry: usize, arg: usize) -> KResult<i32> {
        self.do_fork_kernel_thread_inner(entry, arg, true)
    }

    /// `proc_init`'s special case: `initproc` is the root of the process
    /// tree, so it is admitted with no parent rather than attached under
    /// `idleproc`.
    fn do_fork_kernel_thread_inner(
        &mut self,
        entry: usize,
        arg: usize,
        has_parent: bool,
    ) -> KResult<i32> {
        if self.nr_process >= param::MAX_PROCESS {
            return Err(KernelError::NoFreeProc);
        }
        let child = self.alloc_slot()?;
        self.procs[child] = Proc::new();

        let kstack = self.collab.alloc_pages(param::KSTACKPAGE)?;
        self.procs[child].kstack = Some(kstack);
        self.procs[child].cr3 = self.collab.boot_cr3();
        self.procs[child].context = Some(self.collab.kernel_thread_context(entry, arg));

        let guard = self.enter_critical();
        self.admit(child);
        if has_parent {
            self.attach_child(self.current, child);
        }
        self.leave_critical(guard);
        self.wakeup_proc(child);
        Ok(self.procs[child].pid)
    }

    /// Links `child` into `parent`'s `cptr`/`yptr`/`optr` sibling chain
    /// (spec.md invariant 4: reachable along `cptr -> optr*`).
    fn attach_child(&mut self, parent: ProcId, child: ProcId) {
        self.procs[child].parent = Some(parent);
        let old_first = self.procs[parent].cptr;
        self.procs[child].yptr = old_first;
        if let Some(old_first) = old_first {
            self.procs[old_first].optr = Some(child);
        }
        self.procs[parent].cptr = Some(child);
    }

    /// Unlinks `child` from its parent's sibling chain.
    fn detach_child(&mut self, child: ProcId) {
        let parent = self.procs[child].parent;
        let older = self.procs[child].optr;
        let younger = self.procs[child].yptr;
        if let Some(older) = older {
            self.procs[older].yptr = younger;
        } else if let Some(parent) = parent {
            self.procs[parent].cptr = younger;
        }
        if let Some(younger) = younger {
            self.procs[younger].optr = older;
        }
        self.procs[child].parent = None;
        self.procs[child].optr = None;
        self.procs[child].yptr = None;
    }

    /// `do_exit(code)` (spec.md §4.7).
    pub fn do_exit(&mut self, code: i32) -> ! {
        if self.current == self.idleproc || self.current == self.initproc {
            kpanic!("do_exit: idleproc/initproc may never exit");
        }

        if let Some(mm) = self.procs[self.current].mm.take() {
            self.collab.lcr3(self.collab.boot_cr3());
            if self.mm_pool.dec_ref(mm) == 0 {
                self.collab.exit_mmap(self.mm_pool.get(mm).unwrap());
                let value = self.mm_pool.release(mm);
                self.collab.mm_destroy(value);
            }
        }
        if let Some(fs) = self.procs[self.current].fs.take() {
            self.collab.fs_count_dec(self.fs_pool.get(fs).unwrap());
            if self.fs_pool.dec_ref(fs) == 0 {
                self.collab.fs_closeall(self.fs_pool.get(fs).unwrap());
                let value = self.fs_pool.release(fs);
                self.collab.fs_destroy(value);
            }
        }

        self.procs[self.current].state = ProcState::Zombie;
        self.procs[self.current].exit_code = code;

        let guard = self.enter_critical();
        if let Some(parent) = self.procs[self.current].parent {
            if self.procs[parent].wait_state.contains(WaitState::WT_CHILD) {
                self.wakeup_proc_locked(parent);
            }
        }

        // Reparent every child to initproc.
        let mut child = self.procs[self.current].cptr;
        while let Some(c) = child {
            let next = self.procs[c].yptr;
            self.detach_child(c);
            self.attach_child(self.initproc, c);
            if self.procs[c].state == ProcState::Zombie
                && self.procs[self.initproc]
                    .wait_state
                    .contains(WaitState::WT_CHILD)
            {
                self.wakeup_proc_locked(self.initproc);
            }
            child = next;
        }
        self.leave_critical(guard);

        self.schedule();
        kpanic!("do_exit: schedule() returned past exit");
    }

    /// `do_wait(pid)` (spec.md §4.7). `pid == 0` waits for any child.
    pub fn do_wait(&mut self, pid: i32) -> KResult<(i32, i32)> {
        loop {
            let mut candidate = None;
            let mut any_child = false;

            if pid != 0 {
                let target = self.find_proc(pid).ok_or(KernelError::BadProc)?;
                if self.procs[target].parent != Some(self.current) {
                    return Err(KernelError::BadProc);
                }
                any_child = true;
                if self.procs[target].state == ProcState::Zombie {
                    candidate = Some(target);
                }
            } else {
                let mut c = self.procs[self.current].cptr;
                while let Some(id) = c {
                    any_child = true;
                    if self.procs[id].state == ProcState::Zombie {
                        candidate = Some(id);
                        break;
                    }
                    c = self.procs[id].yptr;
                }
            }

            if let Some(found) = candidate {
                let exit_code = self.procs[found].exit_code;
                let found_pid = self.procs[found].pid;

                let guard = self.enter_critical();
                let bucket = pid_hashfn(found_pid);
                self.with_hash_bucket(bucket, |k, list| list.remove(k, found));
                self.with_global_list(|k, list| list.remove(k, found));
                self.detach_child(found);
                self.nr_process -= 1;
                self.leave_critical(guard);

                if let Some(kstack) = self.procs[found].kstack.take() {
                    self.collab.free_pages(kstack, param::KSTACKPAGE);
                }
                self.procs[found] = Proc::new();

                return Ok((found_pid, exit_code));
            }

            if !any_child {
                return Err(KernelError::BadProc);
            }

            self.procs[self.current].state = ProcState::Sleeping;
            self.procs[self.current].wait_state = WaitState::WT_CHILD;
            self.schedule();

            if self.procs[self.current].flags.contains(ProcFlags::PF_EXITING) {
                self.do_exit(-(KernelError::Killed as i32));
            }
        }
    }

    /// `do_kill(pid)` (spec.md §4.7).
    pub fn do_kill(&mut self, pid: i32) -> KResult<()> {
        let target = self.find_proc(pid).ok_or(KernelError::BadProc)?;
        if self.procs[target].flags.contains(ProcFlags::PF_EXITING) {
            return Err(KernelError::Killed);
        }
        self.procs[target].flags |= ProcFlags::PF_EXITING;
        if self.procs[target]
            .wait_state
            .contains(WaitState::WT_INTERRUPTED)
        {
            self.wakeup_proc(target);
        }
        Ok(())
    }

    /// `do_yield()`: requests a reschedule at the next safe point.
    pub fn do_yield(&mut self) {
        self.procs[self.current].need_resched = true;
    }

    /// `do_sleep(ticks)` (spec.md §4.7).
    pub fn do_sleep(&mut self, ticks: u32) {
        let current = self.current;
        let guard = self.enter_critical();
        self.procs[current].state = ProcState::Sleeping;
        self.procs[current].wait_state = WaitState::WT_TIMER;
        self.with_timers(|k, timers| timers.add_timer(k, current, ticks));
        self.leave_critical(guard);

        self.schedule();

        self.del_timer(current);
    }

    /// `do_execve(name, argv)` (spec.md §4.7). On failure the old address
    /// space has already been torn down, so there is nothing to return to
    /// -- the core calls `do_exit` itself rather than propagating the
    /// error.
    pub fn do_execve(&mut self, name: &[u8], argv: &[&[u8]]) -> ! {
        if self.do_execve_inner(name, argv).is_err() {
            self.do_exit(-(KernelError::Inval as i32));
        }
        unreachable!("do_execve_inner succeeded but did not dispatch");
    }

    fn do_execve_inner(&mut self, name: &[u8], argv: &[&[u8]]) -> KResult<()> {
        if argv.len() > param::EXEC_MAX_ARG_NUM {
            return Err(KernelError::Inval);
        }
        for arg in argv {
            if arg.len() > param::EXEC_MAX_ARG_LEN {
                return Err(KernelError::Inval);
            }
        }

        if let Some(fs) = self.procs[self.current].fs {
            self.collab.fs_closeall(self.fs_pool.get(fs).unwrap());
        }

        if let Some(mm) = self.procs[self.current].mm.take() {
            self.collab.lcr3(self.collab.boot_cr3());
            if self.mm_pool.dec_ref(mm) == 0 {
                self.collab.exit_mmap(self.mm_pool.get(mm).unwrap());
                let value = self.mm_pool.release(mm);
                self.collab.mm_destroy(value);
            }
        }

        let tf = self.collab.load_icode(name, argv)?;
        let context = self.collab.fork_context(&tf);
        self.procs[self.current].context = Some(context);
        self.procs[self.current].tf = Some(tf);
        Ok(())
    }

    // ---- semaphores ---------------------------------------------------------

    pub fn sem_init(&self, value: i32) -> ProcSemaphore {
        Semaphore::new(value)
    }

    pub fn up(&mut self, sem: &mut ProcSemaphore) {
        sem.up(self);
    }

    pub fn down(&mut self, sem: &mut ProcSemaphore) -> KResult<()> {
        sem.down(self)
    }

    pub fn try_down(&mut self, sem: &mut ProcSemaphore) -> bool {
        sem.try_down(self)
    }
}

// ---- Trait glue tying the Kernel arena into list.rs/waitqueue.rs/timer.rs/sched.rs

impl<C: Collaborators> LinkStorage<ProcId, tags::GlobalList> for Kernel<C> {
    fn link(&self, id: ProcId) -> ListLink<ProcId> {
        self.procs[id].list_link
    }
    fn set_link(&mut self, id: ProcId, link: ListLink<ProcId>) {
        self.procs[id].list_link = link;
    }
}

impl<C: Collaborators> LinkStorage<ProcId, tags::HashBucket> for Kernel<C> {
    fn link(&self, id: ProcId) -> ListLink<ProcId> {
        self.procs[id].hash_link
    }
    fn set_link(&mut self, id: ProcId, link: ListLink<ProcId>) {
        self.procs[id].hash_link = link;
    }
}

impl<C: Collaborators> LinkStorage<ProcId, tags::RunQueue> for Kernel<C> {
    fn link(&self, id: ProcId) -> ListLink<ProcId> {
        self.procs[id].run_link
    }
    fn set_link(&mut self, id: ProcId, link: ListLink<ProcId>) {
        self.procs[id].run_link = link;
    }
}

impl<C: Collaborators> TimeSliceAccess<ProcId> for Kernel<C> {
    fn time_slice(&self, id: ProcId) -> u32 {
        self.procs[id].time_slice
    }
    fn set_time_slice(&mut self, id: ProcId, slice: u32) {
        self.procs[id].time_slice = slice;
    }
    fn set_need_resched(&mut self, id: ProcId, flag: bool) {
        self.procs[id].need_resched = flag;
    }
}

impl<C: Collaborators> LinkStorage<ProcId, tags::SemWait> for Kernel<C> {
    fn link(&self, id: ProcId) -> ListLink<ProcId> {
        self.procs[id].sem_link
    }
    fn set_link(&mut self, id: ProcId, link: ListLink<ProcId>) {
        self.procs[id].sem_link = link;
    }
}

impl<C: Collaborators> WaiterAccess<ProcId, tags::SemWait> for Kernel<C> {
    fn wakeup_flag(&self, id: ProcId) -> u32 {
        self.procs[id].wakeup_flag
    }
    fn set_wakeup_flag(&mut self, id: ProcId, flag: u32) {
        self.procs[id].wakeup_flag = flag;
    }
}

impl<C: Collaborators> LinkStorage<ProcId, tags::TimerWheel> for Kernel<C> {
    fn link(&self, id: ProcId) -> ListLink<ProcId> {
        self.procs[id].timer_link
    }
    fn set_link(&mut self, id: ProcId, link: ListLink<ProcId>) {
        self.procs[id].timer_link = link;
    }
}

impl<C: Collaborators> TimerStorage<ProcId, tags::TimerWheel> for Kernel<C> {
    fn expires(&self, id: ProcId) -> u32 {
        self.procs[id].timer_expires
    }
    fn set_expires(&mut self, id: ProcId, ticks: u32) {
        self.procs[id].timer_expires = ticks;
    }
}

impl<C: Collaborators> Blocking<ProcId, tags::SemWait> for Kernel<C> {
    type CriticalSection = CriticalSection<C>;

    fn current(&self) -> ProcId {
        self.current
    }

    fn enter_critical(&mut self) -> CriticalSection<C> {
        Kernel::enter_critical(self)
    }

    fn leave_critical(&mut self, guard: CriticalSection<C>) {
        Kernel::leave_critical(self, guard)
    }

    fn block_on(&mut self, queue: &mut WaitQueue<ProcId, tags::SemWait>, id: ProcId, reason: u32) {
        self.procs[id].state = ProcState::Sleeping;
        self.procs[id].wait_state = WaitState::from_bits_truncate(reason);
        queue.enqueue(self, id, reason);
    }

    fn wakeup_proc(&mut self, id: ProcId) {
        Kernel::wakeup_proc(self, id);
    }

    fn schedule(&mut self) {
        Kernel::schedule(self);
    }
}
