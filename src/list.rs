//! Intrusive doubly-linked list (spec.md C3), index-based.
//!
//! The original kernel links processes through raw pointers embedded in the
//! process struct itself (`list_link`, `hash_link`, `run_link`, and the
//! `parent`/`cptr`/`yptr`/`optr` tree links). Spec.md's own design note (§9,
//! "Cyclic parent/child/sibling graph") calls for replacing that with an
//! arena keyed by a stable index, and relationships encoded as indices —
//! so every list here is a list of `Idx` values, and "the embedded link" is
//! a small `ListLink<Idx>` struct that callers store inline in their arena
//! element, exactly where the C struct would have stored its `list_head`.
//!
//! One arena element (a `Proc`) sits in several independent lists at once
//! (the global process list, its PID hash bucket, maybe the run queue), so
//! `LinkStorage` is indexed not just by the arena's `Idx` type but by a
//! zero-sized `Tag` naming *which* embedded link field is meant -- without
//! it a single arena type could only ever implement `LinkStorage` once.
//!
//! This one list implementation backs the global process list, the PID hash
//! buckets, the run queue, and the parent/child sibling chain — anywhere
//! spec.md calls for an embedded list.

use core::marker::PhantomData;

/// The `prev`/`next` pointers of one list membership, embedded in an arena
/// element. An element can be linked into several independent lists at
/// once (e.g. a process is in the global list, a hash bucket, and maybe the
/// run queue simultaneously) by giving it one `ListLink<Idx>` field per
/// list, exactly as the teacher's `Proc` carries `list_link`, `hash_link`,
/// and `run_link` side by side.
#[derive(Debug, Clone, Copy)]
pub struct ListLink<Idx> {
    pub prev: Option<Idx>,
    pub next: Option<Idx>,
}

impl<Idx> Default for ListLink<Idx> {
    fn default() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

impl<Idx> ListLink<Idx> {
    pub const fn new() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

/// Read/write access to one element's link, bridging this module to
/// whatever arena type owns the elements (a `[Proc; NPROC]`, a `Vec`, ...).
///
/// `Tag` distinguishes which embedded link field is being accessed (e.g.
/// `tags::GlobalList` vs `tags::RunQueue`), so a single arena type can
/// implement this trait once per link field instead of just once overall.
/// Implement it once per (arena, link field) pair.
pub trait LinkStorage<Idx: Copy + Eq, Tag = ()> {
    fn link(&self, id: Idx) -> ListLink<Idx>;
    fn set_link(&mut self, id: Idx, link: ListLink<Idx>);
}

/// A list head: just the two ends. Mutating the list only ever touches the
/// head/tail here plus the `prev`/`next` of the nodes adjacent to the edit,
/// so insert/remove are O(1).
#[derive(Debug, Clone, Copy)]
pub struct ListHead<Idx, Tag = ()> {
    head: Option<Idx>,
    tail: Option<Idx>,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Idx, Tag> Default for ListHead<Idx, Tag> {
    fn default() -> Self {
        Self {
            head: None,
            tail: None,
            _tag: PhantomData,
        }
    }
}

impl<Idx: Copy + Eq, Tag> ListHead<Idx, Tag> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            _tag: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn first(&self) -> Option<Idx> {
        self.head
    }

    pub fn last(&self) -> Option<Idx> {
        self.tail
    }

    /// The node following `id` in this list, or `None` at the tail.
    pub fn next<S: LinkStorage<Idx, Tag>>(&self, storage: &S, id: Idx) -> Option<Idx> {
        storage.link(id).next
    }

    /// Appends `id` to the tail. `id` must not already be a member of this
    /// (or any list sharing the same link field).
    pub fn push_back<S: LinkStorage<Idx, Tag>>(&mut self, storage: &mut S, id: Idx) {
        let old_tail = self.tail;
        storage.set_link(
            id,
            ListLink {
                prev: old_tail,
                next: None,
            },
        );
        match old_tail {
            Some(t) => {
                let mut link = storage.link(t);
                link.next = Some(id);
                storage.set_link(t, link);
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    /// Prepends `id` to the head.
    pub fn push_front<S: LinkStorage<Idx, Tag>>(&mut self, storage: &mut S, id: Idx) {
        let old_head = self.head;
        storage.set_link(
            id,
            ListLink {
                prev: None,
                next: old_head,
            },
        );
        match old_head {
            Some(h) => {
                let mut link = storage.link(h);
                link.prev = Some(id);
                storage.set_link(h, link);
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    /// Inserts `id` immediately before `before`, which must already be a
    /// member of this list. Used by the timer delta list, which needs to
    /// splice a new entry into the middle rather than only at the ends.
    pub fn insert_before<S: LinkStorage<Idx, Tag>>(
        &mut self,
        storage: &mut S,
        before: Idx,
        id: Idx,
    ) {
        let prev = storage.link(before).prev;
        storage.set_link(
            id,
            ListLink {
                prev,
                next: Some(before),
            },
        );
        match prev {
            Some(p) => {
                let mut link = storage.link(p);
                link.next = Some(id);
                storage.set_link(p, link);
            }
            None => self.head = Some(id),
        }
        let mut before_link = storage.link(before);
        before_link.prev = Some(id);
        storage.set_link(before, before_link);
    }

    /// Unlinks `id` from the list. `id` must currently be a member;
    /// unlinking a non-member leaves the list corrupted (the caller -- the
    /// process lifecycle code -- always knows membership, so this doesn't
    /// defensively check).
    pub fn remove<S: LinkStorage<Idx, Tag>>(&mut self, storage: &mut S, id: Idx) {
        let ListLink { prev, next } = storage.link(id);
        match prev {
            Some(p) => {
                let mut link = storage.link(p);
                link.next = next;
                storage.set_link(p, link);
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                let mut link = storage.link(n);
                link.prev = prev;
                storage.set_link(n, link);
            }
            None => self.tail = prev,
        }
        storage.set_link(id, ListLink::new());
    }

    /// Pops the head element off the list, if any.
    pub fn pop_front<S: LinkStorage<Idx, Tag>>(&mut self, storage: &mut S) -> Option<Idx> {
        let head = self.head?;
        self.remove(storage, head);
        Some(head)
    }

    /// Iterates the list front to back. Borrows `storage` immutably for the
    /// lifetime of the iterator.
    pub fn iter<'a, S: LinkStorage<Idx, Tag>>(&self, storage: &'a S) -> Iter<'a, Idx, Tag, S> {
        Iter {
            storage,
            cur: self.head,
            _tag: PhantomData,
        }
    }
}

pub struct Iter<'a, Idx, Tag, S> {
    storage: &'a S,
    cur: Option<Idx>,
    _tag: PhantomData<fn() -> Tag>,
}

impl<'a, Idx: Copy + Eq, Tag, S: LinkStorage<Idx, Tag>> Iterator for Iter<'a, Idx, Tag, S> {
    type Item = Idx;

    fn next(&mut self) -> Option<Idx> {
        let id = self.cur?;
        self.cur = self.storage.link(id).next;
        Some(id)
    }
}
