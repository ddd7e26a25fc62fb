//! Zero-sized tags distinguishing an arena's several embedded link fields.
//!
//! A `Proc` sits in up to four independent lists at once (the global
//! process list, its PID hash bucket, maybe the run queue, maybe a
//! semaphore wait queue) plus the timer delta list. `list.rs`'s
//! `LinkStorage<Idx, Tag>` is generic over one of these so the same arena
//! type can implement it once per field instead of just once overall.

pub struct GlobalList;
pub struct HashBucket;
pub struct RunQueue;
pub struct SemWait;
pub struct TimerWheel;
