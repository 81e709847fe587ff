//! Priority bands and the ready-queue set.
//!
//! Every ready thread sits in exactly one of three queues, chosen by its
//! priority band. Each queue keeps its own ordering discipline:
//!
//! - [`Band::L1`]: ascending burst estimate
//! - [`Band::L2`]: descending priority
//! - [`Band::L3`]: arrival order
//!
//! Sorted insertion places a thread after every member with an equal key, so
//! ties always resolve in insertion order.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::thread::{Priority, Thread, ThreadRef};

/// Lowest priority of band L2.
pub const L2_FLOOR: u8 = 50;
/// Lowest priority of band L1.
pub const L1_FLOOR: u8 = 100;

/// Priority band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    /// Priorities 100..=149, shortest burst first.
    L1,
    /// Priorities 50..=99, highest priority first.
    L2,
    /// Priorities 0..=49, first come first served.
    L3,
}

impl Band {
    /// All bands, highest first.
    pub const ALL: [Band; 3] = [Band::L1, Band::L2, Band::L3];

    /// Band a priority belongs to.
    pub const fn of(priority: Priority) -> Band {
        let p = priority.get();
        if p >= L1_FLOOR {
            Band::L1
        } else if p >= L2_FLOOR {
            Band::L2
        } else {
            Band::L3
        }
    }

    /// Queue index, 0 for L1.
    pub const fn index(self) -> usize {
        match self {
            Band::L1 => 0,
            Band::L2 => 1,
            Band::L3 => 2,
        }
    }

    /// Short name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Band::L1 => "L1",
            Band::L2 => "L2",
            Band::L3 => "L3",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Band {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.name())
    }
}

/// A single band queue.
pub struct ReadyQueue {
    band: Band,
    threads: VecDeque<ThreadRef>,
}

impl ReadyQueue {
    fn new(band: Band) -> Self {
        Self {
            band,
            threads: VecDeque::new(),
        }
    }

    /// Number of queued threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Returns true if no thread is queued.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Queued threads in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &ThreadRef> + '_ {
        self.threads.iter()
    }

    /// True if `a` must stay ahead of `b`.
    ///
    /// Only a strictly better key moves a thread forward, which keeps equal
    /// keys in insertion order.
    fn goes_before(&self, a: &Thread, b: &Thread) -> bool {
        match self.band {
            Band::L1 => a.burst_time() < b.burst_time(),
            Band::L2 => a.priority() > b.priority(),
            Band::L3 => false,
        }
    }

    fn insert(&mut self, thread: ThreadRef) {
        let at = self
            .threads
            .iter()
            .position(|queued| self.goes_before(&thread, queued))
            .unwrap_or(self.threads.len());
        self.threads.insert(at, thread);
    }

    fn remove(&mut self, thread: &Thread) -> Option<ThreadRef> {
        let at = self
            .threads
            .iter()
            .position(|queued| core::ptr::eq(Arc::as_ptr(queued), thread))?;
        self.threads.remove(at)
    }
}

/// The three band queues.
pub struct ReadyQueues {
    queues: [ReadyQueue; 3],
}

impl ReadyQueues {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            queues: [
                ReadyQueue::new(Band::L1),
                ReadyQueue::new(Band::L2),
                ReadyQueue::new(Band::L3),
            ],
        }
    }

    /// Queue for `band`.
    pub fn queue(&self, band: Band) -> &ReadyQueue {
        &self.queues[band.index()]
    }

    /// Total number of queued threads.
    pub fn len(&self) -> usize {
        self.queues.iter().map(ReadyQueue::len).sum()
    }

    /// Returns true if every queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(ReadyQueue::is_empty)
    }

    /// Inserts `thread` into the queue of its current priority band.
    ///
    /// # Panics
    ///
    /// Panics if the thread is already queued.
    pub fn insert(&mut self, thread: ThreadRef) -> Band {
        if let Some(band) = thread.queued_band() {
            panic!("thread {} is already queued in {band}", thread.id());
        }
        let band = thread.priority().band();
        thread.set_band(Some(band));
        self.queues[band.index()].insert(thread);
        band
    }

    /// Removes `thread` from whichever queue holds it.
    pub fn remove(&mut self, thread: &Thread) -> Option<ThreadRef> {
        let band = thread.queued_band()?;
        let removed = self.queues[band.index()].remove(thread);
        assert!(
            removed.is_some(),
            "thread {} is marked as queued in {band} but is not there",
            thread.id()
        );
        thread.set_band(None);
        removed
    }

    /// Moves a queued thread to the position its current key calls for,
    /// without leaving its queue.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not queued or its priority left the band.
    pub fn reposition(&mut self, thread: &Thread) {
        let band = thread
            .queued_band()
            .unwrap_or_else(|| panic!("thread {} is not queued", thread.id()));
        assert_eq!(
            band,
            thread.priority().band(),
            "thread {} left band {band} without being moved",
            thread.id()
        );
        let queue = &mut self.queues[band.index()];
        if let Some(handle) = queue.remove(thread) {
            queue.insert(handle);
        }
    }

    /// Highest ordered thread of the highest nonempty band.
    pub fn front(&self) -> Option<(Band, &ThreadRef)> {
        self.queues
            .iter()
            .find_map(|queue| queue.threads.front().map(|thread| (queue.band, thread)))
    }

    /// Removes and returns the thread [`front`](Self::front) would return.
    pub fn pop_front(&mut self) -> Option<(Band, ThreadRef)> {
        let queue = self.queues.iter_mut().find(|queue| !queue.is_empty())?;
        let thread = queue.threads.pop_front()?;
        thread.set_band(None);
        Some((queue.band, thread))
    }

    /// Current members with their bands, L1 first, each queue in order.
    pub fn snapshot(&self) -> Vec<(Band, ThreadRef)> {
        let mut members = Vec::with_capacity(self.len());
        for queue in &self.queues {
            members.extend(queue.threads.iter().map(|thread| (queue.band, Arc::clone(thread))));
        }
        members
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{ThreadConfig, ThreadId};

    fn thread(id: u32, priority: u8, burst: u64) -> ThreadRef {
        Thread::new(ThreadConfig::new(ThreadId(id), Priority::new(priority).unwrap()).with_burst_time(burst))
    }

    fn ids(queues: &ReadyQueues, band: Band) -> Vec<u32> {
        queues.queue(band).iter().map(|t| t.id().0).collect()
    }

    #[test]
    fn band_boundaries() {
        let band = |p| Band::of(Priority::new(p).unwrap());
        assert_eq!(band(0), Band::L3);
        assert_eq!(band(49), Band::L3);
        assert_eq!(band(50), Band::L2);
        assert_eq!(band(99), Band::L2);
        assert_eq!(band(100), Band::L1);
        assert_eq!(band(149), Band::L1);
    }

    #[test]
    fn l1_orders_by_burst_with_stable_ties() {
        let mut queues = ReadyQueues::new();
        queues.insert(thread(1, 120, 30));
        queues.insert(thread(2, 101, 10));
        queues.insert(thread(3, 140, 30));
        queues.insert(thread(4, 100, 20));
        assert_eq!(ids(&queues, Band::L1), vec![2, 4, 1, 3]);
    }

    #[test]
    fn l2_orders_by_priority_with_stable_ties() {
        let mut queues = ReadyQueues::new();
        queues.insert(thread(1, 60, 0));
        queues.insert(thread(2, 90, 0));
        queues.insert(thread(3, 60, 0));
        queues.insert(thread(4, 75, 0));
        assert_eq!(ids(&queues, Band::L2), vec![2, 4, 1, 3]);
    }

    #[test]
    fn l3_is_fifo() {
        let mut queues = ReadyQueues::new();
        queues.insert(thread(1, 10, 0));
        queues.insert(thread(2, 49, 0));
        queues.insert(thread(3, 0, 0));
        assert_eq!(ids(&queues, Band::L3), vec![1, 2, 3]);
    }

    #[test]
    fn pop_front_prefers_higher_band() {
        let mut queues = ReadyQueues::new();
        let low = thread(1, 10, 0);
        let high = thread(2, 110, 5);
        queues.insert(Arc::clone(&low));
        queues.insert(Arc::clone(&high));

        assert_eq!(queues.front().map(|(b, t)| (b, t.id())), Some((Band::L1, ThreadId(2))));
        let (band, popped) = queues.pop_front().unwrap();
        assert_eq!(band, Band::L1);
        assert!(Arc::ptr_eq(&popped, &high));
        assert!(!high.is_queued());
        assert_eq!(queues.pop_front().map(|(b, _)| b), Some(Band::L3));
        assert!(queues.pop_front().is_none());
    }

    #[test]
    fn remove_clears_membership() {
        let mut queues = ReadyQueues::new();
        let t = thread(1, 60, 0);
        assert_eq!(queues.insert(Arc::clone(&t)), Band::L2);
        assert_eq!(t.queued_band(), Some(Band::L2));
        assert!(queues.remove(&t).is_some());
        assert!(!t.is_queued());
        assert!(queues.remove(&t).is_none());
        assert!(queues.is_empty());
    }

    #[test]
    fn snapshot_lists_bands_in_dispatch_order() {
        let mut queues = ReadyQueues::new();
        queues.insert(thread(1, 10, 0));
        queues.insert(thread(2, 60, 0));
        queues.insert(thread(3, 110, 0));
        let bands: Vec<_> = queues.snapshot().into_iter().map(|(b, t)| (b, t.id().0)).collect();
        assert_eq!(bands, vec![(Band::L1, 3), (Band::L2, 2), (Band::L3, 1)]);
    }

    #[test]
    #[should_panic(expected = "already queued")]
    fn double_insert_panics() {
        let mut queues = ReadyQueues::new();
        let t = thread(1, 60, 0);
        queues.insert(Arc::clone(&t));
        queues.insert(t);
    }
}
