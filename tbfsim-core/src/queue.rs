use crate::packet::Packet;
use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

/// Bounded priority buffer between the traffic sources and the shaper.
///
/// Packets are served `(priority desc, creation time asc)`: the highest
/// class first and, within a class, the oldest packet first. Ties on
/// both keys are broken by insertion order so the schedule is stable.
///
/// The queue tail-drops: when full, a new arrival is rejected and
/// counted, packets already buffered are never evicted. Rejection is a
/// counted outcome, not an error.
///
/// # Shutdown
///
/// [`PacketQueue::shutdown`] wakes every blocked consumer. Blocked
/// [`PacketQueue::dequeue`] calls keep draining whatever is buffered
/// and return `None` once the queue is empty. Arrivals after shutdown
/// are rejected and counted like tail drops, without waking anyone.
#[derive(Debug)]
pub struct PacketQueue {
    max_size: usize,
    inner: Mutex<Inner>,
    available: Condvar,
}

#[derive(Debug)]
struct Inner {
    heap: BinaryHeap<QueuedPacket>,
    /// insertion counter, the stable tie-break of the ordering key
    seq: u64,
    total_dropped: u64,
    shutdown: bool,
}

/// A buffered packet together with its insertion rank.
#[derive(Debug)]
struct QueuedPacket {
    packet: Packet,
    seq: u64,
}

impl PacketQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                seq: 0,
                total_dropped: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// the tail-drop threshold in packets
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// buffer a packet, or reject it when the queue is full or shut
    /// down
    ///
    /// A successful enqueue wakes one blocked consumer. Returns whether
    /// the packet was accepted; a rejected packet is counted in
    /// [`Self::total_dropped`].
    pub fn enqueue(&self, packet: Packet) -> bool {
        let mut inner = self.lock();

        if inner.shutdown || inner.heap.len() >= self.max_size {
            inner.total_dropped += 1;
            return false;
        }

        let seq = inner.seq;
        inner.seq += 1;
        inner.heap.push(QueuedPacket { packet, seq });
        drop(inner);

        self.available.notify_one();
        true
    }

    /// wait until a packet is available or the queue is shut down
    ///
    /// Returns `None` only once the queue is shut down *and* drained.
    pub fn dequeue(&self) -> Option<Packet> {
        let mut inner = self.lock();

        loop {
            if let Some(queued) = inner.heap.pop() {
                return Some(queued.packet);
            }
            if inner.shutdown {
                return None;
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// pop the next packet without blocking
    pub fn try_dequeue(&self) -> Option<Packet> {
        self.lock().heap.pop().map(|queued| queued.packet)
    }

    /// number of packets currently buffered
    pub fn size(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// total number of arrivals rejected since construction
    pub fn total_dropped(&self) -> u64 {
        self.lock().total_dropped
    }

    /// stop accepting arrivals and wake every blocked consumer
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.shutdown = true;
        drop(inner);

        self.available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a poisoned lock means a consumer panicked; the buffer content
        // is still structurally sound, keep serving it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueuedPacket {
    /// `(priority desc, created asc, seq asc)` expressed as a max-heap
    /// key: the greatest element is the one to serve next
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.packet
            .priority()
            .cmp(&other.packet.priority())
            .then_with(|| other.packet.created().cmp(&self.packet.created()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialEq for QueuedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}
impl Eq for QueuedPacket {}
impl PartialOrd for QueuedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other)
    }
}
