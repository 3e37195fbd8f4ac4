mod arrival;

pub use self::arrival::{ArrivalKind, ArrivalSampler};

use crate::{
    config::{FlowConfig, SizeRange},
    measure::Bandwidth,
    packet::{FlowId, Packet, Priority},
};
use std::{
    sync::atomic::{AtomicBool, AtomicU64},
    time::Duration,
};

/// use total ordering for the atomic operations to prevent
/// the operations to be reordered by the compiler or the CPU.
///
/// The counters are monotone and independently read, so a relaxed
/// ordering would very likely do; the cost of the stronger ordering is
/// marginal at the rates this simulator runs at.
const ORDERING: std::sync::atomic::Ordering = std::sync::atomic::Ordering::SeqCst;

/// The Atomic ordering used for `load` like operations
const FETCH_ORDERING: std::sync::atomic::Ordering = ORDERING;

/// The Atomic odering used for `store` like operations
const STORE_ORDERING: std::sync::atomic::Ordering = ORDERING;

/// One traffic source: its arrival profile plus live counters.
///
/// A `Flow` is shared between three parties with disjoint write sets:
/// the producer thread increments `packets_sent` and `packets_dropped`,
/// the shaper increments `bytes_transmitted` and the delay sum, and the
/// statistics collector only reads. Every counter is an independent
/// atomic; readers get monotone, eventually consistent values rather
/// than a global snapshot, which is all the sampling cadence needs.
///
/// The pseudo-random state used to drive the arrival process is *not*
/// part of the flow: the producer thread owns an [`ArrivalSampler`]
/// obtained from [`Flow::sampler`], keeping the PRNG single-writer.
#[derive(Debug)]
pub struct Flow {
    id: FlowId,
    kind: ArrivalKind,
    target_rate: Bandwidth,
    priority: Priority,

    active: AtomicBool,

    packets_sent: AtomicU64,
    packets_dropped: AtomicU64,
    bytes_transmitted: AtomicU64,
    /// running sum of per-packet delays, in whole microseconds
    total_delay_us: AtomicU64,
}

impl Flow {
    pub fn new(id: FlowId, kind: ArrivalKind, target_rate: Bandwidth, priority: Priority) -> Self {
        Self {
            id,
            kind,
            target_rate,
            priority,
            active: AtomicBool::new(true),
            packets_sent: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            bytes_transmitted: AtomicU64::new(0),
            total_delay_us: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(config.id, config.kind, config.target_rate, config.priority)
    }

    #[inline]
    pub fn id(&self) -> FlowId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ArrivalKind {
        self.kind
    }

    #[inline]
    pub fn target_rate(&self) -> Bandwidth {
        self.target_rate
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// whether the producer should keep generating packets
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(FETCH_ORDERING)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, STORE_ORDERING)
    }

    /// build the arrival sampler for this flow's producer thread
    pub fn sampler(&self, sizes: SizeRange) -> ArrivalSampler {
        ArrivalSampler::new(self.kind, self.target_rate, sizes)
    }

    /// like [`Self::sampler`] with a fixed seed, for reproducible runs
    pub fn sampler_seeded(&self, sizes: SizeRange, seed: u64) -> ArrivalSampler {
        ArrivalSampler::seeded(self.kind, self.target_rate, sizes, seed)
    }

    /// draw a packet from the sampler and account for it
    ///
    /// `packets_sent` counts *generated* packets: a packet later
    /// rejected by the queue has still been sent by the source.
    pub fn generate_packet(&self, sampler: &mut ArrivalSampler) -> Packet {
        self.packets_sent.fetch_add(1, STORE_ORDERING);

        Packet::new(self.id, sampler.next_size(), self.priority)
    }

    /// account for a packet rejected at enqueue
    pub fn record_drop(&self) {
        self.packets_dropped.fetch_add(1, STORE_ORDERING);
    }

    /// account for a successfully shaped packet
    pub fn record_transmission(&self, bytes: u64, delay: Duration) {
        self.bytes_transmitted.fetch_add(bytes, STORE_ORDERING);
        self.total_delay_us
            .fetch_add(delay.as_micros() as u64, STORE_ORDERING);
    }

    #[inline]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(FETCH_ORDERING)
    }

    #[inline]
    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped.load(FETCH_ORDERING)
    }

    #[inline]
    pub fn bytes_transmitted(&self) -> u64 {
        self.bytes_transmitted.load(FETCH_ORDERING)
    }

    /// mean delay over completed packets, in milliseconds
    ///
    /// The denominator `sent - dropped` still includes packets that are
    /// buffered or on the wire, so the value trails reality by a little
    /// while traffic is flowing; the error washes out at the sampling
    /// cadence and vanishes once drained.
    pub fn average_delay_ms(&self) -> f64 {
        let sent = self.packets_sent();
        let dropped = self.packets_dropped();
        let completed = sent.saturating_sub(dropped);

        if completed == 0 {
            return 0.0;
        }

        let total_ms = self.total_delay_us.load(FETCH_ORDERING) as f64 / 1_000.0;
        total_ms / completed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> Flow {
        Flow::new(
            FlowId::new(1),
            ArrivalKind::Constant,
            Bandwidth::new(100 * 1_024, Duration::from_secs(1)),
            Priority::High,
        )
    }

    #[test]
    fn starts_active_with_zeroed_counters() {
        let flow = flow();

        assert!(flow.is_active());
        assert_eq!(flow.packets_sent(), 0);
        assert_eq!(flow.packets_dropped(), 0);
        assert_eq!(flow.bytes_transmitted(), 0);
        assert_eq!(flow.average_delay_ms(), 0.0);
    }

    #[test]
    fn generate_packet_counts_and_tags() {
        let flow = flow();
        let mut sampler = flow.sampler_seeded(SizeRange::default(), 11);

        let packet = flow.generate_packet(&mut sampler);

        assert_eq!(flow.packets_sent(), 1);
        assert_eq!(packet.flow(), flow.id());
        assert_eq!(packet.priority(), Priority::High);
    }

    #[test]
    fn average_delay_over_completed_packets() {
        let flow = flow();
        let mut sampler = flow.sampler_seeded(SizeRange::default(), 11);

        for _ in 0..4 {
            flow.generate_packet(&mut sampler);
        }
        flow.record_drop();

        // three completed packets, 30ms of accumulated delay
        for _ in 0..3 {
            flow.record_transmission(512, Duration::from_millis(10));
        }

        assert_eq!(flow.bytes_transmitted(), 3 * 512);
        assert!((flow.average_delay_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn counters_are_monotone_under_concurrency() {
        use std::sync::Arc;

        let flow = Arc::new(flow());

        let writer = {
            let flow = Arc::clone(&flow);
            std::thread::spawn(move || {
                let mut sampler = flow.sampler_seeded(SizeRange::default(), 3);
                for _ in 0..10_000 {
                    flow.generate_packet(&mut sampler);
                    flow.record_transmission(100, Duration::from_micros(50));
                }
            })
        };

        let mut last_sent = 0;
        let mut last_bytes = 0;
        while !writer.is_finished() {
            let sent = flow.packets_sent();
            let bytes = flow.bytes_transmitted();
            assert!(sent >= last_sent);
            assert!(bytes >= last_bytes);
            last_sent = sent;
            last_bytes = bytes;
        }

        writer.join().unwrap();
        assert_eq!(flow.packets_sent(), 10_000);
        assert_eq!(flow.bytes_transmitted(), 1_000_000);
    }
}
