use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Instant,
};
use tbfsim_core::{
    defaults::SHAPER_IDLE_BACKOFF, Bandwidth, Flow, FlowId, PacketQueue, TokenBucket,
};
use tracing::debug;

/// The single consumer of the packet queue.
///
/// The worker drains packets in priority order and subjects each one
/// to the two delays of the model:
///
/// 1. **shaping** — the packet waits until the token bucket grants its
///    size in credit; this enforces the long-run rate, and
/// 2. **serialization** — the worker then sleeps the time the wire
///    needs for the packet's bits; this enforces the instantaneous
///    link speed.
///
/// Once both complete the packet is stamped and its flow credited.
/// A packet caught in the token wait when the shaper stops is
/// *discarded*: never stamped, never counted as a drop. The discard
/// counter keeps the end-of-run accounting exact.
pub struct TrafficShaper {
    queue: Arc<PacketQueue>,
    bucket: Arc<TokenBucket>,
    link_capacity: Bandwidth,
    flows: HashMap<FlowId, Arc<Flow>>,

    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,

    packets_transmitted: Arc<AtomicU64>,
    bytes_transmitted: Arc<AtomicU64>,
    packets_discarded: Arc<AtomicU64>,
}

impl TrafficShaper {
    pub fn new(
        queue: Arc<PacketQueue>,
        bucket: Arc<TokenBucket>,
        link_capacity: Bandwidth,
    ) -> Self {
        Self {
            queue,
            bucket,
            link_capacity,
            flows: HashMap::new(),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            packets_transmitted: Arc::new(AtomicU64::new(0)),
            bytes_transmitted: Arc::new(AtomicU64::new(0)),
            packets_discarded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// register a flow for the statistics callback; must happen before
    /// [`Self::start`]
    pub fn register_flow(&mut self, flow: Arc<Flow>) {
        self.flows.insert(flow.id(), flow);
    }

    /// spawn the worker; starting twice is a no-op
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let worker = Worker {
            queue: Arc::clone(&self.queue),
            bucket: Arc::clone(&self.bucket),
            link_capacity: self.link_capacity,
            flows: self.flows.clone(),
            running: Arc::clone(&self.running),
            packets_transmitted: Arc::clone(&self.packets_transmitted),
            bytes_transmitted: Arc::clone(&self.bytes_transmitted),
            packets_discarded: Arc::clone(&self.packets_discarded),
        };

        self.worker = Some(std::thread::spawn(move || worker.run()));
    }

    /// stop and join the worker; stopping twice is a no-op
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// packets stamped since construction
    pub fn packets_transmitted(&self) -> u64 {
        self.packets_transmitted.load(Ordering::SeqCst)
    }

    /// bytes stamped since construction
    pub fn bytes_transmitted(&self) -> u64 {
        self.bytes_transmitted.load(Ordering::SeqCst)
    }

    /// packets dequeued but abandoned by a shutdown before their
    /// tokens were granted
    pub fn packets_discarded(&self) -> u64 {
        self.packets_discarded.load(Ordering::SeqCst)
    }
}

impl Drop for TrafficShaper {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    queue: Arc<PacketQueue>,
    bucket: Arc<TokenBucket>,
    link_capacity: Bandwidth,
    flows: HashMap<FlowId, Arc<Flow>>,
    running: Arc<AtomicBool>,
    packets_transmitted: Arc<AtomicU64>,
    bytes_transmitted: Arc<AtomicU64>,
    packets_discarded: Arc<AtomicU64>,
}

impl Worker {
    fn run(self) {
        debug!("shaper started");

        while self.running.load(Ordering::SeqCst) {
            let Some(mut packet) = self.queue.try_dequeue() else {
                std::thread::sleep(SHAPER_IDLE_BACKOFF);
                continue;
            };

            // the rate limiting gate: poll until the bucket grants the
            // packet's size in credit
            while self.running.load(Ordering::SeqCst) && !self.bucket.consume(packet.size()) {
                std::thread::sleep(SHAPER_IDLE_BACKOFF);
            }

            if !self.running.load(Ordering::SeqCst) {
                // shutdown intervened: the packet is neither
                // transmitted nor dropped, only accounted as discarded
                self.packets_discarded.fetch_add(1, Ordering::SeqCst);
                debug!(
                    flow = %packet.flow(),
                    size = packet.size(),
                    "packet discarded by shutdown"
                );
                break;
            }

            // serialization: the time the wire needs for these bits,
            // distinct from the shaping rate applied above
            std::thread::sleep(self.link_capacity.transmission_delay(packet.size()));

            packet.mark_transmitted(Instant::now());

            self.packets_transmitted.fetch_add(1, Ordering::SeqCst);
            self.bytes_transmitted
                .fetch_add(packet.size(), Ordering::SeqCst);

            if let Some(flow) = self.flows.get(&packet.flow()) {
                flow.record_transmission(packet.size(), packet.delay().unwrap_or_default());
            }
        }

        debug!(
            transmitted = self.packets_transmitted.load(Ordering::SeqCst),
            discarded = self.packets_discarded.load(Ordering::SeqCst),
            "shaper stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tbfsim_core::{ArrivalKind, Packet, Priority, SizeRange};

    const SECOND: Duration = Duration::from_secs(1);

    fn flow(id: u32, priority: Priority) -> Arc<Flow> {
        Arc::new(Flow::new(
            FlowId::new(id),
            ArrivalKind::Constant,
            Bandwidth::new(100 * 1_024, SECOND),
            priority,
        ))
    }

    fn shaper(queue: &Arc<PacketQueue>, bucket: TokenBucket) -> TrafficShaper {
        TrafficShaper::new(
            Arc::clone(queue),
            Arc::new(bucket),
            // a fast wire keeps serialization negligible in tests
            Bandwidth::bits_per(1_000_000_000, SECOND),
        )
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let queue = Arc::new(PacketQueue::new(10));
        let mut shaper = shaper(&queue, TokenBucket::new(Bandwidth::new(1_024, SECOND), 1_024));

        shaper.start();
        shaper.start();
        assert!(shaper.is_running());

        shaper.stop();
        shaper.stop();
        assert!(!shaper.is_running());
    }

    #[test]
    fn transmits_and_credits_the_flow() {
        let queue = Arc::new(PacketQueue::new(10));
        let flow = flow(1, Priority::Medium);

        let mut shaper = shaper(
            &queue,
            TokenBucket::new(Bandwidth::new(1_024 * 1_024, SECOND), 64 * 1_024),
        );
        shaper.register_flow(Arc::clone(&flow));

        let mut sampler = flow.sampler_seeded(SizeRange::default(), 42);
        let first = flow.generate_packet(&mut sampler);
        let second = flow.generate_packet(&mut sampler);
        let expected_bytes = first.size() + second.size();

        queue.enqueue(first);
        queue.enqueue(second);

        shaper.start();
        std::thread::sleep(Duration::from_millis(100));
        shaper.stop();

        assert_eq!(shaper.packets_transmitted(), 2);
        assert_eq!(shaper.bytes_transmitted(), expected_bytes);
        assert_eq!(flow.bytes_transmitted(), expected_bytes);
        assert!(flow.average_delay_ms() > 0.0);
    }

    #[test]
    fn starved_bucket_defers_transmission() {
        let queue = Arc::new(PacketQueue::new(10));

        // 1 KiB of initial credit, then a trickle: only the first
        // packet can pass during the test window
        let mut shaper = shaper(&queue, TokenBucket::new(Bandwidth::new(10, SECOND), 1_024));

        queue.enqueue(Packet::new(FlowId::new(1), 1_000, Priority::Medium));
        queue.enqueue(Packet::new(FlowId::new(1), 1_000, Priority::Medium));

        shaper.start();
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(shaper.packets_transmitted(), 1);

        shaper.stop();

        // the second packet was caught in the token wait
        assert_eq!(shaper.packets_discarded(), 1);
        assert_eq!(shaper.packets_transmitted(), 1);
    }

    #[test]
    fn unknown_flow_still_transmits() {
        // a packet whose flow was never registered is shaped normally,
        // only the per-flow statistics callback is skipped
        let queue = Arc::new(PacketQueue::new(10));
        let mut shaper = shaper(
            &queue,
            TokenBucket::new(Bandwidth::new(1_024 * 1_024, SECOND), 64 * 1_024),
        );

        queue.enqueue(Packet::new(FlowId::new(9), 500, Priority::Low));

        shaper.start();
        std::thread::sleep(Duration::from_millis(50));
        shaper.stop();

        assert_eq!(shaper.packets_transmitted(), 1);
    }
}
