use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};
use tbfsim_core::{config::SizeRange, Flow, PacketQueue};
use tracing::{debug, trace};

/// Spawns one producer thread per registered flow.
///
/// Each producer loops generate → enqueue → sleep for the sampled
/// inter-arrival gap, until the generator stops or its flow is
/// deactivated. A rejected enqueue is recorded on the flow and the
/// packet is gone; the producer never retries.
///
/// Stopping is a cooperative drain: producers cease generating but
/// whatever they already buffered stays in the queue for the shaper.
pub struct TrafficGenerator {
    queue: Arc<PacketQueue>,
    sizes: SizeRange,
    flows: Vec<Arc<Flow>>,

    running: Arc<AtomicBool>,
    producers: Vec<JoinHandle<()>>,
}

impl TrafficGenerator {
    pub fn new(queue: Arc<PacketQueue>, sizes: SizeRange) -> Self {
        Self {
            queue,
            sizes,
            flows: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            producers: Vec::new(),
        }
    }

    /// register a flow; must happen before [`Self::start`]
    pub fn add_flow(&mut self, flow: Arc<Flow>) {
        self.flows.push(flow);
    }

    pub fn flows(&self) -> &[Arc<Flow>] {
        &self.flows
    }

    /// spawn the producer threads; starting twice is a no-op
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        for flow in &self.flows {
            let flow = Arc::clone(flow);
            let queue = Arc::clone(&self.queue);
            let running = Arc::clone(&self.running);
            let sizes = self.sizes;

            self.producers.push(std::thread::spawn(move || {
                produce(flow, queue, running, sizes)
            }));
        }
    }

    /// stop generating, deactivate every flow and join the producers;
    /// stopping twice is a no-op
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        for flow in &self.flows {
            flow.set_active(false);
        }

        for producer in self.producers.drain(..) {
            // all accounting happened on the flow before the producer
            // exited; the join result itself carries nothing
            let _ = producer.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for TrafficGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce(flow: Arc<Flow>, queue: Arc<PacketQueue>, running: Arc<AtomicBool>, sizes: SizeRange) {
    let mut sampler = flow.sampler(sizes);

    debug!(flow = %flow.id(), kind = %flow.kind(), "producer started");

    while running.load(Ordering::SeqCst) && flow.is_active() {
        let packet = flow.generate_packet(&mut sampler);
        let size = packet.size();

        if !queue.enqueue(packet) {
            flow.record_drop();
            trace!(flow = %flow.id(), size, "packet dropped at enqueue");
        }

        std::thread::sleep(sampler.next_gap());
    }

    debug!(
        flow = %flow.id(),
        sent = flow.packets_sent(),
        dropped = flow.packets_dropped(),
        "producer stopped"
    );
}
