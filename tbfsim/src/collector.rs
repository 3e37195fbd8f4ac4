use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tbfsim_core::{Flow, FlowStats, PacketQueue, SystemStats};
use tracing::debug;

/// Periodic sampler of the pipeline counters.
///
/// The collector observes without perturbing: one sample is a queue
/// size read plus a few atomic loads per flow. Counter values from
/// different flows may be skewed by a few packets within one sample
/// (every counter is individually monotone); the skew is far below the
/// sampling cadence and irrelevant for the produced time series.
pub struct StatisticsCollector {
    flows: Vec<Arc<Flow>>,
    queue: Arc<PacketQueue>,
    sample_interval: Duration,

    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    history: Arc<Mutex<Vec<SystemStats>>>,
}

impl StatisticsCollector {
    pub fn new(
        flows: Vec<Arc<Flow>>,
        queue: Arc<PacketQueue>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            flows,
            queue,
            sample_interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// spawn the sampling thread; starting twice is a no-op
    ///
    /// The first sample is taken immediately, so even a very short run
    /// produces a time series.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let flows = self.flows.clone();
        let queue = Arc::clone(&self.queue);
        let history = Arc::clone(&self.history);
        let running = Arc::clone(&self.running);
        let interval = self.sample_interval;

        self.worker = Some(std::thread::spawn(move || {
            let started = Instant::now();
            debug!(interval = ?interval, "collector started");

            while running.load(Ordering::SeqCst) {
                let snapshot = sample(started, &flows, &queue);
                history
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(snapshot);

                std::thread::sleep(interval);
            }

            debug!("collector stopped");
        }));
    }

    /// stop and join the sampler; stopping twice is a no-op
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

    /// the sampled time series so far
    ///
    /// Once the collector is stopped this is the final, immutable
    /// history of the run.
    pub fn history(&self) -> Vec<SystemStats> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StatisticsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample(started: Instant, flows: &[Arc<Flow>], queue: &PacketQueue) -> SystemStats {
    let elapsed = started.elapsed().as_secs_f64();

    let mut total_bytes = 0;
    let mut total_packets = 0;

    let flows = flows
        .iter()
        .map(|flow| {
            let packets_sent = flow.packets_sent();
            let packets_dropped = flow.packets_dropped();
            let bytes_transmitted = flow.bytes_transmitted();

            total_bytes += bytes_transmitted;
            total_packets += packets_sent.saturating_sub(packets_dropped);

            FlowStats {
                flow: flow.id(),
                packets_sent,
                packets_dropped,
                bytes_transmitted,
                average_delay_ms: flow.average_delay_ms(),
                throughput: cumulative_rate(bytes_transmitted, elapsed),
                drop_rate: ratio(packets_dropped, packets_sent),
            }
        })
        .collect();

    SystemStats {
        timestamp: elapsed,
        queue_occupancy: queue.size(),
        total_packets_transmitted: total_packets,
        total_bytes_transmitted: total_bytes,
        aggregate_throughput: cumulative_rate(total_bytes, elapsed),
        flows,
    }
}

/// bytes over elapsed seconds, `0` at the degenerate start of time
fn cumulative_rate(bytes: u64, elapsed: f64) -> f64 {
    if elapsed > 0.0 {
        bytes as f64 / elapsed
    } else {
        0.0
    }
}

/// `dropped / sent` guarded against an idle source
fn ratio(dropped: u64, sent: u64) -> f64 {
    if sent > 0 {
        dropped as f64 / sent as f64
    } else {
        0.0
    }
}
