use crate::{collector::StatisticsCollector, generator::TrafficGenerator, shaper::TrafficShaper};
use std::{
    sync::Arc,
    time::Duration,
};
use tbfsim_core::{
    defaults::STOP_GRACE_PERIOD, ConfigError, Flow, FlowConfig, FlowId, PacketQueue,
    SimulationConfig, SystemStats, TokenBucket,
};
use tracing::info;

/// A fully assembled shaping pipeline.
///
/// Owns the queue, the token bucket, the flows and the three worker
/// stages, and enforces the start/stop choreography:
///
/// * start: generator, shaper, collector;
/// * stop: generator first, then a grace period for the queue to
///   drain, then shaper, collector and finally the queue shutdown.
///
/// Both are idempotent. The simulation validates its configuration at
/// construction; a running pipeline has no error paths.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use tbfsim::Simulation;
/// # use tbfsim_core::{ArrivalKind, Bandwidth, FlowConfig, FlowId, Priority, SimulationConfig};
/// let config = SimulationConfig::default();
/// let flows = vec![FlowConfig {
///     id: FlowId::new(1),
///     kind: ArrivalKind::Constant,
///     target_rate: "400kbps".parse().unwrap(),
///     priority: Priority::Medium,
/// }];
///
/// let mut simulation = Simulation::new(config, &flows).unwrap();
/// simulation.run_for(Duration::from_secs(10));
///
/// for sample in simulation.history() {
///     println!("{:.3}s: {} packets queued", sample.timestamp, sample.queue_occupancy);
/// }
/// ```
pub struct Simulation {
    config: SimulationConfig,
    flows: Vec<Arc<Flow>>,
    queue: Arc<PacketQueue>,
    bucket: Arc<TokenBucket>,

    generator: TrafficGenerator,
    shaper: TrafficShaper,
    collector: StatisticsCollector,
}

impl Simulation {
    /// assemble a pipeline from a validated configuration
    pub fn new(config: SimulationConfig, flow_configs: &[FlowConfig]) -> Result<Self, ConfigError> {
        config.validate()?;
        config.validate_flows(flow_configs)?;

        let queue = Arc::new(PacketQueue::new(config.queue_max_size));
        let bucket = Arc::new(TokenBucket::new(config.token_rate, config.bucket_capacity));

        let flows: Vec<Arc<Flow>> = flow_configs
            .iter()
            .map(|config| Arc::new(Flow::from_config(config)))
            .collect();

        let mut generator = TrafficGenerator::new(Arc::clone(&queue), config.packet_sizes);
        let mut shaper =
            TrafficShaper::new(Arc::clone(&queue), Arc::clone(&bucket), config.link_capacity);
        for flow in &flows {
            generator.add_flow(Arc::clone(flow));
            shaper.register_flow(Arc::clone(flow));
        }

        let collector = StatisticsCollector::new(
            flows.clone(),
            Arc::clone(&queue),
            config.sample_interval,
        );

        Ok(Self {
            config,
            flows,
            queue,
            bucket,
            generator,
            shaper,
            collector,
        })
    }

    /// start every stage; starting twice is a no-op
    pub fn start(&mut self) {
        info!(
            flows = self.flows.len(),
            token_rate = %self.config.token_rate,
            "starting simulation"
        );

        self.generator.start();
        self.shaper.start();
        self.collector.start();
    }

    /// stop the pipeline in drain order; stopping twice is a no-op
    pub fn stop(&mut self) {
        let draining = self.generator.is_running();

        self.generator.stop();
        if draining {
            // let the shaper work through what the sources buffered
            std::thread::sleep(STOP_GRACE_PERIOD);
        }
        self.shaper.stop();
        self.collector.stop();
        self.queue.shutdown();

        if draining {
            info!(
                transmitted = self.shaper.packets_transmitted(),
                discarded = self.shaper.packets_discarded(),
                left_in_queue = self.queue.size(),
                "simulation stopped"
            );
        }
    }

    /// run the pipeline for `duration`, then stop it
    pub fn run_for(&mut self, duration: Duration) {
        self.start();
        std::thread::sleep(duration);
        self.stop();
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn flows(&self) -> &[Arc<Flow>] {
        &self.flows
    }

    /// flow identifiers in registration order, the column order of the
    /// report
    pub fn flow_ids(&self) -> Vec<FlowId> {
        self.flows.iter().map(|flow| flow.id()).collect()
    }

    pub fn queue(&self) -> &PacketQueue {
        &self.queue
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// the sampled time series (final once stopped)
    pub fn history(&self) -> Vec<SystemStats> {
        self.collector.history()
    }

    pub fn packets_transmitted(&self) -> u64 {
        self.shaper.packets_transmitted()
    }

    pub fn bytes_transmitted(&self) -> u64 {
        self.shaper.bytes_transmitted()
    }

    pub fn packets_discarded(&self) -> u64 {
        self.shaper.packets_discarded()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.stop();
    }
}
