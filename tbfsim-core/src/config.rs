use crate::{
    defaults::{
        DEFAULT_BUCKET_CAPACITY, DEFAULT_LINK_CAPACITY, DEFAULT_MAX_PACKET_SIZE,
        DEFAULT_MIN_PACKET_SIZE, DEFAULT_QUEUE_MAX_SIZE, DEFAULT_SAMPLE_INTERVAL,
        DEFAULT_TOKEN_RATE,
    },
    flow::ArrivalKind,
    measure::Bandwidth,
    packet::{FlowId, Priority},
};
use std::{collections::HashSet, time::Duration};
use thiserror::Error;

/// Inclusive bounds of the uniform packet size distribution, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PACKET_SIZE,
            max: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// Construction-time parameters of the shaping pipeline.
///
/// The configuration is plain data; call [`SimulationConfig::validate`]
/// before building components out of it. Invalid values are programmer
/// errors and fail fast — they never surface as runtime errors from the
/// pipeline itself.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// serialization speed of the simulated wire
    pub link_capacity: Bandwidth,
    /// long-run shaping rate enforced by the token bucket
    pub token_rate: Bandwidth,
    /// burst allowance of the token bucket, in bytes
    pub bucket_capacity: u64,
    /// tail-drop threshold of the packet queue, in packets
    pub queue_max_size: usize,
    /// cadence of the statistics collector
    pub sample_interval: Duration,
    /// packet size distribution shared by every flow
    pub packet_sizes: SizeRange,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            link_capacity: DEFAULT_LINK_CAPACITY,
            token_rate: DEFAULT_TOKEN_RATE,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            queue_max_size: DEFAULT_QUEUE_MAX_SIZE,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            packet_sizes: SizeRange::default(),
        }
    }
}

/// Definition of one traffic source.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub id: FlowId,
    pub kind: ArrivalKind,
    pub target_rate: Bandwidth,
    pub priority: Priority,
}

/// Reasons a configuration cannot be turned into a running pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The token rate must be non zero, the shaper would never transmit")]
    ZeroTokenRate,
    #[error("The link capacity must be non zero, serialization would never complete")]
    ZeroLinkCapacity,
    #[error("The bucket capacity must be non zero, no packet could ever consume tokens")]
    ZeroBucketCapacity,
    #[error("The queue size must be non zero, every packet would tail-drop")]
    ZeroQueueSize,
    #[error("Invalid packet size range: min ({min}) exceeds max ({max})")]
    InvalidSizeRange { min: u64, max: u64 },
    #[error("Flow {id}: the target rate must be non zero, no inter-arrival gap exists")]
    ZeroFlowRate { id: FlowId },
    #[error("Flow {id} is registered twice")]
    DuplicateFlowId { id: FlowId },
}

impl SimulationConfig {
    const SECOND: Duration = Duration::from_secs(1);

    /// check every construction precondition
    ///
    /// In particular a zero token rate or flow rate would divide by
    /// zero in the refill and inter-arrival computations; they are
    /// rejected here so the hot paths never have to guard for it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_rate.capacity(Self::SECOND) == 0 {
            return Err(ConfigError::ZeroTokenRate);
        }
        if self.link_capacity.capacity(Self::SECOND) == 0 {
            return Err(ConfigError::ZeroLinkCapacity);
        }
        if self.bucket_capacity == 0 {
            return Err(ConfigError::ZeroBucketCapacity);
        }
        if self.queue_max_size == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        if self.packet_sizes.min > self.packet_sizes.max {
            return Err(ConfigError::InvalidSizeRange {
                min: self.packet_sizes.min,
                max: self.packet_sizes.max,
            });
        }

        Ok(())
    }

    /// check the flow set against the configuration
    pub fn validate_flows(&self, flows: &[FlowConfig]) -> Result<(), ConfigError> {
        let mut seen = HashSet::with_capacity(flows.len());

        for flow in flows {
            if flow.target_rate.capacity(Self::SECOND) == 0 {
                return Err(ConfigError::ZeroFlowRate { id: flow.id });
            }
            if !seen.insert(flow.id) {
                return Err(ConfigError::DuplicateFlowId { id: flow.id });
            }
        }

        Ok(())
    }
}
