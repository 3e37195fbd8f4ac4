//! Statistics snapshot types.
//!
//! The collector samples the live counters on a fixed cadence and
//! appends one [`SystemStats`] per sample to its history. The records
//! are plain values: producing them never perturbs the pipeline beyond
//! a handful of atomic loads.

use crate::packet::FlowId;

/// Point-in-time summary of one traffic source.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStats {
    /// The source this record describes.
    pub flow: FlowId,
    /// Packets generated so far (including later drops).
    pub packets_sent: u64,
    /// Packets rejected at enqueue so far.
    pub packets_dropped: u64,
    /// Bytes successfully shaped so far.
    pub bytes_transmitted: u64,
    /// Mean queueing + serialization delay over completed packets, in
    /// milliseconds.
    pub average_delay_ms: f64,
    /// Cumulative average throughput since collector start, in bytes
    /// per second.
    pub throughput: f64,
    /// Fraction of generated packets rejected at enqueue, in `[0, 1]`.
    pub drop_rate: f64,
}

/// Point-in-time snapshot of the whole pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    /// Seconds elapsed since the collector started.
    pub timestamp: f64,
    /// Packets buffered in the queue at sampling time.
    pub queue_occupancy: usize,
    /// Completed packets across all flows (`sent - dropped` per flow,
    /// so packets still buffered or on the wire count as completed; the
    /// over-count is bounded by the queue depth and irrelevant at the
    /// sampling cadence).
    pub total_packets_transmitted: u64,
    /// Bytes shaped across all flows.
    pub total_bytes_transmitted: u64,
    /// Cumulative average throughput across all flows, in bytes per
    /// second.
    pub aggregate_throughput: f64,
    /// Per-flow summaries, in flow registration order.
    pub flows: Vec<FlowStats>,
}
