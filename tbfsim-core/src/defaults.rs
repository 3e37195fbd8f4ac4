use crate::measure::Bandwidth;
use std::time::Duration;

/// Default lower bound of the uniform packet size distribution, in
/// bytes. The size of a minimal Ethernet frame.
pub const DEFAULT_MIN_PACKET_SIZE: u64 = 64;

/// Default upper bound of the uniform packet size distribution, in
/// bytes. The classic Ethernet MTU.
pub const DEFAULT_MAX_PACKET_SIZE: u64 = 1_500;

/// The packet size the arrival processes assume when converting a
/// byte rate into an inter-arrival gap.
///
/// Gaps are spaced for `rate / REFERENCE_PACKET_SIZE` packets per
/// second regardless of the sizes actually drawn.
pub const REFERENCE_PACKET_SIZE: u64 = 500;

/// Default serialization speed of the simulated wire: a 10 Mb/s link.
///
/// ```
/// # use tbfsim_core::defaults::*;
/// # use std::time::Duration;
/// assert_eq!(
///     DEFAULT_LINK_CAPACITY.capacity(Duration::from_secs(1)),
///     1_250_000,
/// );
/// ```
pub const DEFAULT_LINK_CAPACITY: Bandwidth =
    Bandwidth::bits_per(10_000_000, Duration::from_secs(1));

/// Default long-run shaping rate: 800 KiB/s.
///
/// Kept well below [`DEFAULT_LINK_CAPACITY`] so that shaping policy,
/// not wire speed, is the bottleneck.
pub const DEFAULT_TOKEN_RATE: Bandwidth =
    Bandwidth::new(800 * 1_024, Duration::from_secs(1));

/// Default burst allowance of the token bucket: 100 KiB.
pub const DEFAULT_BUCKET_CAPACITY: u64 = 100 * 1_024;

/// Default tail-drop threshold of the packet queue, in packets.
pub const DEFAULT_QUEUE_MAX_SIZE: usize = 1_000;

/// Default cadence of the statistics collector.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// How long the shaper sleeps when the queue is empty or the bucket
/// has no credit.
///
/// A throughput versus CPU trade-off: short enough that the shaper
/// wakes promptly when tokens accrue, long enough not to spin.
pub const SHAPER_IDLE_BACKOFF: Duration = Duration::from_micros(100);

/// How long the pipeline waits between stopping the traffic sources
/// and stopping the shaper, letting buffered packets drain.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_millis(500);
