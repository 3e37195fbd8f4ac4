use anyhow::{anyhow, bail};
use std::{
    fmt, str,
    time::{Duration, Instant},
};

/// Scheduling class of a [`Packet`].
///
/// Priorities are totally ordered; the shaping pipeline always serves a
/// higher class before any waiting packet of a lower class.
///
/// ```
/// # use tbfsim_core::packet::Priority;
/// assert!(Priority::Critical > Priority::High);
/// assert!(Priority::High > Priority::Medium);
/// assert!(Priority::Medium > Priority::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => "low".fmt(f),
            Self::Medium => "medium".fmt(f),
            Self::High => "high".fmt(f),
            Self::Critical => "critical".fmt(f),
        }
    }
}

impl str::FromStr for Priority {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => bail!("Unknown priority `{other}' (expected low, medium, high or critical)"),
        }
    }
}

/// The identifier of a traffic source in the simulated system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId(u32);

impl FlowId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn into_inner(self) -> u32 {
        self.0
    }
}

impl str::FromStr for FlowId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The unit of traffic travelling through the shaping pipeline.
///
/// A packet is created by a traffic source, buffered by the
/// [`PacketQueue`] and finally stamped by the shaper when its bytes
/// have been put on the simulated wire. At any moment it is in exactly
/// one of three states: in flight (buffered or being serialized),
/// transmitted (stamped), or rejected at enqueue (accounted by the
/// queue and the flow counters, the packet itself is discarded).
///
/// [`PacketQueue`]: crate::queue::PacketQueue
#[derive(Debug, Clone)]
pub struct Packet {
    flow: FlowId,
    size: u64,
    priority: Priority,
    created: Instant,
    transmitted: Option<Instant>,
}

impl Packet {
    pub fn new(flow: FlowId, size: u64, priority: Priority) -> Self {
        Self::new_at(flow, size, priority, Instant::now())
    }

    pub(crate) fn new_at(flow: FlowId, size: u64, priority: Priority, created: Instant) -> Self {
        Self {
            flow,
            size,
            priority,
            created,
            transmitted: None,
        }
    }

    /// the source this packet belongs to
    #[inline]
    pub fn flow(&self) -> FlowId {
        self.flow
    }

    /// the packet size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// when the packet was generated by its source
    #[inline]
    pub fn created(&self) -> Instant {
        self.created
    }

    /// stamp the packet as put on the wire
    ///
    /// A packet is transmitted at most once; stamping twice is a logic
    /// error in the pipeline.
    pub fn mark_transmitted(&mut self, time: Instant) {
        debug_assert!(
            self.transmitted.is_none(),
            "packet transmitted a second time"
        );
        self.transmitted = Some(time);
    }

    #[inline]
    pub fn is_transmitted(&self) -> bool {
        self.transmitted.is_some()
    }

    /// time spent between generation and transmission
    ///
    /// Only defined for transmitted packets. [`Instant`] is monotonic
    /// so the value is never negative.
    pub fn delay(&self) -> Option<Duration> {
        self.transmitted
            .map(|transmitted| transmitted.duration_since(self.created))
    }

    /// the queueing + serialization delay in milliseconds
    pub fn delay_ms(&self) -> Option<f64> {
        self.delay().map(|delay| delay.as_secs_f64() * 1_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        let mut priorities = [
            Priority::High,
            Priority::Low,
            Priority::Critical,
            Priority::Medium,
        ];
        priorities.sort();

        assert_eq!(
            priorities,
            [
                Priority::Low,
                Priority::Medium,
                Priority::High,
                Priority::Critical,
            ]
        );
    }

    #[test]
    fn priority_round_trip() {
        for priority in [
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ] {
            assert_eq!(
                priority.to_string().parse::<Priority>().unwrap(),
                priority
            );
        }

        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn flow_id_round_trip() {
        assert_eq!("42".parse::<FlowId>().unwrap(), FlowId::new(42));
        assert_eq!(FlowId::new(42).to_string(), "42");
    }

    #[test]
    fn delay_undefined_until_transmitted() {
        let packet = Packet::new(FlowId::new(1), 512, Priority::Medium);

        assert!(!packet.is_transmitted());
        assert_eq!(packet.delay(), None);
        assert_eq!(packet.delay_ms(), None);
    }

    #[test]
    fn delay_is_non_negative() {
        let created = Instant::now();
        let mut packet = Packet::new_at(FlowId::new(1), 512, Priority::Medium, created);

        packet.mark_transmitted(created + Duration::from_millis(3));

        assert!(packet.is_transmitted());
        assert_eq!(packet.delay(), Some(Duration::from_millis(3)));
        assert_eq!(packet.delay_ms(), Some(3.0));
    }

    #[test]
    #[should_panic(expected = "packet transmitted a second time")]
    fn transmitting_twice_is_a_logic_error() {
        let mut packet = Packet::new(FlowId::new(1), 512, Priority::Medium);

        packet.mark_transmitted(Instant::now());
        packet.mark_transmitted(Instant::now());
    }
}
