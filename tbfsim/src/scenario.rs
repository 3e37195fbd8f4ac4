use std::time::Duration;
use tbfsim_core::{
    ArrivalKind, Bandwidth, FlowConfig, FlowId, Priority, SimulationConfig, SizeRange,
};

const SECOND: Duration = Duration::from_secs(1);

const fn kibps(value: u64) -> Bandwidth {
    Bandwidth::new(value * 1_024, SECOND)
}

/// Canned parameter sets exercising different corners of the shaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// three identical constant-rate flows oversubscribing the token
    /// bucket: plain shaping behaviour and fairness under pressure
    BasicShaping,
    /// three constant-rate flows at distinct priorities contending for
    /// two thirds of their offered load: the QoS ordering at work
    PriorityQos,
    /// a bursty, a constant and a Poisson flow sharing the bucket:
    /// burst absorption and buffer behaviour
    BurstyTraffic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::BasicShaping,
        Scenario::PriorityQos,
        Scenario::BurstyTraffic,
    ];

    /// resolve a command line selector: `1`-`3` pick one scenario,
    /// `4` runs them all
    pub fn select(selector: u8) -> Option<Vec<Scenario>> {
        match selector {
            1 => Some(vec![Scenario::BasicShaping]),
            2 => Some(vec![Scenario::PriorityQos]),
            3 => Some(vec![Scenario::BurstyTraffic]),
            4 => Some(Self::ALL.to_vec()),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::BasicShaping => "Basic Traffic Shaping",
            Self::PriorityQos => "Priority-Based QoS",
            Self::BurstyTraffic => "Bursty Traffic Handling",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::BasicShaping => "Testing TBF with 3 constant-rate flows",
            Self::PriorityQos => "Testing QoS with different priority flows",
            Self::BurstyTraffic => "Testing TBF with a mix of bursty and constant flows",
        }
    }

    /// the name of the CSV artifact this scenario produces
    pub fn csv_name(self) -> &'static str {
        match self {
            Self::BasicShaping => "scenario1_stats.csv",
            Self::PriorityQos => "scenario2_stats.csv",
            Self::BurstyTraffic => "scenario3_stats.csv",
        }
    }

    pub fn config(self) -> SimulationConfig {
        let base = SimulationConfig {
            link_capacity: Bandwidth::bits_per(10_000_000, SECOND),
            sample_interval: Duration::from_millis(100),
            packet_sizes: SizeRange::default(),
            ..SimulationConfig::default()
        };

        match self {
            Self::BasicShaping => SimulationConfig {
                token_rate: kibps(800),
                bucket_capacity: 100 * 1_024,
                queue_max_size: 500,
                ..base
            },
            Self::PriorityQos => SimulationConfig {
                token_rate: kibps(600),
                bucket_capacity: 80 * 1_024,
                queue_max_size: 400,
                ..base
            },
            Self::BurstyTraffic => SimulationConfig {
                token_rate: kibps(700),
                // a larger bucket to absorb the bursts
                bucket_capacity: 150 * 1_024,
                queue_max_size: 600,
                ..base
            },
        }
    }

    pub fn flows(self) -> Vec<FlowConfig> {
        let flow = |id, kind, rate, priority| FlowConfig {
            id: FlowId::new(id),
            kind,
            target_rate: kibps(rate),
            priority,
        };

        match self {
            Self::BasicShaping => vec![
                flow(1, ArrivalKind::Constant, 400, Priority::Medium),
                flow(2, ArrivalKind::Constant, 400, Priority::Medium),
                flow(3, ArrivalKind::Constant, 400, Priority::Medium),
            ],
            Self::PriorityQos => vec![
                flow(1, ArrivalKind::Constant, 300, Priority::High),
                flow(2, ArrivalKind::Constant, 300, Priority::Medium),
                flow(3, ArrivalKind::Constant, 300, Priority::Low),
            ],
            Self::BurstyTraffic => vec![
                flow(1, ArrivalKind::Bursty, 400, Priority::Medium),
                flow(2, ArrivalKind::Constant, 300, Priority::Medium),
                flow(3, ArrivalKind::Poisson, 350, Priority::Medium),
            ],
        }
    }
}
