use crate::{config::SizeRange, defaults::REFERENCE_PACKET_SIZE, measure::Bandwidth};
use anyhow::bail;
use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaChaRng;
use std::{fmt, str, time::Duration};

/// The arrival process of a traffic source.
///
/// The process controls the spacing between packet generations, not
/// the packet sizes (those are uniform in the configured range for
/// every kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrivalKind {
    /// deterministic spacing matching the target rate exactly
    Constant,
    /// alternating burst (3x rate, 30% of the time) and idle
    /// (0.5x rate) spacing
    ///
    /// The long-run mean works out to roughly 1.25x the configured
    /// rate. The burst/idle *shape* is the point of this process, not
    /// precise adherence to the target.
    Bursty,
    /// memoryless spacing, exponentially distributed around the target
    /// rate
    Poisson,
}

impl fmt::Display for ArrivalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant => "constant".fmt(f),
            Self::Bursty => "bursty".fmt(f),
            Self::Poisson => "poisson".fmt(f),
        }
    }
}

impl str::FromStr for ArrivalKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "bursty" => Ok(Self::Bursty),
            "poisson" => Ok(Self::Poisson),
            other => bail!("Unknown arrival kind `{other}' (expected constant, bursty or poisson)"),
        }
    }
}

/// Draws packet sizes and inter-arrival gaps for one traffic source.
///
/// The sampler owns its PRNG and is only ever touched from the
/// producer thread of its flow, so it needs no synchronisation. Use
/// [`ArrivalSampler::seeded`] to make a sequence reproducible.
pub struct ArrivalSampler {
    kind: ArrivalKind,
    /// target rate in bytes per second
    rate: u64,
    sizes: SizeRange,
    rng: ChaChaRng,
}

impl fmt::Debug for ArrivalSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrivalSampler")
            .field("kind", &self.kind)
            .field("rate", &self.rate)
            .field("sizes", &self.sizes)
            .finish_non_exhaustive()
    }
}

impl ArrivalSampler {
    /// create a sampler seeded from the operating system entropy
    pub fn new(kind: ArrivalKind, rate: Bandwidth, sizes: SizeRange) -> Self {
        Self::with_rng(kind, rate, sizes, ChaChaRng::from_entropy())
    }

    /// create a reproducible sampler from a `u64` seed
    pub fn seeded(kind: ArrivalKind, rate: Bandwidth, sizes: SizeRange, seed: u64) -> Self {
        Self::with_rng(kind, rate, sizes, ChaChaRng::seed_from_u64(seed))
    }

    fn with_rng(kind: ArrivalKind, rate: Bandwidth, sizes: SizeRange, rng: ChaChaRng) -> Self {
        Self {
            kind,
            rate: rate.capacity(Duration::from_secs(1)),
            sizes,
            rng,
        }
    }

    /// draw the next packet size, uniform in the configured range
    pub fn next_size(&mut self) -> u64 {
        self.rng.gen_range(self.sizes.min..=self.sizes.max)
    }

    /// draw the gap to wait before generating the next packet
    ///
    /// The gap is computed against [`REFERENCE_PACKET_SIZE`] rather
    /// than the actually drawn sizes, so the packet *count* per second
    /// tracks `rate / REFERENCE_PACKET_SIZE` for every kind.
    pub fn next_gap(&mut self) -> Duration {
        let reference = REFERENCE_PACKET_SIZE * 1_000_000;

        let micros = match self.kind {
            ArrivalKind::Constant => reference / self.rate,
            ArrivalKind::Bursty => {
                if self.rng.gen::<f64>() < 0.3 {
                    // burst period: three times the configured rate
                    reference / (self.rate * 3)
                } else {
                    // idle period: half the configured rate
                    reference * 2 / self.rate
                }
            }
            ArrivalKind::Poisson => {
                // inverse transform of the exponential distribution
                // with rate/REFERENCE events per second
                let uniform: f64 = self.rng.gen();
                let events_per_sec = self.rate as f64 / REFERENCE_PACKET_SIZE as f64;
                let gap_secs = -(1.0 - uniform).ln() / events_per_sec;
                (gap_secs * 1_000_000.0) as u64
            }
        };

        Duration::from_micros(micros)
    }
}
