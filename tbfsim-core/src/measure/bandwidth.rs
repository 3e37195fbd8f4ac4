use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};

/// A [`Bandwidth`] describes how many bytes can be processed during a
/// certain [`Duration`].
///
/// It is used in two roles: as the *shaping rate* of a token bucket
/// (the long-run credit accrual) and as the *wire capacity* of the
/// simulated link (the serialization speed). The two are different
/// policies over the same measure.
///
/// # Example
///
/// ```
/// # use tbfsim_core::measure::Bandwidth;
/// # use std::time::Duration;
/// // 2000 bytes every millisecond
/// let bw = Bandwidth::new(2_000, Duration::from_millis(1));
/// // how many bytes fit in the given elapsed time
/// let capacity = bw.capacity(Duration::from_micros(1));
/// # assert_eq!(capacity, 2);
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bandwidth {
    /// bytes that can be processed per _duration_
    data: u64,
    /// the duration during which we can process _data_
    per: Duration,
}

impl Bandwidth {
    /// the maximum representable bandwidth, used where a component
    /// should effectively never be the bottleneck
    pub const MAX: Self = Self::new(u64::MAX, Duration::from_secs(1));

    /// create a new [`Bandwidth`] of `data` bytes per `per`
    ///
    /// ```
    /// # use tbfsim_core::measure::Bandwidth;
    /// # use std::time::Duration;
    /// // 400 KiB/s, the kind of value used for a flow's target rate
    /// let rate = Bandwidth::new(400 * 1_024, Duration::from_secs(1));
    /// # assert_eq!(rate.capacity(Duration::from_secs(1)), 400 * 1_024);
    /// ```
    pub const fn new(data: u64, per: Duration) -> Self {
        Self { data, per }
    }

    /// create a new [`Bandwidth`] from a bit count, rounding down to
    /// whole bytes
    ///
    /// Link capacities are customarily quoted in bits per second
    /// (`10mbit` for a 10 Mb/s wire); this constructor keeps the
    /// conversion in one place.
    ///
    /// ```
    /// # use tbfsim_core::measure::Bandwidth;
    /// # use std::time::Duration;
    /// let wire = Bandwidth::bits_per(10_000_000, Duration::from_secs(1));
    /// assert_eq!(wire.capacity(Duration::from_secs(1)), 1_250_000);
    /// ```
    pub const fn bits_per(bits: u64, per: Duration) -> Self {
        Self::new(bits / 8, per)
    }

    /// the base time of the bandwidth
    pub fn time_base(&self) -> Duration {
        self.per
    }

    /// how many bytes per [`Self::time_base`]
    pub fn data_base(&self) -> u64 {
        self.data
    }

    /// returns how many bytes can be transferred during the elapsed
    /// time
    ///
    /// this function has a microsecond precision to compute the data
    /// capacity for a given duration. The remainder below one byte is
    /// discarded; callers that care about sub-byte credit (the token
    /// bucket does) should keep their own reference point instead of
    /// accumulating repeated small calls.
    ///
    /// ```
    /// # use tbfsim_core::measure::Bandwidth;
    /// # use std::time::Duration;
    /// let bw = Bandwidth::new(1, Duration::from_micros(1));
    /// let capacity = bw.capacity(Duration::from_secs(1));
    /// # assert_eq!(capacity, 1_000_000);
    /// ```
    pub fn capacity(&self, elapsed: Duration) -> u64 {
        let elapsed = elapsed.as_micros();
        let time_base = self.time_base().as_micros();
        let data_base = self.data_base() as u128;

        data_base.saturating_mul(elapsed).saturating_div(time_base) as u64
    }

    /// the time it takes to put `bytes` on a wire of this bandwidth
    ///
    /// This is the inverse of [`Self::capacity`]: serialization delay
    /// at microsecond precision. A zero bandwidth never completes.
    ///
    /// ```
    /// # use tbfsim_core::measure::Bandwidth;
    /// # use std::time::Duration;
    /// let wire = Bandwidth::bits_per(10_000_000, Duration::from_secs(1));
    /// assert_eq!(
    ///     wire.transmission_delay(1_500),
    ///     Duration::from_micros(1_200),
    /// );
    /// ```
    pub fn transmission_delay(&self, bytes: u64) -> Duration {
        if self.data == 0 {
            return Duration::MAX;
        }

        let time_base = self.time_base().as_micros();
        let micros = (bytes as u128)
            .saturating_mul(time_base)
            .saturating_div(self.data as u128);

        Duration::from_micros(micros.min(u64::MAX as u128) as u64)
    }
}

const K: u64 = 1_024;
const M: u64 = 1_024 * 1_024;
const G: u64 = 1_024 * 1_024 * 1_024;

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let capacity = self.capacity(Duration::from_secs(1));

        let v = capacity;
        let k = capacity / K;
        let m = capacity / M;
        let g = capacity / G;

        let v_r = capacity % K;
        let k_r = capacity % M;
        let m_r = capacity % G;

        if v < K || v_r != 0 {
            write!(f, "{v}bps")
        } else if v < M || k_r != 0 {
            write!(f, "{k}kbps")
        } else if v < G || m_r != 0 {
            write!(f, "{m}mbps")
        } else {
            write!(f, "{g}gbps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum BandwidthToken {
    #[regex("bps")]
    Bps,
    #[regex("kbps")]
    Kbps,
    #[regex("mbps")]
    Mbps,
    #[regex("gbps")]
    Gbps,

    #[regex("bit")]
    Bit,
    #[regex("kbit")]
    Kbit,
    #[regex("mbit")]
    Mbit,
    #[regex("gbit")]
    Gbit,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for Bandwidth {
    type Err = anyhow::Error;

    /// parse a bandwidth from its text form
    ///
    /// Byte units (`bps`, `kbps`, `mbps`, `gbps`) are 1024-multiples of
    /// bytes per second. Bit units (`bit`, `kbit`, `mbit`, `gbit`) are
    /// decimal multiples of bits per second, the convention for link
    /// capacities.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, BandwidthToken>::new(s);

        let Some(Ok(BandwidthToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: u64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let bandwidth = match token {
            BandwidthToken::Bps => Self::new(number, Duration::from_secs(1)),
            BandwidthToken::Kbps => Self::new(number * K, Duration::from_secs(1)),
            BandwidthToken::Mbps => Self::new(number * M, Duration::from_secs(1)),
            BandwidthToken::Gbps => Self::new(number * G, Duration::from_secs(1)),
            BandwidthToken::Bit => Self::bits_per(number, Duration::from_secs(1)),
            BandwidthToken::Kbit => Self::bits_per(number * 1_000, Duration::from_secs(1)),
            BandwidthToken::Mbit => Self::bits_per(number * 1_000_000, Duration::from_secs(1)),
            BandwidthToken::Gbit => Self::bits_per(number * 1_000_000_000, Duration::from_secs(1)),
            BandwidthToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a bandwidth"
        );

        Ok(bandwidth)
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        Bandwidth::MAX
    }
}
