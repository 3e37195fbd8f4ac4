use anyhow::{ensure, Context as _, Result};
use std::{
    fmt::Write as _,
    io::Write as _,
    path::Path,
};
use tbfsim_core::{FlowId, FlowStats, SystemStats};

/// The time series of one simulation run, ready for serialization.
///
/// Columns follow flow registration order: the fixed system columns
/// first, then `Flow<id>_Throughput, Flow<id>_Delay, Flow<id>_DropRate`
/// for each flow. Throughput is bytes per second, delay milliseconds,
/// drop rate a fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub flow_ids: Vec<FlowId>,
    pub history: Vec<SystemStats>,
}

impl Report {
    pub fn new(flow_ids: Vec<FlowId>, history: Vec<SystemStats>) -> Self {
        Self { flow_ids, history }
    }

    /// render the history as CSV
    ///
    /// Timestamps are fixed at three decimals; every other numeric
    /// column uses the shortest representation that parses back to the
    /// same value, so a rendered report is a stable fixpoint of
    /// [`Report::parse_csv`].
    pub fn to_csv(&self) -> String {
        let mut out = String::new();

        out.push_str("Timestamp,QueueOccupancy,TotalPackets,TotalBytes,AggregateThroughput");
        for id in &self.flow_ids {
            let _ = write!(
                out,
                ",Flow{id}_Throughput,Flow{id}_Delay,Flow{id}_DropRate"
            );
        }
        out.push('\n');

        for sample in &self.history {
            let _ = write!(
                out,
                "{:.3},{},{},{},{}",
                sample.timestamp,
                sample.queue_occupancy,
                sample.total_packets_transmitted,
                sample.total_bytes_transmitted,
                sample.aggregate_throughput,
            );
            for flow in &sample.flows {
                let _ = write!(
                    out,
                    ",{},{},{}",
                    flow.throughput, flow.average_delay_ms, flow.drop_rate
                );
            }
            out.push('\n');
        }

        out
    }

    /// write the CSV artifact, creating parent directories as needed
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(self.to_csv().as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// parse a CSV artifact back into a report
    ///
    /// The CSV carries the derived per-flow columns only; the absolute
    /// per-flow counters (`packets_sent` and friends) are not part of
    /// the serialization and read back as zero.
    pub fn parse_csv(input: &str) -> Result<Self> {
        let mut lines = input.lines();

        let header = lines.next().context("Empty input, expected a CSV header")?;
        let mut columns = header.split(',');

        for expected in [
            "Timestamp",
            "QueueOccupancy",
            "TotalPackets",
            "TotalBytes",
            "AggregateThroughput",
        ] {
            let column = columns.next().context("Truncated CSV header")?;
            ensure!(
                column == expected,
                "Unexpected column `{column}', expected `{expected}'"
            );
        }

        let mut flow_ids = Vec::new();
        let columns: Vec<&str> = columns.collect();
        ensure!(
            columns.len() % 3 == 0,
            "Expected three columns per flow, found {} trailing columns",
            columns.len()
        );
        for triplet in columns.chunks(3) {
            let id = triplet[0]
                .strip_prefix("Flow")
                .and_then(|rest| rest.strip_suffix("_Throughput"))
                .with_context(|| format!("Malformed flow column `{}'", triplet[0]))?;
            flow_ids.push(id.parse::<FlowId>()?);
        }

        let mut history = Vec::new();
        for (row, line) in lines.enumerate() {
            let mut fields = line.split(',');
            let mut next = |name: &str| {
                fields
                    .next()
                    .with_context(|| format!("Row {row}: missing {name}"))
            };

            let timestamp: f64 = next("Timestamp")?.parse()?;
            let queue_occupancy: usize = next("QueueOccupancy")?.parse()?;
            let total_packets_transmitted: u64 = next("TotalPackets")?.parse()?;
            let total_bytes_transmitted: u64 = next("TotalBytes")?.parse()?;
            let aggregate_throughput: f64 = next("AggregateThroughput")?.parse()?;

            let mut flows = Vec::with_capacity(flow_ids.len());
            for id in &flow_ids {
                flows.push(FlowStats {
                    flow: *id,
                    packets_sent: 0,
                    packets_dropped: 0,
                    bytes_transmitted: 0,
                    throughput: next("Throughput")?.parse()?,
                    average_delay_ms: next("Delay")?.parse()?,
                    drop_rate: next("DropRate")?.parse()?,
                });
            }
            ensure!(
                fields.next().is_none(),
                "Row {row}: trailing fields beyond the declared flows"
            );

            history.push(SystemStats {
                timestamp,
                queue_occupancy,
                total_packets_transmitted,
                total_bytes_transmitted,
                aggregate_throughput,
                flows,
            });
        }

        Ok(Self { flow_ids, history })
    }

    /// the end-of-run console summary
    pub fn render_summary(&self) -> String {
        let mut out = String::new();

        let Some(last) = self.history.last() else {
            out.push_str("No statistics collected.\n");
            return out;
        };

        let _ = writeln!(out, "========== Simulation Summary ==========");
        let _ = writeln!(out, "Duration: {:.3} seconds", last.timestamp);
        let _ = writeln!(
            out,
            "Total Packets Transmitted: {}",
            last.total_packets_transmitted
        );
        let _ = writeln!(
            out,
            "Total Bytes Transmitted: {}",
            last.total_bytes_transmitted
        );
        let _ = writeln!(
            out,
            "Average Aggregate Throughput: {:.2} KB/s",
            last.aggregate_throughput / 1_024.0
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Per-Flow Statistics:");
        let _ = writeln!(
            out,
            "{:>8} {:>11} {:>11} {:>11} {:>17} {:>14}",
            "FlowID", "Sent", "Dropped", "DropRate%", "Throughput(KB/s)", "AvgDelay(ms)"
        );
        let _ = writeln!(out, "{}", "-".repeat(76));

        for flow in &last.flows {
            let _ = writeln!(
                out,
                "{:>8} {:>11} {:>11} {:>11.2} {:>17.2} {:>14.3}",
                flow.flow,
                flow.packets_sent,
                flow.packets_dropped,
                flow.drop_rate * 100.0,
                flow.throughput / 1_024.0,
                flow.average_delay_ms,
            );
        }
        let _ = writeln!(out, "{}", "=".repeat(40));

        out
    }
}
