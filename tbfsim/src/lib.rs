/*!
# Token bucket traffic shaping, the real-time pipeline

This crate drives the passive data model of [`tbfsim_core`] with real
threads and the real clock:

* [`TrafficGenerator`] — one producer thread per flow, pacing packet
  creation with the flow's arrival process;
* [`TrafficShaper`] — the single consumer, gating each packet on token
  credit and then sleeping its serialization time;
* [`StatisticsCollector`] — a sampler producing the run's time series;
* [`Simulation`] — assembly and the start/stop choreography;
* [`Report`] — CSV artifact and console summary;
* [`Scenario`] — the canned parameter sets behind the CLI.

Because the pipeline runs against the wall clock, results are
statistical rather than exact: throughput tracks the configured rates
within scheduling noise, and the test suite asserts envelopes, not
precise byte counts.
*/

mod collector;
mod generator;
mod report;
mod scenario;
mod shaper;
mod simulation;

pub use self::{
    collector::StatisticsCollector,
    generator::TrafficGenerator,
    report::Report,
    scenario::Scenario,
    shaper::TrafficShaper,
    simulation::Simulation,
};
