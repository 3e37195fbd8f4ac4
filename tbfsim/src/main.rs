use anyhow::{bail, Result};
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use tbfsim::{Report, Scenario, Simulation};
use tracing_subscriber::EnvFilter;

/// User-space token bucket traffic shaping and QoS simulator.
#[derive(Parser)]
#[command(name = "tbfsim", version, about)]
struct Command {
    /// Scenario to run: 1 basic shaping, 2 priority QoS, 3 bursty
    /// traffic, 4 all of them
    scenario: u8,

    /// How long each scenario runs, in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Directory receiving the CSV artifacts
    #[arg(long, default_value = "results")]
    output: PathBuf,
}

fn banner() {
    println!();
    println!("+---------------------------------------------------------------+");
    println!("|   Network Traffic Shaping and QoS Simulator                   |");
    println!("|   Token Bucket Filter (TBF) Implementation                    |");
    println!("+---------------------------------------------------------------+");
    println!();
}

fn print_configuration(scenario: Scenario) {
    let config = scenario.config();

    println!("Simulation Configuration:");
    println!("-------------------------");
    println!("Link Capacity:     {}", config.link_capacity);
    println!("Token Rate:        {}", config.token_rate);
    println!("Bucket Size:       {} KB", config.bucket_capacity / 1_024);
    println!("Max Queue Size:    {} packets", config.queue_max_size);
    println!();
    println!("Flows:");
    for flow in scenario.flows() {
        println!(
            "  Flow {}: {} ({}, {} priority)",
            flow.id, flow.target_rate, flow.kind, flow.priority
        );
    }
    println!();
}

fn run_scenario(scenario: Scenario, duration: Duration, output: &PathBuf) -> Result<()> {
    println!("========== Scenario: {} ==========", scenario.title());
    println!("{}", scenario.description());
    println!();

    print_configuration(scenario);

    let mut simulation = Simulation::new(scenario.config(), &scenario.flows())?;

    println!("Starting simulation...");
    simulation.run_for(duration);
    println!("Stopping simulation...");

    let report = Report::new(simulation.flow_ids(), simulation.history());
    println!();
    print!("{}", report.render_summary());

    let path = output.join(scenario.csv_name());
    match report.save_csv(&path) {
        Ok(()) => println!("Statistics saved to: {}", path.display()),
        // a failed CSV write is reported, never fatal
        Err(error) => eprintln!("Could not save statistics: {error:#}"),
    }
    println!();

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let command = Command::parse();

    banner();

    let Some(scenarios) = Scenario::select(command.scenario) else {
        bail!(
            "Invalid scenario number {}. Please choose 1-4.",
            command.scenario
        );
    };

    let duration = Duration::from_secs(command.duration);
    for scenario in scenarios {
        run_scenario(scenario, duration, &command.output)?;
    }

    println!("========== Simulation Complete ==========");

    Ok(())
}
