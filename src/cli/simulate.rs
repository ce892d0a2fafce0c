use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use pagewatch_cli::scenario::{run_scenario, Scenario, ScenarioReport};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Scenario file (.yaml, .yml or .json)
    pub scenario: PathBuf,

    /// Start with the filter enabled regardless of configuration
    #[arg(long)]
    pub enabled: bool,
}

pub async fn cmd_simulate(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let mut scenario = Scenario::from_path(&args.scenario)?;
    if args.enabled {
        scenario.enabled = Some(true);
    }
    info!(path = %args.scenario.display(), steps = scenario.steps.len(), "running scenario");
    let report = run_scenario(&scenario, ctx.config().clone()).await?;

    match ctx.output() {
        OutputFormat::Human => print_human(&report),
        format => emit(&report, format)?,
    }
    Ok(())
}

fn print_human(report: &ScenarioReport) {
    println!("Location: {}", report.location);
    println!("Toggle:   {}", report.label);
    println!(
        "Filter:   {}",
        if report.state.enabled { "enabled" } else { "disabled" }
    );
    println!();
    for item in &report.items {
        let name = item.id.clone().unwrap_or_else(|| item.node.to_string());
        let price = item.price_text.as_deref().unwrap_or("-");
        let mark = if item.visible { "shown " } else { "hidden" };
        println!("  [{mark}] {name:<24} {price}");
    }
    println!();
    println!(
        "{} passes, {} batches, {} visibility writes",
        report.metrics.controller.refreshes,
        report.metrics.observer.batches,
        report.metrics.filter.visibility_writes
    );
}
