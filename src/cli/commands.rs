use clap::Subcommand;

use super::config::ConfigArgs;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay a scripted page scenario against the budget filter
    Simulate(SimulateArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),

    /// Show build information and counters
    Info,
}
