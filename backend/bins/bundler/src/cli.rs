use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Coordinated multi-wallet token launch
///
/// Simulates allocations against the launch curve, then funds, purchases, and reclaims for every
/// participant wallet in bundled transactions.
#[derive(Parser, Debug)]
#[command(name = "bundler", version, about, long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Run contributions through the curve and persist the resulting allocations.
  Simulate(SimulateArgs),
  /// Transfer each participant's purchase funds from the payer.
  Fund,
  /// Purchase every participant's allocation.
  Launch,
  /// Sweep participant balances back to the payer and clear allocations.
  Reclaim,
  /// Remove participant allocations, keeping the reserved keys.
  Clear,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SimulateArgs {
  /// JSON file: `[{ "participant": "<pubkey>", "amount": "0.5" }]`
  #[arg(long)]
  pub contributions: PathBuf,

  /// Print the outcome without writing the allocation store
  #[arg(long, default_value_t = false)]
  pub dry_run: bool,
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
  }

  #[test]
  fn simulate_takes_a_file_and_an_optional_dry_run() {
    let cli = Cli::try_parse_from(["bundler", "simulate", "--contributions", "plan.json", "--dry-run"]).unwrap();
    assert_eq!(
      cli.command,
      Command::Simulate(SimulateArgs { contributions: PathBuf::from("plan.json"), dry_run: true })
    );

    let cli = Cli::try_parse_from(["bundler", "reclaim"]).unwrap();
    assert_eq!(cli.command, Command::Reclaim);
  }

  #[test]
  fn simulate_without_contributions_is_rejected() {
    assert!(Cli::try_parse_from(["bundler", "simulate"]).is_err());
  }
}
