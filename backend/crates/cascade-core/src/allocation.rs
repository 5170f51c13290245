//! Allocation simulator
//!
//! Walks an ordered list of contributions through the constant-product curve, granting each
//! participant output from the depleting real reserve. The walk is a pure function of the
//! initial reserve and the input order, so a replay reproduces the same records and can be used
//! to re-validate a persisted allocation.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  error::CurveError,
  math::share_percent,
  participant::Participant,
  reserve::ReserveState,
  units::parse_native_amount,
};

/// One participant's requested input, as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
  pub participant: Participant,
  /// Lamports, or None when the supplied amount was not a number
  pub amount: Option<u64>,
}

impl Contribution {
  pub fn new(participant: Participant, lamports: u64) -> Self {
    Self { participant, amount: Some(lamports) }
  }

  /// Build a contribution from a native-unit decimal string such as "0.5"
  pub fn parse(participant: Participant, raw: &str) -> Self {
    Self { participant, amount: parse_native_amount(raw) }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
  pub participant: Participant,
  /// Input in lamports
  pub contributed: u64,
  /// Output in token base units
  pub granted: u64,
  pub share_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  NotANumber,
  NonPositive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContribution {
  pub participant: Participant,
  pub reason: SkipReason,
}

/// Everything a caller needs to accept a simulation or run it again with other inputs
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
  pub initial: ReserveState,
  pub final_reserve: ReserveState,
  pub records: Vec<AllocationRecord>,
  pub skipped: Vec<SkippedContribution>,
}

impl SimulationOutcome {
  pub fn total_granted(&self) -> u64 {
    self.records.iter().map(|r| r.granted).sum()
  }

  pub fn total_contributed(&self) -> u128 {
    self.records.iter().map(|r| r.contributed as u128).sum()
  }

  pub fn total_share_percent(&self) -> f64 {
    share_percent(self.total_granted())
  }
}

/// Run every contribution through the curve in order
///
/// # Arguments
/// * `reserve` - Reserve to mutate; reflects every accepted contribution on return
/// * `contributions` - Ordered inputs; zero or unparseable amounts are skipped
///
/// # Returns
/// One record per accepted contribution, in input order
pub fn simulate(
  reserve: &mut ReserveState,
  contributions: &[Contribution],
) -> Result<SimulationOutcome, CurveError> {
  reserve.validate()?;
  let initial = *reserve;
  let mut records = Vec::with_capacity(contributions.len());
  let mut skipped = Vec::new();

  for contribution in contributions {
    let participant = contribution.participant;
    let input = match contribution.amount {
      Some(0) => {
        warn!(%participant, "Non-positive contribution, skipping");
        skipped.push(SkippedContribution { participant, reason: SkipReason::NonPositive });
        continue;
      }
      Some(amount) => amount,
      None => {
        warn!(%participant, "Contribution is not a number, skipping");
        skipped.push(SkippedContribution { participant, reason: SkipReason::NotANumber });
        continue;
      }
    };

    let granted = reserve.apply(input)?;
    let record = AllocationRecord {
      participant,
      contributed: input,
      granted,
      share_percent: share_percent(granted),
    };

    debug!(
      %participant,
      contributed = input,
      granted,
      share_percent = record.share_percent,
      real_output = reserve.real_output,
      "Allocation simulated"
    );
    records.push(record);
  }

  Ok(SimulationOutcome { initial, final_reserve: *reserve, records, skipped })
}
