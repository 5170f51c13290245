pub mod allocation;
pub mod constants;
pub mod error;
pub mod math;
pub mod participant;
pub mod reserve;
pub mod units;

pub use allocation::{
  simulate, AllocationRecord, Contribution, SimulationOutcome, SkipReason, SkippedContribution,
};
pub use error::CurveError;
pub use participant::Participant;
pub use reserve::{Quote, ReserveState};
