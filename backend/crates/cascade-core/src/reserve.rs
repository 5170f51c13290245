//! Constant-product reserve pair for the launch curve
//! Only the allocation simulator mutates it

use serde::{Deserialize, Serialize};

use crate::{
  constants::{INITIAL_REAL_OUTPUT, INITIAL_VIRTUAL_OUTPUT, VIRTUAL_INPUT_BASELINE},
  error::CurveError,
  math::output_reserve_floor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveState {
  /// Input reserve including the unbacked baseline
  pub virtual_input: u64,

  /// Output reserve including the unbacked baseline
  pub virtual_output: u64,

  /// Backed output; bounds everything that can ever be granted
  pub real_output: u64,
}

/// Result of pricing one input against the curve without committing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
  pub next_virtual_input: u64,
  pub tentative: u64,
  pub granted: u64,
}

impl ReserveState {
  pub fn new(virtual_input: u64, virtual_output: u64, real_output: u64) -> Result<Self, CurveError> {
    let state = Self { virtual_input, virtual_output, real_output };
    state.validate()?;
    Ok(state)
  }

  /// Fresh curve: 30 SOL virtual input, 1.073B virtual and 793.1M real tokens
  pub fn launch() -> Self {
    Self {
      virtual_input: VIRTUAL_INPUT_BASELINE,
      virtual_output: INITIAL_VIRTUAL_OUTPUT,
      real_output: INITIAL_REAL_OUTPUT,
    }
  }

  pub fn validate(&self) -> Result<(), CurveError> {
    if self.virtual_input == 0 {
      return Err(CurveError::ZeroReserve);
    }
    if self.real_output > self.virtual_output {
      return Err(CurveError::RealExceedsVirtual {
        real: self.real_output,
        virtual_output: self.virtual_output,
      });
    }
    Ok(())
  }

  /// Price an input against the current reserves
  ///
  /// # Arguments
  /// * `input` - Input amount in lamports
  ///
  /// # Returns
  /// The tentative grant from the invariant and the grant after clamping to real output
  pub fn quote(&self, input: u64) -> Result<Quote, CurveError> {
    if self.virtual_input == 0 {
      return Err(CurveError::ZeroReserve);
    }

    let next_virtual_input = self
      .virtual_input
      .checked_add(input)
      .ok_or(CurveError::MathOverflow)?;

    let floor = output_reserve_floor(self.virtual_input, self.virtual_output, next_virtual_input)
      .ok_or(CurveError::MathOverflow)?;

    // floor <= virtual_output once input > 0; a zero input grants nothing
    let tentative = self.virtual_output.saturating_sub(floor);
    let granted = tentative.min(self.real_output);

    Ok(Quote { next_virtual_input, tentative, granted })
  }

  /// Commit an input to the curve and return the granted output
  pub fn apply(&mut self, input: u64) -> Result<u64, CurveError> {
    let quote = self.quote(input)?;

    // real_output <= virtual_output, so both subtractions hold once real_output does
    let real_output = self
      .real_output
      .checked_sub(quote.granted)
      .ok_or(CurveError::MathOverflow)?;
    let virtual_output = self
      .virtual_output
      .checked_sub(quote.granted)
      .ok_or(CurveError::MathOverflow)?;

    self.real_output = real_output;
    self.virtual_output = virtual_output;
    self.virtual_input = quote.next_virtual_input;

    Ok(quote.granted)
  }
}

impl Default for ReserveState {
  fn default() -> Self {
    Self::launch()
  }
}
