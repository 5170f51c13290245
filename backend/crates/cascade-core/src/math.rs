//! Pure mathematical functions for the launch curve
//! All functions are deterministic and use fixed-point arithmetic
//! No external dependencies, fully testable in isolation

use crate::constants::{BPS_PRECISION, FUNDING_BUFFER_LAMPORTS, FUNDING_MARKUP_PER_MILLE, TOTAL_SUPPLY};

/// Multiply two u64 values and divide by a third, rounding up
/// Used where the curve must keep the larger share of a remainder
/// Returns None on overflow or zero divisor
pub fn mul_div_up(a: u64, b: u64, c: u64) -> Option<u64> {
  if c == 0 {
    return None;
  }

  let result = (a as u128)
    .checked_mul(b as u128)?
    .checked_add((c - 1) as u128)? // we add (c - 1) before division to round up
    .checked_div(c as u128)?;

  u64::try_from(result).ok()
}

/// Multiply two u64 values and divide by a third, rounding DOWN
/// Returns None on overflow or zero divisor
pub fn mul_div_down(a: u64, b: u64, c: u64) -> Option<u64> {
  if c == 0 {
    return None;
  }

  let result = (a as u128)
    .checked_mul(b as u128)?
    .checked_div(c as u128)?;

  u64::try_from(result).ok()
}

/// Output reserve floor after an input is added to the curve
///
/// # Arguments
/// * `virtual_input` - Virtual input reserve before the step
/// * `virtual_output` - Virtual output reserve before the step
/// * `next_virtual_input` - Virtual input reserve after the step
///
/// # Returns
/// `floor(virtual_input * virtual_output / next_virtual_input) + 1`. The extra unit is kept
/// even when the division is exact, matching the curve program's own buy math.
pub fn output_reserve_floor(
  virtual_input: u64,
  virtual_output: u64,
  next_virtual_input: u64,
) -> Option<u64> {
  mul_div_down(virtual_input, virtual_output, next_virtual_input)?.checked_add(1)
}

/// Share of total supply in percent
pub fn share_percent(granted: u64) -> f64 {
  granted as f64 / TOTAL_SUPPLY as f64 * 100.0
}

/// Lamports sent to a participant ahead of their purchase
///
/// contribution * 1.015 + 0.0025 SOL, rounded down
pub fn funding_amount(contributed: u64) -> Option<u64> {
  mul_div_down(contributed, FUNDING_MARKUP_PER_MILLE, 1_000)?.checked_add(FUNDING_BUFFER_LAMPORTS)
}

/// Maximum input a purchase may spend once slippage is allowed for
///
/// # Arguments
/// * `contributed` - Simulated input in lamports
/// * `slippage_bps` - Allowance in basis points (e.g., 500 = 5%)
pub fn max_cost_with_slippage(contributed: u64, slippage_bps: u64) -> Option<u64> {
  mul_div_up(contributed, BPS_PRECISION.checked_add(slippage_bps)?, BPS_PRECISION)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mul_div_up_only_rounds_inexact_quotients() {
    assert_eq!(mul_div_up(10, 10, 5), Some(20));
    assert_eq!(mul_div_up(10, 10, 3), Some(34));
    assert_eq!(mul_div_down(10, 10, 3), Some(33));
  }

  #[test]
  fn reserve_floor_adds_one_even_when_exact() {
    // 30e9 * 1.073e15 / 40e9 = 804_750_000_000_000 exactly
    assert_eq!(
      output_reserve_floor(30_000_000_000, 1_073_000_000_000_000, 40_000_000_000),
      Some(804_750_000_000_001)
    );
    assert_eq!(output_reserve_floor(10, 10, 3), Some(34));
    assert_eq!(output_reserve_floor(1, 1, 0), None);
  }

  #[test]
  fn zero_divisor_is_rejected() {
    assert_eq!(mul_div_up(1, 1, 0), None);
    assert_eq!(mul_div_down(1, 1, 0), None);
  }

  #[test]
  fn quotient_above_u64_is_rejected() {
    assert_eq!(mul_div_down(u64::MAX, u64::MAX, 1), None);
  }

  #[test]
  fn funding_adds_markup_and_buffer() {
    // 1 SOL -> 1.015 SOL + 0.0025 SOL
    assert_eq!(funding_amount(1_000_000_000), Some(1_017_500_000));
  }

  #[test]
  fn slippage_rounds_toward_allowing_more() {
    assert_eq!(max_cost_with_slippage(1_000_000_000, 500), Some(1_050_000_000));
    assert_eq!(max_cost_with_slippage(3, 1), Some(4));
  }
}
