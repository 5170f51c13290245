//! Conversion between native-unit decimal strings ("1.25") and lamports

use crate::constants::LAMPORTS_PER_SOL;

const NATIVE_DECIMALS: usize = 9;

/// Parse a decimal amount of native units into lamports
///
/// Returns None for empty, signed, non-numeric or over-precise input, and for values that do
/// not fit in u64. Zero parses to `Some(0)`; callers decide whether zero is acceptable.
pub fn parse_native_amount(raw: &str) -> Option<u64> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }

  let (whole, fraction) = match raw.split_once('.') {
    Some((whole, fraction)) => (whole, fraction),
    None => (raw, ""),
  };

  if whole.is_empty() && fraction.is_empty() {
    return None;
  }
  if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  if fraction.len() > NATIVE_DECIMALS {
    return None;
  }

  let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
  let fraction_units: u64 = if fraction.is_empty() {
    0
  } else {
    let padded = format!("{fraction:0<width$}", width = NATIVE_DECIMALS);
    padded.parse().ok()?
  };

  whole.checked_mul(LAMPORTS_PER_SOL)?.checked_add(fraction_units)
}

/// Format lamports as a decimal amount of native units without trailing zeros
pub fn format_native_amount(lamports: u64) -> String {
  let whole = lamports / LAMPORTS_PER_SOL;
  let fraction = lamports % LAMPORTS_PER_SOL;
  if fraction == 0 {
    return whole.to_string();
  }

  let digits = format!("{fraction:0width$}", width = NATIVE_DECIMALS);
  format!("{whole}.{}", digits.trim_end_matches('0'))
}
