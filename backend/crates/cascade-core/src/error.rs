use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurveError {
  #[error("Math overflow occurred - values exceeded u64 bounds")]
  MathOverflow,

  #[error("Virtual input reserve is zero - curve is not initialized")]
  ZeroReserve,

  #[error("Reserve invariant violated: real output {real} exceeds virtual output {virtual_output}")]
  RealExceedsVirtual { real: u64, virtual_output: u64 },
}
