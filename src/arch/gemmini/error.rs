//! Error types for Gemmini instruction execution

use super::types::Bank;
use thiserror::Error;

/// Result type alias for accelerator operations
pub type Result<T> = std::result::Result<T, GemminiError>;

/// Errors raised while executing accelerator instructions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GemminiError {
  /// The dispatcher has no primitive registered for this funct code
  #[error("unknown instruction with funct {funct}")]
  UnknownInstruction {
    /// Offending funct code
    funct: u64,
  },

  /// Software broke the hardware/software contract
  #[error("configuration violation: {reason}")]
  ConfigurationViolation {
    /// What was violated
    reason: String,
  },

  /// A bank row outside the allocated extent was addressed
  #[error("{bank} row {row} out of range (bank holds {rows} rows)")]
  OutOfRange {
    /// Bank that was addressed
    bank: Bank,
    /// Requested row
    row: usize,
    /// Number of rows in the bank
    rows: usize,
  },

  /// A previous fatal error stopped the accelerator; only reset recovers
  #[error("accelerator halted after fatal error: {reason}")]
  Halted {
    /// Description of the fault that halted the session
    reason: String,
  },
}

impl GemminiError {
  pub fn violation(reason: impl Into<String>) -> Self {
    Self::ConfigurationViolation { reason: reason.into() }
  }

  pub fn out_of_range(bank: Bank, row: usize, rows: usize) -> Self {
    Self::OutOfRange { bank, row, rows }
  }

  /// Fatal errors end the simulated session
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::ConfigurationViolation { .. } | Self::OutOfRange { .. })
  }
}

/// Log and return a configuration violation
macro_rules! bail {
  ($($arg:tt)*) => {{
    let reason = format!($($arg)*);
    log::error!("GEMMINI: {}", reason);
    return Err($crate::arch::gemmini::error::GemminiError::violation(reason));
  }};
}

/// Fail with a configuration violation unless `cond` holds
macro_rules! ensure {
  ($cond:expr, $($arg:tt)*) => {
    if !$cond {
      $crate::arch::gemmini::error::bail!($($arg)*);
    }
  };
}

pub(crate) use bail;
pub(crate) use ensure;
