use super::error::{ensure, GemminiError, Result};
use super::types::ACC_BYTES;
use serde::{Deserialize, Serialize};

/// Which local-address bit layout the accelerator decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddrLayout {
  /// First revision: a block count in the upper word, each block DIM x DIM
  Blocked,
  /// Explicit row and column counts in the upper word
  #[default]
  RowCol,
}

/// Array dimensions and memory sizes (gemmini_params.h)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemminiParams {
  pub dim: usize,
  pub sp_banks: usize,
  pub sp_bank_rows: usize,
  pub acc_rows: usize,
  pub max_bytes: usize,
  pub load_states: usize,
  pub addr_layout: AddrLayout,
}

impl Default for GemminiParams {
  fn default() -> Self {
    Self {
      dim: 16,
      sp_banks: 4,
      sp_bank_rows: 4096,
      acc_rows: 1024,
      max_bytes: 64,
      load_states: 3,
      addr_layout: AddrLayout::RowCol,
    }
  }
}

impl GemminiParams {
  pub fn from_toml_str(content: &str) -> Result<Self> {
    let params: GemminiParams =
      toml::from_str(content).map_err(|e| GemminiError::violation(format!("parse gemmini params failed: {}", e)))?;
    params.validate()?;
    Ok(params)
  }

  pub fn validate(&self) -> Result<()> {
    ensure!(self.dim > 0, "dim must be positive");
    ensure!(self.sp_banks > 0 && self.sp_bank_rows > 0, "scratchpad must hold at least one row");
    ensure!(self.acc_rows > 0, "accumulator must hold at least one row");
    ensure!(self.load_states > 0, "at least one load state is required");
    ensure!(self.max_bytes >= self.dim, "max_bytes ({}) must cover one row of dim ({})", self.max_bytes, self.dim);
    Ok(())
  }

  pub fn sp_rows(&self) -> usize {
    self.sp_banks * self.sp_bank_rows
  }

  /// Max DIM-wide blocks a single scratchpad mvin may span
  pub fn max_block_len(&self) -> usize {
    (self.max_bytes / self.dim).max(1)
  }

  /// Max DIM-wide blocks a single full-width accumulator mvin may span
  pub fn max_block_len_acc(&self) -> usize {
    (self.max_bytes / (self.dim * ACC_BYTES)).max(1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_params() {
    let params = GemminiParams::default();
    assert_eq!(params.sp_rows(), 16384);
    assert_eq!(params.max_block_len(), 4);
    assert_eq!(params.max_block_len_acc(), 1);
    assert!(params.validate().is_ok());
  }

  #[test]
  fn test_params_from_toml() {
    let params = GemminiParams::from_toml_str("dim = 4\nacc_rows = 64\naddr_layout = \"blocked\"\n").unwrap();
    assert_eq!(params.dim, 4);
    assert_eq!(params.acc_rows, 64);
    assert_eq!(params.sp_bank_rows, 4096);
    assert_eq!(params.addr_layout, AddrLayout::Blocked);
  }

  #[test]
  fn test_params_rejects_zero_dim() {
    let err = GemminiParams::from_toml_str("dim = 0\n").unwrap_err();
    assert!(err.is_fatal());
  }
}
