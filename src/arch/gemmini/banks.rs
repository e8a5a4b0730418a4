use super::error::{ensure, GemminiError, Result};
use super::params::GemminiParams;
use super::types::{AccT, Bank, ElemT};

/// Scratchpad and accumulator storage, both DIM columns wide.
///
/// Every access is bounds checked; an out-of-range row is an
/// [`GemminiError::OutOfRange`] fault.
#[derive(Debug, Clone)]
pub struct MemoryBanks {
  dim: usize,
  spad: Vec<Vec<ElemT>>,
  accumulator: Vec<Vec<AccT>>,
  spad_writes: u64,
  acc_writes: u64,
}

impl MemoryBanks {
  pub fn new(params: &GemminiParams) -> Self {
    Self {
      dim: params.dim,
      spad: vec![vec![0; params.dim]; params.sp_rows()],
      accumulator: vec![vec![0; params.dim]; params.acc_rows],
      spad_writes: 0,
      acc_writes: 0,
    }
  }

  pub fn dim(&self) -> usize {
    self.dim
  }

  pub fn sp_rows(&self) -> usize {
    self.spad.len()
  }

  pub fn acc_rows(&self) -> usize {
    self.accumulator.len()
  }

  /// Zero both banks
  pub fn clear(&mut self) {
    for row in self.spad.iter_mut() {
      row.fill(0);
    }
    for row in self.accumulator.iter_mut() {
      row.fill(0);
    }
    self.spad_writes = 0;
    self.acc_writes = 0;
  }

  /// Elements written to the scratchpad since the last clear
  pub fn spad_writes(&self) -> u64 {
    self.spad_writes
  }

  /// Words written to the accumulator since the last clear
  pub fn acc_writes(&self) -> u64 {
    self.acc_writes
  }

  fn check_row(&self, bank: Bank, row: usize) -> Result<()> {
    let rows = match bank {
      Bank::Scratchpad => self.spad.len(),
      Bank::Accumulator => self.accumulator.len(),
    };
    if row >= rows {
      log::error!("GEMMINI: {} row {} out of range ({} rows)", bank, row, rows);
      return Err(GemminiError::out_of_range(bank, row, rows));
    }
    Ok(())
  }

  fn check_col(&self, col: usize) -> Result<()> {
    ensure!(col < self.dim, "column {} outside a {}-wide row", col, self.dim);
    Ok(())
  }

  pub fn read_scratchpad_row(&self, row: usize) -> Result<&[ElemT]> {
    self.check_row(Bank::Scratchpad, row)?;
    Ok(&self.spad[row])
  }

  /// Overwrite the leading `values.len()` elements of a scratchpad row
  pub fn write_scratchpad_row(&mut self, row: usize, values: &[ElemT]) -> Result<()> {
    self.check_row(Bank::Scratchpad, row)?;
    ensure!(values.len() <= self.dim, "{} values do not fit a {}-wide row", values.len(), self.dim);
    self.spad[row][..values.len()].copy_from_slice(values);
    self.spad_writes += values.len() as u64;
    Ok(())
  }

  pub fn read_accumulator_row(&self, row: usize) -> Result<&[AccT]> {
    self.check_row(Bank::Accumulator, row)?;
    Ok(&self.accumulator[row])
  }

  /// Overwrite, or add into, the leading `values.len()` words of an accumulator row.
  /// Accumulation wraps.
  pub fn write_accumulator_row(&mut self, row: usize, values: &[AccT], accumulate: bool) -> Result<()> {
    self.check_row(Bank::Accumulator, row)?;
    ensure!(values.len() <= self.dim, "{} values do not fit a {}-wide row", values.len(), self.dim);
    for (dst, &v) in self.accumulator[row].iter_mut().zip(values) {
      *dst = if accumulate { dst.wrapping_add(v) } else { v };
    }
    self.acc_writes += values.len() as u64;
    Ok(())
  }

  pub fn spad(&self, row: usize, col: usize) -> Result<ElemT> {
    self.check_row(Bank::Scratchpad, row)?;
    self.check_col(col)?;
    Ok(self.spad[row][col])
  }

  pub fn set_spad(&mut self, row: usize, col: usize, value: ElemT) -> Result<()> {
    self.check_row(Bank::Scratchpad, row)?;
    self.check_col(col)?;
    self.spad[row][col] = value;
    self.spad_writes += 1;
    Ok(())
  }

  pub fn acc(&self, row: usize, col: usize) -> Result<AccT> {
    self.check_row(Bank::Accumulator, row)?;
    self.check_col(col)?;
    Ok(self.accumulator[row][col])
  }

  pub fn set_acc(&mut self, row: usize, col: usize, value: AccT, accumulate: bool) -> Result<()> {
    self.check_row(Bank::Accumulator, row)?;
    self.check_col(col)?;
    let dst = &mut self.accumulator[row][col];
    *dst = if accumulate { dst.wrapping_add(value) } else { value };
    self.acc_writes += 1;
    Ok(())
  }
}
