//! Local address codec.
//!
//! A local address names a region of either the scratchpad or the
//! accumulator. Its layout is versioned (see [`AddrLayout`]); the field
//! tables live in [`super::layout::local_addr`].

use super::layout::local_addr::{
  ACCUMULATE, BLOCKED_ROW, BLOCKS, COLS, GARBAGE_WORD, IS_ACC, READ_FULL, ROW, ROWS,
};
use super::params::AddrLayout;
use super::types::{Bank, RegT};

/// A decoded, non-garbage local address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAddr {
  pub bank: Bank,
  /// Add into the accumulator instead of overwriting
  pub accumulate: bool,
  /// Move out raw accumulator words instead of quantized elements
  pub read_full: bool,
  pub row: usize,
  pub rows: usize,
  pub cols: usize,
}

impl LocalAddr {
  pub fn scratchpad(row: usize, rows: usize, cols: usize) -> Self {
    Self {
      bank: Bank::Scratchpad,
      accumulate: false,
      read_full: false,
      row,
      rows,
      cols,
    }
  }

  pub fn accumulator(row: usize, rows: usize, cols: usize, accumulate: bool) -> Self {
    Self {
      bank: Bank::Accumulator,
      accumulate,
      read_full: false,
      row,
      rows,
      cols,
    }
  }

  pub fn with_read_full(mut self, read_full: bool) -> Self {
    self.read_full = read_full;
    self
  }

  pub fn with_accumulate(mut self, accumulate: bool) -> Self {
    self.accumulate = accumulate;
    self
  }

  pub fn is_acc(&self) -> bool {
    self.bank == Bank::Accumulator
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCodec {
  pub layout: AddrLayout,
  pub dim: usize,
}

impl AddressCodec {
  pub fn new(layout: AddrLayout, dim: usize) -> Self {
    Self { layout, dim }
  }

  /// The all-ones low word marks an operand that should be skipped
  pub fn is_garbage(raw: RegT) -> bool {
    raw as u32 == GARBAGE_WORD
  }

  /// Row and column extent carried in the upper word; valid for garbage operands too
  pub fn extent(&self, raw: RegT) -> (usize, usize) {
    match self.layout {
      AddrLayout::RowCol => (ROWS.get(raw) as usize, COLS.get(raw) as usize),
      AddrLayout::Blocked => (self.dim, BLOCKS.get(raw) as usize * self.dim),
    }
  }

  pub fn decode(&self, raw: RegT) -> Option<LocalAddr> {
    if Self::is_garbage(raw) {
      return None;
    }

    let bank = if IS_ACC.flag(raw) {
      Bank::Accumulator
    } else {
      Bank::Scratchpad
    };
    let (rows, cols) = self.extent(raw);

    let addr = match self.layout {
      AddrLayout::RowCol => LocalAddr {
        bank,
        accumulate: ACCUMULATE.flag(raw),
        read_full: READ_FULL.flag(raw),
        row: ROW.get(raw) as usize,
        rows,
        cols,
      },
      AddrLayout::Blocked => LocalAddr {
        bank,
        accumulate: ACCUMULATE.flag(raw),
        read_full: false,
        row: BLOCKED_ROW.get(raw) as usize,
        rows,
        cols,
      },
    };
    Some(addr)
  }

  pub fn encode(&self, addr: &LocalAddr) -> RegT {
    let mut raw = 0;
    raw = IS_ACC.put(raw, addr.is_acc() as RegT);
    raw = ACCUMULATE.put(raw, addr.accumulate as RegT);
    match self.layout {
      AddrLayout::RowCol => {
        raw = READ_FULL.put(raw, addr.read_full as RegT);
        raw = ROW.put(raw, addr.row as RegT);
        raw = COLS.put(raw, addr.cols as RegT);
        raw = ROWS.put(raw, addr.rows as RegT);
      },
      AddrLayout::Blocked => {
        raw = BLOCKED_ROW.put(raw, addr.row as RegT);
        raw = BLOCKS.put(raw, addr.cols.div_ceil(self.dim) as RegT);
      },
    }
    raw
  }

  /// A garbage operand that still carries a row/column extent
  pub fn garbage(&self, rows: usize, cols: usize) -> RegT {
    let upper = match self.layout {
      AddrLayout::RowCol => ROWS.put(COLS.put(0, cols as RegT), rows as RegT),
      AddrLayout::Blocked => BLOCKS.put(0, cols.div_ceil(self.dim) as RegT),
    };
    upper | GARBAGE_WORD as RegT
  }
}
