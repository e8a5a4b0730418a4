//! Move-in (DRAM to bank) and move-out (bank to DRAM), including the
//! max-pool fused into the store path.

use super::addr::LocalAddr;
use super::config::PoolConfig;
use super::counters::CounterEvent;
use super::dram::Dram;
use super::error::{ensure, Result};
use super::gemmini::Gemmini;
use super::quant::{acc_output, mvin_scale, mvin_scale_acc};
use super::types::{acc_to_elem_saturating, elem_to_acc, AccT, ElemT, RegT, ACC_BYTES, ELEM_BYTES, ELEM_T_MIN};

impl<D: Dram> Gemmini<D> {
  /// Check a transfer's extent against the mover limits
  fn check_transfer(&self, addr: &LocalAddr, full_width: bool) -> Result<()> {
    let params = &self.state.params;
    let dim = params.dim;
    let max_cols = if full_width {
      params.max_block_len_acc() * dim
    } else {
      params.max_block_len() * dim
    };
    ensure!(addr.rows <= dim, "transfer of {} rows exceeds dim {}", addr.rows, dim);
    ensure!(
      addr.cols <= max_cols,
      "transfer of {} cols exceeds the {} col limit",
      addr.cols,
      max_cols
    );
    ensure!(
      addr.is_acc() || !addr.accumulate,
      "accumulate flag set on scratchpad row 0x{:x}",
      addr.row
    );
    Ok(())
  }

  /// Accumulator word to output element through the store pipeline
  pub(crate) fn quantize_acc(&self, value: AccT) -> ElemT {
    let ex = &self.state.config.ex;
    let st = &self.state.config.st;
    acc_output(value, st.acc_scale, ex.acc_shift, st.activation, ex.relu6_shift)
  }

  /// Move `rows x cols` values from DRAM into a local bank using load state `state_id`.
  /// A DRAM address of zero fills the region with zeros.
  pub fn mvin(&mut self, dram_addr: RegT, sp_addr: RegT, state_id: usize) -> Result<()> {
    let addr = match self.state.codec.decode(sp_addr) {
      Some(addr) => addr,
      None => {
        log::info!("GEMMINI: mvin - garbage destination, skipped");
        return Ok(());
      },
    };
    ensure!(
      state_id < self.state.config.ld.len(),
      "load state {} does not exist",
      state_id
    );

    let ld = self.state.config.ld[state_id].clone();
    let full_width = addr.is_acc() && !ld.shrunk;
    self.check_transfer(&addr, full_width)?;

    let dim = self.dim();
    let is_zeros = dram_addr == 0;
    let elem_bytes = if full_width { ACC_BYTES } else { ELEM_BYTES };

    log::info!(
      "GEMMINI: mvin - 0x{:02x} cols and 0x{:02x} rows from 0x{:08x} to {} row 0x{:x} (state {})",
      addr.cols,
      addr.rows,
      dram_addr,
      addr.bank,
      addr.row,
      state_id
    );

    for row in 0..addr.rows {
      let dram_row_addr = dram_addr.wrapping_add((row as RegT).wrapping_mul(ld.stride));

      for col in 0..addr.cols {
        let block = col / dim;
        let spad_col = col % dim;
        let spad_row = addr.row + row + block * ld.block_stride;
        let dram_byte_addr = dram_row_addr.wrapping_add((col * elem_bytes) as RegT);

        let value: AccT = if is_zeros {
          0
        } else if full_width {
          let raw = self.read_dram::<AccT>(dram_byte_addr);
          mvin_scale_acc(raw, ld.scale)
        } else {
          let raw = self.read_dram::<ElemT>(dram_byte_addr);
          elem_to_acc(mvin_scale(raw, ld.scale))
        };

        for pixel in 0..ld.pixels_per_row {
          if pixel > spad_row {
            break;
          }
          let r = spad_row - pixel;
          let c = spad_col + pixel * addr.cols;
          ensure!(c < dim, "pixel {} of column {} lands past the row end", pixel, col);

          if addr.is_acc() {
            self.state.banks.set_acc(r, c, value, addr.accumulate)?;
          } else {
            self.state.banks.set_spad(r, c, acc_to_elem_saturating(value))?;
          }
        }
      }
    }

    self.state.counters.record(CounterEvent::MvinRows, addr.rows as u64);
    Ok(())
  }

  /// Move a local region out to DRAM, through the pooling path when enabled
  pub fn mvout(&mut self, dram_addr: RegT, sp_addr: RegT) -> Result<()> {
    let addr = match self.state.codec.decode(sp_addr) {
      Some(addr) => addr,
      None => {
        log::info!("GEMMINI: mvout - garbage source, skipped");
        return Ok(());
      },
    };
    ensure!(
      addr.is_acc() || !addr.read_full,
      "full-precision move-out requires an accumulator source"
    );
    self.check_transfer(&addr, addr.read_full)?;

    log::info!(
      "GEMMINI: mvout - 0x{:02x} cols and 0x{:02x} rows from {} row 0x{:x} to addr 0x{:08x}",
      addr.cols,
      addr.rows,
      addr.bank,
      addr.row,
      dram_addr
    );

    let pool = self.state.config.st.pool.clone();
    if pool.is_enabled() {
      self.mvout_pooled(dram_addr, &addr, &pool)
    } else {
      self.mvout_rows(dram_addr, &addr)
    }
  }

  fn mvout_rows(&mut self, dram_addr: RegT, addr: &LocalAddr) -> Result<()> {
    let dim = self.dim();
    let store_stride = self.state.config.st.stride;

    for i in 0..addr.rows {
      let dram_row_addr = dram_addr.wrapping_add((i as RegT).wrapping_mul(store_stride));

      for j in 0..addr.cols {
        let block = j / dim;
        let spad_col = j % dim;
        let spad_row = addr.row + block * dim + i;

        if addr.is_acc() {
          let acc_value = self.state.banks.acc(spad_row, spad_col)?;
          if addr.read_full {
            self.write_dram(dram_row_addr.wrapping_add((j * ACC_BYTES) as RegT), acc_value);
          } else {
            let activated = self.quantize_acc(acc_value);
            self.write_dram(dram_row_addr.wrapping_add((j * ELEM_BYTES) as RegT), activated);
          }
        } else {
          let value = self.state.banks.spad(spad_row, spad_col)?;
          self.write_dram(dram_row_addr.wrapping_add((j * ELEM_BYTES) as RegT), value);
        }
      }
    }

    self.state.counters.record(CounterEvent::MvoutRows, addr.rows as u64);
    Ok(())
  }

  /// Max-pool the `orows x ocols` pixel grid starting at `addr.row`;
  /// each pixel is one local row holding `addr.cols` channels
  fn mvout_pooled(&mut self, dram_addr: RegT, addr: &LocalAddr, pool: &PoolConfig) -> Result<()> {
    let dim = self.dim();
    let channels = addr.cols;
    ensure!(channels <= dim, "pooled move-out of {} channels exceeds dim {}", channels, dim);
    ensure!(!addr.read_full, "pooled move-out cannot read full-precision words");

    let store_stride = self.state.config.st.stride;
    let (orows, ocols) = (pool.orows as i64, pool.ocols as i64);

    for porow in 0..pool.porows {
      for pocol in 0..pool.pocols {
        for poch in 0..channels {
          let mut value = ELEM_T_MIN;

          for wrow in 0..pool.size {
            for wcol in 0..pool.size {
              let orow = (porow * pool.stride + wrow) as i64 - pool.upad as i64;
              let ocol = (pocol * pool.stride + wcol) as i64 - pool.lpad as i64;

              let elem = if orow < 0 || ocol < 0 || orow >= orows || ocol >= ocols {
                0
              } else {
                let row = addr.row + (orow * ocols + ocol) as usize;
                if addr.is_acc() {
                  let acc_value = self.state.banks.acc(row, poch)?;
                  self.quantize_acc(acc_value)
                } else {
                  self.state.banks.spad(row, poch)?
                }
              };

              value = value.max(elem);
            }
          }

          let dram_byte_addr = dram_addr
            .wrapping_add(((porow * pool.out_dim + pocol) as RegT).wrapping_mul(store_stride))
            .wrapping_add((poch * ELEM_BYTES) as RegT);
          self.write_dram(dram_byte_addr, value);
        }
      }
    }

    let outputs = (pool.porows * pool.pocols) as u64;
    self.state.counters.record(CounterEvent::MvoutRows, outputs);
    self.state.counters.record(CounterEvent::PooledOutputs, outputs * channels as u64);
    Ok(())
  }
}
