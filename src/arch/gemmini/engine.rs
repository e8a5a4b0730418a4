//! Systolic array model: `preload` seeds the PE array, `compute` runs one
//! DIM x DIM x DIM multiply in the configured dataflow.

use super::addr::LocalAddr;
use super::config::ExecuteConfig;
use super::counters::{CounterEvent, ExternalSource};
use super::dram::Dram;
use super::error::{ensure, Result};
use super::gemmini::{Gemmini, PreloadState};
use super::quant::{rounding_saturating_shift, sys_output};
use super::types::{elem_to_acc, AccT, Dataflow, OutputT, RegT};

impl<D: Dram> Gemmini<D> {
  fn check_tile(&self, name: &str, addr: &LocalAddr) -> Result<()> {
    let dim = self.dim();
    ensure!(
      addr.rows <= dim && addr.cols <= dim,
      "{} tile of {}x{} exceeds {}x{}",
      name,
      addr.rows,
      addr.cols,
      dim,
      dim
    );
    Ok(())
  }

  /// Read a scratchpad tile as accumulator words, zero outside its extent
  fn read_tile(&self, addr: &Option<LocalAddr>, transpose: bool, row_stride: usize) -> Result<Vec<Vec<AccT>>> {
    let dim = self.dim();
    let mut tile = vec![vec![0 as AccT; dim]; dim];
    if let Some(addr) = addr {
      for (i, tile_row) in tile.iter_mut().enumerate().take(addr.rows) {
        for (j, slot) in tile_row.iter_mut().enumerate().take(addr.cols) {
          let (r, c) = if transpose { (j, i) } else { (i, j) };
          *slot = elem_to_acc(self.state.banks.spad(addr.row + r * row_stride, c)?);
        }
      }
    }
    Ok(tile)
  }

  /// Record the PE preload source and the result destination for the next compute
  pub fn preload(&mut self, bd_addr: RegT, c_addr: RegT) -> Result<()> {
    let codec = self.state.codec;
    let source = codec.decode(bd_addr);
    let output = codec.decode(c_addr);

    if let Some(src) = &source {
      ensure!(!src.is_acc(), "preload from the accumulator is unsupported");
      self.check_tile("preload", src)?;
    }
    if let Some(out) = &output {
      ensure!(
        out.is_acc() || !out.accumulate,
        "accumulate flag set on scratchpad output row 0x{:x}",
        out.row
      );
      self.check_tile("output", out)?;
    }

    log::info!(
      "GEMMINI: preload - scratchpad output addr = 0x{:08x}, scratchpad preload addr = 0x{:08x}",
      c_addr as u32,
      bd_addr as u32
    );

    self.state.preload = PreloadState { source, output };
    self.state.counters.record(CounterEvent::Preloads, 1);
    Ok(())
  }

  fn load_pe_state(&mut self, ex: &ExecuteConfig) -> Result<()> {
    let transpose = ex.dataflow == Dataflow::WS && ex.b_transpose;
    let source = self.state.preload.source;
    self.state.pe_state = self.read_tile(&source, transpose, 1)?;
    self.state.counters.add_external(ExternalSource::PeLoads, 1);
    Ok(())
  }

  /// One DIM x DIM x DIM step. `preload` first loads the recorded tile into the PE array.
  pub fn compute(&mut self, a_addr: RegT, bd_addr: RegT, preload: bool) -> Result<()> {
    let dim = self.dim();
    let codec = self.state.codec;
    let a = codec.decode(a_addr);
    let bd = codec.decode(bd_addr);

    for (name, operand) in [("A", &a), ("B/D", &bd)] {
      if let Some(op) = operand {
        ensure!(!op.is_acc(), "{} operand read from the accumulator is unsupported", name);
        self.check_tile(name, op)?;
      }
    }

    log::info!(
      "GEMMINI: compute - preload = {}, scratchpad A addr = 0x{:08x}, scratchpad B addr 0x{:08x}",
      preload,
      a_addr as u32,
      bd_addr as u32
    );

    let ex = self.state.config.ex.clone();
    if preload {
      self.load_pe_state(&ex)?;
    }

    let a_tile = self.read_tile(&a, ex.a_transpose, ex.a_stride)?;

    let results = match ex.dataflow {
      Dataflow::OS => {
        let b_tile = self.read_tile(&bd, ex.b_transpose, 1)?;
        let pe = &mut self.state.pe_state;
        for i in 0..dim {
          for j in 0..dim {
            let mut acc = pe[i][j];
            for k in 0..dim {
              acc = acc.wrapping_add(a_tile[i][k].wrapping_mul(b_tile[k][j]));
            }
            pe[i][j] = acc;
          }
        }
        None
      },
      Dataflow::WS => {
        let mut results = self.read_tile(&bd, false, 1)?;
        let pe = &self.state.pe_state;
        for i in 0..dim {
          for j in 0..dim {
            let mut acc = results[i][j];
            for k in 0..dim {
              acc = acc.wrapping_add(a_tile[i][k].wrapping_mul(pe[k][j]));
            }
            results[i][j] = acc;
          }
        }
        Some(results)
      },
    };

    if let Some(out) = self.state.preload.output {
      let shift = match ex.dataflow {
        Dataflow::OS => ex.sys_shift,
        Dataflow::WS => 0,
      };

      for i in 0..out.rows {
        let row = out.row + ex.c_stride * i;
        for j in 0..out.cols {
          let value = match &results {
            Some(results) => results[i][j],
            None => self.state.pe_state[i][j],
          };

          if out.is_acc() {
            let shifted: OutputT = rounding_saturating_shift(value, shift);
            self.state.banks.set_acc(row, j, shifted, out.accumulate)?;
          } else {
            let activated = sys_output(value, shift, ex.activation, ex.relu6_shift);
            self.state.banks.set_spad(row, j, activated)?;
          }
        }
      }
    }

    self.state.counters.record(CounterEvent::Computes, 1);
    self.state.counters.record(CounterEvent::Macs, (dim * dim * dim) as u64);
    Ok(())
  }
}
