//! Whole-matrix multiply on DRAM operands, bypassing the local banks.

use super::counters::CounterEvent;
use super::dram::Dram;
use super::error::{ensure, Result};
use super::gemmini::Gemmini;
use super::layout::cisc as cs;
use super::types::{elem_to_acc, AccT, ElemT, RegT, ELEM_BYTES};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiscConfig {
  pub a_addr: RegT,
  pub b_addr: RegT,
  pub c_addr: RegT,
  pub d_addr: RegT,
  pub m: usize,
  pub n: usize,
  pub k: usize,
  /// Every row of C adds row 0 of D
  pub repeating_bias: bool,
}

impl<D: Dram> Gemmini<D> {
  pub fn cisc_config_ab(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    self.state.cisc.a_addr = cs::ADDR.get(rs1);
    self.state.cisc.b_addr = cs::ADDR.get(rs2);
    log::info!("GEMMINI: cisc_config_ab - A 0x{:x}, B 0x{:x}", rs1, rs2);
    Ok(())
  }

  pub fn cisc_config_cd(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    self.state.cisc.c_addr = cs::ADDR.get(rs1);
    self.state.cisc.d_addr = cs::ADDR.get(rs2);
    log::info!("GEMMINI: cisc_config_cd - C 0x{:x}, D 0x{:x}", rs1, rs2);
    Ok(())
  }

  pub fn cisc_config_size(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let cisc = &mut self.state.cisc;
    cisc.m = cs::M.get(rs1) as usize;
    cisc.n = cs::N.get(rs1) as usize;
    cisc.k = cs::K.get(rs1) as usize;
    cisc.repeating_bias = cs::REPEATING_BIAS.flag(rs2);
    log::info!(
      "GEMMINI: cisc_config_size - M {}, N {}, K {}, repeating bias {}",
      cisc.m,
      cisc.n,
      cisc.k,
      cisc.repeating_bias
    );
    Ok(())
  }

  /// Address of element (row, col) of a packed row-major DRAM matrix
  fn element_addr(base: RegT, row: usize, col: usize, cols: usize) -> RegT {
    base.wrapping_add(((row * cols + col) * ELEM_BYTES) as RegT)
  }

  /// C = D + A * B, quantized through the store pipeline.
  /// Operands are streamed from DRAM one element at a time.
  pub fn compute_cisc(&mut self) -> Result<()> {
    let cisc = self.state.cisc.clone();
    ensure!(cisc.a_addr != 0, "cisc_compute without an A operand");
    ensure!(cisc.b_addr != 0, "cisc_compute without a B operand");

    log::info!(
      "GEMMINI: cisc_compute - {}x{}x{}, A 0x{:x} B 0x{:x} C 0x{:x} D 0x{:x}",
      cisc.m,
      cisc.n,
      cisc.k,
      cisc.a_addr,
      cisc.b_addr,
      cisc.c_addr,
      cisc.d_addr
    );

    for i in 0..cisc.m {
      let bias_row = if cisc.repeating_bias { 0 } else { i };
      for j in 0..cisc.n {
        let mut value: AccT = if cisc.d_addr == 0 {
          0
        } else {
          let bias: ElemT = self.read_dram(Self::element_addr(cisc.d_addr, bias_row, j, cisc.n));
          elem_to_acc(bias)
        };
        for k in 0..cisc.k {
          let a: ElemT = self.read_dram(Self::element_addr(cisc.a_addr, i, k, cisc.k));
          let b: ElemT = self.read_dram(Self::element_addr(cisc.b_addr, k, j, cisc.n));
          value = value.wrapping_add(elem_to_acc(a).wrapping_mul(elem_to_acc(b)));
        }
        let out = self.quantize_acc(value);
        self.write_dram(Self::element_addr(cisc.c_addr, i, j, cisc.n), out);
      }
    }

    self.state.counters.record(CounterEvent::Macs, (cisc.m * cisc.n * cisc.k) as u64);
    Ok(())
  }
}
