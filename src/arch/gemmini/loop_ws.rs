//! Tiled matrix multiply: `C = A * B + D` expressed as a nest of
//! mvin / preload / compute / mvout over DIM x DIM tiles.

use super::addr::LocalAddr;
use super::config::{decode_activation, LoadConfig};
use super::counters::CounterEvent;
use super::dram::Dram;
use super::error::{ensure, Result};
use super::gemmini::Gemmini;
use super::layout::loop_ws as lw;
use super::params::AddrLayout;
use super::types::{Activation, Dataflow, RegT, ACC_BYTES, ELEM_BYTES};

/// Registers written by the loop_ws_config_* instructions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopWsConfig {
  /// Extents in tiles
  pub i: usize,
  pub j: usize,
  pub k: usize,
  /// Elements missing from the last tile along each axis
  pub pad_i: usize,
  pub pad_j: usize,
  pub pad_k: usize,
  pub a: RegT,
  pub b: RegT,
  pub d: RegT,
  pub c: RegT,
  /// Row strides in elements
  pub a_stride: RegT,
  pub b_stride: RegT,
  pub d_stride: RegT,
  pub c_stride: RegT,
}

/// Per-invocation flags of loop_ws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopWsFlags {
  pub ex_accumulate: bool,
  pub full_c: bool,
  pub low_d: bool,
  pub act: Activation,
  pub a_transpose: bool,
  pub b_transpose: bool,
  pub a_spad_id: u64,
  pub b_spad_id: u64,
}

impl LoopWsFlags {
  pub fn decode(rs1: RegT, rs2: RegT) -> Result<Self> {
    Ok(Self {
      ex_accumulate: lw::EX_ACCUMULATE.flag(rs1),
      full_c: lw::FULL_C.flag(rs1),
      low_d: lw::LOW_D.flag(rs1),
      act: decode_activation(lw::ACT.get(rs1))?,
      a_transpose: lw::A_TRANSPOSE.flag(rs2),
      b_transpose: lw::B_TRANSPOSE.flag(rs2),
      a_spad_id: lw::A_SPAD_ID.get(rs1),
      b_spad_id: lw::B_SPAD_ID.get(rs1),
    })
  }
}

/// DRAM address of tile (row, col) in a matrix of `stride` elements per row.
/// Wraps at the top of the address space like the movers.
fn tile_addr(base: RegT, row: usize, stride: RegT, col: usize, tile_bytes: RegT) -> RegT {
  let offset = (row as RegT).wrapping_mul(stride).wrapping_add(col as RegT);
  base.wrapping_add(offset.wrapping_mul(tile_bytes))
}

impl<D: Dram> Gemmini<D> {
  pub fn loop_ws_config_bounds(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let cfg = &mut self.state.loop_ws;
    cfg.i = lw::BOUND_I.get(rs2) as usize;
    cfg.j = lw::BOUND_J.get(rs2) as usize;
    cfg.k = lw::BOUND_K.get(rs2) as usize;
    cfg.pad_i = lw::PAD_I.get(rs1) as usize;
    cfg.pad_j = lw::PAD_J.get(rs1) as usize;
    cfg.pad_k = lw::PAD_K.get(rs1) as usize;

    log::info!(
      "GEMMINI: loop_ws_config_bounds - set loop ws I to {}, J to {}, K to {}, pad I to {}, pad J to {}, pad K to {}",
      cfg.i,
      cfg.j,
      cfg.k,
      cfg.pad_i,
      cfg.pad_j,
      cfg.pad_k
    );
    Ok(())
  }

  pub fn loop_ws_config_addrs_ab(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    self.state.loop_ws.a = rs1;
    self.state.loop_ws.b = rs2;
    log::info!("GEMMINI: loop_ws_config_addrs_AB - set loop ws A to 0x{:x}, B to 0x{:x}", rs1, rs2);
    Ok(())
  }

  pub fn loop_ws_config_addrs_dc(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    self.state.loop_ws.d = rs1;
    self.state.loop_ws.c = rs2;
    log::info!("GEMMINI: loop_ws_config_addrs_DC - set loop ws D to 0x{:x}, C to 0x{:x}", rs1, rs2);
    Ok(())
  }

  pub fn loop_ws_config_strides_ab(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    self.state.loop_ws.a_stride = rs1;
    self.state.loop_ws.b_stride = rs2;
    log::info!("GEMMINI: loop_ws_config_strides_AB - set loop ws A stride to {}, B stride to {}", rs1, rs2);
    Ok(())
  }

  pub fn loop_ws_config_strides_dc(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    self.state.loop_ws.d_stride = rs1;
    self.state.loop_ws.c_stride = rs2;
    log::info!("GEMMINI: loop_ws_config_strides_DC - set loop ws D stride to {}, C stride to {}", rs1, rs2);
    Ok(())
  }

  /// Check what every tiling loop needs from the accelerator configuration
  pub(crate) fn check_loop_preconditions(&self, name: &str) -> Result<()> {
    ensure!(
      self.state.params.addr_layout == AddrLayout::RowCol,
      "{} needs the row_col address layout",
      name
    );
    ensure!(
      self.state.config.ex.dataflow == Dataflow::WS,
      "{} runs in the weight-stationary dataflow",
      name
    );
    ensure!(self.state.config.ld.len() >= 3, "{} needs three load states", name);
    Ok(())
  }

  pub fn loop_ws(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let flags = LoopWsFlags::decode(rs1, rs2)?;
    self.check_loop_preconditions("loop_ws")?;

    let dim = self.dim();
    let cfg = self.state.loop_ws.clone();
    ensure!(cfg.i > 0 && cfg.j > 0 && cfg.k > 0, "loop_ws bounds must be non-zero");
    ensure!(
      cfg.pad_i < dim && cfg.pad_j < dim && cfg.pad_k < dim,
      "loop_ws padding must stay below dim"
    );

    let total_spad_rows = (cfg.i * cfg.k + cfg.k * cfg.j) * dim;
    let total_acc_rows = cfg.i * cfg.j * dim;
    ensure!(
      total_spad_rows <= self.state.banks.sp_rows() / 2 && total_acc_rows <= self.state.banks.acc_rows() / 2,
      "LOOP_WS bounds were too large for double-buffering"
    );

    log::info!(
      "GEMMINI: loop_ws - I {} J {} K {}, A 0x{:x} B 0x{:x} D 0x{:x} C 0x{:x}, {:?}",
      cfg.i,
      cfg.j,
      cfg.k,
      cfg.a,
      cfg.b,
      cfg.d,
      cfg.c,
      flags
    );

    let saved = self.state.config.clone();
    let result = self.run_loop_ws(&cfg, &flags);
    self.state.config = saved;
    result?;

    self.state.counters.record(CounterEvent::LoopWs, 1);
    Ok(())
  }

  fn program_loop_ws(&mut self, cfg: &LoopWsConfig, flags: &LoopWsFlags) -> Result<()> {
    let dim = self.dim();
    let config = &mut self.state.config;

    let mut ex = config.ex.clone();
    ex.a_transpose = flags.a_transpose;
    ex.b_transpose = flags.b_transpose;
    ex.a_stride = 1;
    ex.c_stride = 1;
    config.set_execute_config(ex)?;

    let sizeof_d = if flags.low_d { ELEM_BYTES } else { ACC_BYTES };
    let loads = [
      (cfg.a_stride.wrapping_mul(ELEM_BYTES as RegT), false),
      (cfg.b_stride.wrapping_mul(ELEM_BYTES as RegT), false),
      (cfg.d_stride.wrapping_mul(sizeof_d as RegT), flags.low_d),
    ];
    for (state_id, (stride, shrunk)) in loads.into_iter().enumerate() {
      let ld = LoadConfig {
        stride,
        shrunk,
        pixels_per_row: 1,
        block_stride: dim,
        scale: config.ld[state_id].scale,
      };
      config.set_load_config(state_id, ld)?;
    }

    let sizeof_c = if flags.full_c { ACC_BYTES } else { ELEM_BYTES };
    let mut st = config.st.clone();
    st.stride = cfg.c_stride.wrapping_mul(sizeof_c as RegT);
    st.activation = flags.act;
    st.pool = Default::default();
    config.set_store_config(st)
  }

  fn run_loop_ws(&mut self, cfg: &LoopWsConfig, flags: &LoopWsFlags) -> Result<()> {
    self.program_loop_ws(cfg, flags)?;

    let dim = self.dim();
    let codec = self.codec();
    let (i, j, k) = (cfg.i, cfg.j, cfg.k);
    let sp_rows = self.state.banks.sp_rows();

    let a_sp_addr_start = if flags.a_spad_id == 2 { sp_rows / 2 } else { 0 };
    let b_sp_addr_start = if flags.b_spad_id == 2 {
      sp_rows - k * j * dim
    } else {
      sp_rows / 2 - k * j * dim
    };

    let tile = |idx: usize, last: usize, pad: usize| dim - if idx == last - 1 { pad } else { 0 };
    let elem = ELEM_BYTES as RegT;
    let sizeof_d = (if flags.low_d { ELEM_BYTES } else { ACC_BYTES }) as RegT;
    let sizeof_c = (if flags.full_c { ACC_BYTES } else { ELEM_BYTES }) as RegT;
    let dim_r = dim as RegT;

    // Mvin D
    if cfg.d != 0 {
      for ii in 0..i {
        for jj in 0..j {
          let dram_addr = tile_addr(cfg.d, ii, cfg.d_stride, jj, dim_r * sizeof_d);
          let sp = LocalAddr::accumulator((ii * j + jj) * dim, tile(ii, i, cfg.pad_i), tile(jj, j, cfg.pad_j), false);
          self.mvin(dram_addr, codec.encode(&sp), 2)?;
        }
      }
    }

    for kk in 0..k {
      for jj in 0..j {
        for ii in 0..i {
          let a_row = if flags.a_transpose {
            a_sp_addr_start + (kk * i + ii) * dim
          } else {
            a_sp_addr_start + (ii * k + kk) * dim
          };
          let b_row = if flags.b_transpose {
            b_sp_addr_start + (jj * k + kk) * dim
          } else {
            b_sp_addr_start + (kk * j + jj) * dim
          };
          let c_row = (ii * j + jj) * dim;

          let i_len = tile(ii, i, cfg.pad_i);
          let j_len = tile(jj, j, cfg.pad_j);
          let k_len = tile(kk, k, cfg.pad_k);

          // Mvin A
          if jj == 0 && cfg.a != 0 {
            let (dram_addr, rows, cols) = if flags.a_transpose {
              (tile_addr(cfg.a, kk, cfg.a_stride, ii, dim_r * elem), k_len, i_len)
            } else {
              (tile_addr(cfg.a, ii, cfg.a_stride, kk, dim_r * elem), i_len, k_len)
            };
            self.mvin(dram_addr, codec.encode(&LocalAddr::scratchpad(a_row, rows, cols)), 0)?;
          }

          // Mvin B
          if ii == 0 && cfg.b != 0 {
            let (dram_addr, rows, cols) = if flags.b_transpose {
              (tile_addr(cfg.b, jj, cfg.b_stride, kk, dim_r * elem), j_len, k_len)
            } else {
              (tile_addr(cfg.b, kk, cfg.b_stride, jj, dim_r * elem), k_len, j_len)
            };
            self.mvin(dram_addr, codec.encode(&LocalAddr::scratchpad(b_row, rows, cols)), 1)?;
          }

          // Preload + compute
          let pre_sp_addr = if ii == 0 {
            codec.encode(&LocalAddr::scratchpad(b_row, k_len, j_len))
          } else {
            codec.garbage(k_len, j_len)
          };
          let accumulate = kk > 0 || flags.ex_accumulate || cfg.d != 0;
          let out_sp_addr = codec.encode(&LocalAddr::accumulator(c_row, i_len, j_len, accumulate));
          self.preload(pre_sp_addr, out_sp_addr)?;

          let a_sp_addr = codec.encode(&LocalAddr::scratchpad(a_row, i_len, k_len));
          self.compute(a_sp_addr, codec.garbage(dim, dim), ii == 0)?;

          // Mvout C
          if cfg.c != 0 && kk == k - 1 {
            let dram_addr = tile_addr(cfg.c, ii, cfg.c_stride, jj, dim_r * sizeof_c);
            let sp = LocalAddr::accumulator(c_row, i_len, j_len, false).with_read_full(flags.full_c);
            self.mvout(dram_addr, codec.encode(&sp))?;
          }
        }
      }
    }
    Ok(())
  }
}
