//! Convolution as a loop nest over the scratchpad and accumulator.
//!
//! Bias, input and weights are moved in to fixed regions, the kernel is
//! swept as a series of weight-stationary matmuls, and the accumulated
//! output is stored either directly or through the pooling path.

use super::addr::LocalAddr;
use super::config::{decode_activation, LoadConfig, PoolConfig};
use super::counters::CounterEvent;
use super::dram::Dram;
use super::error::{bail, ensure, Result};
use super::gemmini::Gemmini;
use super::layout::loop_conv as lc;
use super::types::{Activation, RegT, ACC_BYTES, ELEM_BYTES, MVIN_SCALE_IDENTITY};

/// Registers written by loop_conv_ws_config_1 .. loop_conv_ws_config_6
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopConvConfig {
  pub batch_size: usize,
  pub in_row_dim: usize,
  pub in_col_dim: usize,
  pub in_channels: usize,
  pub out_channels: usize,
  pub out_row_dim: usize,
  pub out_col_dim: usize,
  pub pool_out_row_dim: usize,
  pub pool_out_col_dim: usize,
  pub stride: usize,
  pub padding: usize,
  pub kernel_dim: usize,
  pub kernel_dilation: usize,
  pub pool_size: usize,
  pub pool_stride: usize,
  pub pool_padding: usize,
  pub batches: usize,
  pub porows: usize,
  pub pocols: usize,
  pub pochs: usize,
  pub krows: usize,
  pub kcols: usize,
  pub kchs: usize,
  pub lpad: usize,
  pub rpad: usize,
  pub upad: usize,
  pub dpad: usize,
  pub plpad: usize,
  pub prad: usize,
  pub pupad: usize,
  pub pdpad: usize,
  pub orows: usize,
  pub ocols: usize,
  pub in_stride: usize,
  pub weight_stride: usize,
  pub out_stride: usize,
  pub weights: RegT,
  pub output: RegT,
  pub bias: RegT,
  pub input: RegT,
}

/// Per-invocation flags of loop_conv_ws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConvFlags {
  pub no_bias: bool,
  pub wrot180: bool,
  pub trans_output_1203: bool,
  pub trans_weight_1203: bool,
  pub trans_weight_0132: bool,
  pub trans_input_3120: bool,
  pub dw: bool,
  pub max_pixels_per_row: usize,
  pub a_spad_id: u64,
  pub b_spad_id: u64,
  pub no_pool: bool,
  pub downsample: bool,
  pub input_dilated: bool,
  pub activation: Activation,
}

impl LoopConvFlags {
  pub fn decode(rs1: RegT, rs2: RegT) -> Result<Self> {
    Ok(Self {
      no_bias: lc::NO_BIAS.flag(rs1),
      wrot180: lc::WROT180.flag(rs1),
      trans_output_1203: lc::TRANS_OUTPUT_1203.flag(rs1),
      trans_weight_1203: lc::TRANS_WEIGHT_1203.flag(rs1),
      trans_weight_0132: lc::TRANS_WEIGHT_0132.flag(rs1),
      trans_input_3120: lc::TRANS_INPUT_3120.flag(rs1),
      dw: lc::DW.flag(rs1),
      max_pixels_per_row: (lc::MAX_PIXELS_PER_ROW.get(rs1) as usize).max(1),
      a_spad_id: lc::A_SPAD_ID.get(rs1),
      b_spad_id: lc::B_SPAD_ID.get(rs1),
      no_pool: lc::NO_POOL.flag(rs2),
      downsample: lc::DOWNSAMPLE.flag(rs2),
      input_dilated: lc::INPUT_DILATED.flag(rs2),
      activation: decode_activation(lc::ACTIVATION.get(rs2))?,
    })
  }
}

/// Derived geometry shared by every phase of one loop_conv_ws
#[derive(Debug, Clone)]
struct ConvPlan {
  cfg: LoopConvConfig,
  flags: LoopConvFlags,
  dim: usize,
  ochs: usize,
  ichs: usize,
  irows: usize,
  icols: usize,
  irows_unpadded: i64,
  icols_unpadded: i64,
  a_sp_addr_start: usize,
  b_sp_addr_start: usize,
  a_rows: usize,
  b_rows: usize,
  c_rows: usize,
}

impl ConvPlan {
  fn undilated(&self, x: i64) -> i64 {
    if self.flags.input_dilated {
      (x + 1) >> 1
    } else {
      x
    }
  }

  fn ds(&self, x: usize) -> usize {
    if self.flags.downsample {
      x >> 1
    } else {
      x
    }
  }

  fn us(&self, x: usize) -> usize {
    if self.flags.downsample {
      x << 1
    } else {
      x
    }
  }

  /// Accumulator row holding output pixel (b, orow, ocol) of channel block `och / dim`
  fn c_row(&self, och: usize, b: usize, orow: usize, ocol: usize) -> usize {
    let (batches, orows, ocols) = (self.cfg.batches, self.cfg.orows, self.cfg.ocols);
    (och / self.dim) * batches * orows * ocols + b * orows * ocols + orow * ocols + ocol
  }

  fn b_row(&self, och: usize, krow: usize, kcol: usize, kch: usize) -> usize {
    let (krows, kcols, kchs, ochs) = (self.cfg.krows, self.cfg.kcols, self.cfg.kchs, self.ochs);
    if self.flags.trans_weight_0132 {
      self.b_sp_addr_start + (kch / self.dim) * krows * kcols * ochs + krow * kcols * ochs + kcol * ochs + och
    } else {
      self.b_sp_addr_start + (och / self.dim) * krows * kcols * kchs + krow * kcols * kchs + kcol * kchs + kch
    }
  }
}

impl<D: Dram> Gemmini<D> {
  pub fn loop_conv_ws_config(&mut self, n: u8, rs1: RegT, rs2: RegT) -> Result<()> {
    let cfg = &mut self.state.loop_conv;
    let get = |field: super::layout::Field, reg: RegT| field.get(reg) as usize;

    match n {
      1 => {
        cfg.batch_size = get(lc::BATCH_SIZE, rs1);
        cfg.in_row_dim = get(lc::IN_ROW_DIM, rs1);
        cfg.in_channels = get(lc::IN_CHANNELS, rs1);
        cfg.out_channels = get(lc::OUT_CHANNELS, rs1);
        cfg.out_row_dim = get(lc::OUT_ROW_DIM, rs2);
        cfg.pool_out_row_dim = get(lc::POOL_OUT_ROW_DIM, rs2);
        cfg.out_col_dim = get(lc::OUT_COL_DIM, rs2);
        cfg.stride = get(lc::STRIDE, rs2);
        cfg.padding = get(lc::PADDING, rs2);
      },
      2 => {
        cfg.pool_padding = get(lc::POOL_PADDING, rs1);
        cfg.pool_stride = get(lc::POOL_STRIDE, rs1);
        cfg.pool_size = get(lc::POOL_SIZE, rs1);
        cfg.pool_out_col_dim = get(lc::POOL_OUT_COL_DIM, rs1);
        cfg.kernel_dim = get(lc::KERNEL_DIM, rs1);
        cfg.pochs = get(lc::POCHS, rs2);
        cfg.pocols = get(lc::POCOLS, rs2);
        cfg.porows = get(lc::POROWS, rs2);
        cfg.batches = get(lc::BATCHES, rs2);
      },
      3 => {
        cfg.lpad = get(lc::LPAD, rs1);
        cfg.kchs = get(lc::KCHS, rs1);
        cfg.kcols = get(lc::KCOLS, rs1);
        cfg.krows = get(lc::KROWS, rs1);
        cfg.in_col_dim = get(lc::IN_COL_DIM, rs2);
        cfg.plpad = get(lc::PLPAD, rs2);
        cfg.dpad = get(lc::DPAD, rs2);
        cfg.upad = get(lc::UPAD, rs2);
        cfg.rpad = get(lc::RPAD, rs2);
      },
      4 => {
        cfg.kernel_dilation = get(lc::KERNEL_DILATION, rs1);
        cfg.pdpad = get(lc::PDPAD, rs1);
        cfg.pupad = get(lc::PUPAD, rs1);
        cfg.prad = get(lc::PRAD, rs1);
        cfg.orows = get(lc::OROWS, rs1);
        cfg.ocols = get(lc::OCOLS, rs2);
        cfg.out_stride = get(lc::OUT_STRIDE, rs2);
        cfg.weight_stride = get(lc::WEIGHT_STRIDE, rs2);
        cfg.in_stride = get(lc::IN_STRIDE, rs2);
      },
      5 => {
        cfg.weights = rs1;
        cfg.output = rs2;
      },
      6 => {
        cfg.bias = rs1;
        cfg.input = rs2;
      },
      _ => bail!("loop_conv_ws_config_{} does not exist", n),
    }

    log::info!(
      "GEMMINI: loop_conv_ws_config_{} - rs1 0x{:x}, rs2 0x{:x}",
      n,
      rs1,
      rs2
    );
    Ok(())
  }

  pub fn loop_conv_ws(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let flags = LoopConvFlags::decode(rs1, rs2)?;
    self.check_loop_preconditions("loop_conv_ws")?;
    let plan = self.plan_loop_conv(flags)?;

    log::info!(
      "GEMMINI: loop_conv_ws - batches {} orows {} ocols {} ochs {} krows {} kcols {} kchs {}, {:?}",
      plan.cfg.batches,
      plan.cfg.orows,
      plan.cfg.ocols,
      plan.ochs,
      plan.cfg.krows,
      plan.cfg.kcols,
      plan.cfg.kchs,
      flags
    );

    let saved = self.state.config.clone();
    let result = self.run_loop_conv(&plan);
    self.state.config = saved;
    result?;

    self.state.counters.record(CounterEvent::LoopConvWs, 1);
    Ok(())
  }

  fn plan_loop_conv(&self, flags: LoopConvFlags) -> Result<ConvPlan> {
    let cfg = self.state.loop_conv.clone();
    let dim = self.dim();

    ensure!(
      cfg.batches > 0 && cfg.orows > 0 && cfg.ocols > 0 && cfg.pochs > 0,
      "loop_conv_ws output extents must be non-zero"
    );
    ensure!(
      cfg.krows > 0 && cfg.kcols > 0 && cfg.kchs > 0,
      "loop_conv_ws kernel extents must be non-zero"
    );
    ensure!(cfg.stride > 0, "loop_conv_ws stride must be non-zero");
    ensure!(cfg.kernel_dilation > 0, "loop_conv_ws kernel dilation must be non-zero");

    let ochs = cfg.pochs;
    let ichs = cfg.kchs;

    let dilated_krows = cfg.krows + (cfg.kernel_dilation - 1) * (cfg.krows - 1);
    let dilated_kcols = cfg.kcols + (cfg.kernel_dilation - 1) * (cfg.kcols - 1);
    let irows_without_dilation = (cfg.orows * cfg.stride + dilated_krows - 1) as i64;
    let icols_without_dilation = (cfg.ocols * cfg.stride + dilated_kcols - 1) as i64;
    let irows_unpadded_without_dilation = irows_without_dilation - (cfg.upad + cfg.dpad) as i64;
    let icols_unpadded_without_dilation = icols_without_dilation - (cfg.lpad + cfg.rpad) as i64;
    ensure!(
      irows_unpadded_without_dilation >= 0 && icols_unpadded_without_dilation >= 0,
      "loop_conv_ws padding exceeds the input window"
    );

    let mut plan = ConvPlan {
      cfg,
      flags,
      dim,
      ochs,
      ichs,
      irows: 0,
      icols: 0,
      irows_unpadded: irows_unpadded_without_dilation,
      icols_unpadded: icols_unpadded_without_dilation,
      a_sp_addr_start: 0,
      b_sp_addr_start: 0,
      a_rows: 0,
      b_rows: 0,
      c_rows: 0,
    };

    if flags.input_dilated {
      plan.irows_unpadded = (irows_unpadded_without_dilation + 1) / 2;
      plan.icols_unpadded = (icols_unpadded_without_dilation + 1) / 2;
      let (upad, dpad) = (plan.cfg.upad as i64, plan.cfg.dpad as i64);
      let (lpad, rpad) = (plan.cfg.lpad as i64, plan.cfg.rpad as i64);
      plan.irows = (plan.irows_unpadded + plan.undilated(upad) + plan.undilated(dpad)) as usize;
      plan.icols = (plan.icols_unpadded + plan.undilated(lpad) + plan.undilated(rpad)) as usize;
    } else {
      plan.irows = irows_without_dilation as usize;
      plan.icols = icols_without_dilation as usize;
    }

    let cfg = &plan.cfg;
    let pixels = plan.ds(plan.irows) * plan.ds(plan.icols);
    plan.a_rows = if flags.trans_input_3120 {
      cfg.batches.div_ceil(dim) * ichs * pixels
    } else {
      ichs.div_ceil(dim) * cfg.batches * pixels
    };
    plan.b_rows = if flags.trans_weight_0132 {
      ichs.div_ceil(dim) * cfg.kcols * cfg.krows * ochs
    } else {
      ochs.div_ceil(dim) * cfg.kcols * cfg.krows * ichs
    };
    plan.c_rows = ochs.div_ceil(dim) * cfg.batches * cfg.orows * cfg.ocols;

    let sp_rows = self.state.banks.sp_rows();
    let acc_rows = self.state.banks.acc_rows();
    ensure!(
      plan.a_rows + plan.b_rows <= sp_rows / 2 && plan.c_rows <= acc_rows / 2,
      "LOOP_CONV_WS bounds were too large for double-buffering"
    );

    plan.a_sp_addr_start = if flags.a_spad_id == 2 { sp_rows / 2 } else { 0 };
    plan.b_sp_addr_start = if flags.b_spad_id == 2 {
      sp_rows - plan.b_rows
    } else {
      sp_rows / 2 - plan.b_rows
    };
    Ok(plan)
  }

  fn run_loop_conv(&mut self, plan: &ConvPlan) -> Result<()> {
    let mut ex = self.state.config.ex.clone();
    // Transposed input holds channels down the rows, transposed weights hold output channels
    ex.a_transpose = plan.flags.trans_input_3120;
    ex.b_transpose = plan.flags.trans_weight_0132;
    ex.a_stride = plan.ds(plan.cfg.stride).max(1);
    ex.c_stride = 1;
    self.state.config.set_execute_config(ex)?;

    self.mvin_conv_bias(plan)?;
    if plan.cfg.input != 0 {
      self.mvin_conv_input(plan)?;
    }
    if plan.cfg.weights != 0 {
      self.mvin_conv_weights(plan)?;
    }
    self.compute_conv(plan)?;

    if plan.cfg.output != 0 {
      if plan.flags.no_pool {
        self.mvout_conv(plan)?;
      } else {
        self.mvout_conv_pooled(plan)?;
      }
    }
    Ok(())
  }

  // Every output pixel starts from the bias, or from zero without one
  fn mvin_conv_bias(&mut self, plan: &ConvPlan) -> Result<()> {
    let dim = plan.dim;
    let cfg = &plan.cfg;
    let codec = self.codec();
    let max_ochs_per_mvin = plan.ochs.min(self.state.params.max_block_len_acc() * dim);

    self.state.config.set_load_config(
      2,
      LoadConfig {
        stride: 0,
        block_stride: cfg.batches * cfg.orows * cfg.ocols,
        scale: MVIN_SCALE_IDENTITY,
        shrunk: false,
        pixels_per_row: 1,
      },
    )?;

    for b in 0..cfg.batches {
      for orow in 0..cfg.orows {
        for ocol in (0..cfg.ocols).step_by(dim) {
          let i = (cfg.ocols - ocol).min(dim);

          for och in (0..plan.ochs).step_by(max_ochs_per_mvin) {
            let j = (plan.ochs - och).min(max_ochs_per_mvin);
            let d_sp_addr = LocalAddr::accumulator(plan.c_row(och, b, orow, ocol), i, j, false);

            let bias_addr = if plan.flags.no_bias || cfg.bias == 0 {
              0
            } else {
              cfg.bias.wrapping_add((och * ACC_BYTES) as RegT)
            };
            self.mvin(bias_addr, codec.encode(&d_sp_addr), 2)?;
          }
        }
      }
    }
    Ok(())
  }

  fn mvin_conv_input(&mut self, plan: &ConvPlan) -> Result<()> {
    let dim = plan.dim;
    let cfg = &plan.cfg;
    let flags = &plan.flags;
    let codec = self.codec();
    let max_block = self.state.params.max_block_len() * dim;

    let max_chs_per_mvin = if flags.trans_input_3120 {
      cfg.batches.min(max_block)
    } else {
      plan.ichs.min(max_block)
    };
    let dram_stride = if flags.trans_input_3120 {
      cfg.batch_size * ELEM_BYTES
    } else {
      cfg.in_stride * ELEM_BYTES
    };
    let spad_image = plan.ds(plan.irows) * plan.ds(plan.icols);
    let spad_stride = if flags.trans_input_3120 {
      plan.ichs * spad_image
    } else {
      cfg.batches * spad_image
    };

    self.state.config.set_load_config(
      0,
      LoadConfig {
        stride: plan.us(dram_stride) as RegT,
        block_stride: spad_stride,
        scale: MVIN_SCALE_IDENTITY,
        shrunk: false,
        pixels_per_row: flags.max_pixels_per_row,
      },
    )?;

    let b_it = if flags.trans_input_3120 { max_chs_per_mvin } else { 1 };
    let ich_it = if flags.trans_input_3120 { 1 } else { max_chs_per_mvin };
    let (upad, dpad) = (plan.undilated(cfg.upad as i64), plan.undilated(cfg.dpad as i64));
    let (lpad, rpad) = (plan.undilated(cfg.lpad as i64), plan.undilated(cfg.rpad as i64));
    let (irows_unpadded, icols_unpadded) = (plan.irows_unpadded, plan.icols_unpadded);
    let dim_i = dim as i64;

    for b in (0..cfg.batches).step_by(b_it) {
      let mut irow = -upad;
      while irow < irows_unpadded + dpad {
        let irow_padded = (irow + upad) as usize;

        let mut icol = -lpad;
        while icol < icols_unpadded + rpad {
          let i = if icol >= 0 && icol < icols_unpadded {
            (icols_unpadded - icol).min(plan.us(dim) as i64)
          } else if icol < 0 {
            (-icol).min(dim_i)
          } else {
            (icols_unpadded + rpad - icol).min(dim_i)
          };
          let icol_padded = (icol + lpad) as usize;
          let is_zeros = irow < 0 || irow >= irows_unpadded || icol < 0 || icol >= icols_unpadded;

          for ich in (0..plan.ichs).step_by(ich_it) {
            let k = if flags.trans_input_3120 {
              (cfg.batches - b).min(max_chs_per_mvin)
            } else {
              (plan.ichs - ich).min(max_chs_per_mvin)
            };

            let pixel = plan.ds(irow_padded) * plan.ds(plan.icols) + plan.ds(icol_padded);
            let a_row = if flags.trans_input_3120 {
              plan.a_sp_addr_start + (b / dim) * spad_stride + ich * spad_image + pixel
            } else {
              plan.a_sp_addr_start + (ich / dim) * spad_stride + b * spad_image + pixel
            };

            let in_addr = if is_zeros {
              0
            } else {
              let (irow, icol) = (irow as usize, icol as usize);
              let offset = if flags.trans_input_3120 {
                (ich * cfg.in_row_dim * cfg.in_col_dim + irow * cfg.in_col_dim + icol) * cfg.batch_size + b
              } else {
                (b * cfg.in_row_dim * cfg.in_col_dim + irow * cfg.in_col_dim + icol) * cfg.in_stride + ich
              };
              cfg.input.wrapping_add((offset * ELEM_BYTES) as RegT)
            };

            let sp = LocalAddr::scratchpad(a_row, plan.ds(i as usize), k);
            self.mvin(in_addr, codec.encode(&sp), 0)?;
          }

          icol += i;
        }

        irow += plan.us(1) as i64;
      }
    }
    Ok(())
  }

  fn mvin_conv_weights(&mut self, plan: &ConvPlan) -> Result<()> {
    let dim = plan.dim;
    let cfg = &plan.cfg;
    let flags = &plan.flags;
    let codec = self.codec();
    let max_block = self.state.params.max_block_len() * dim;

    let max_chs_per_mvin = if flags.trans_weight_0132 {
      cfg.kchs.min(max_block)
    } else {
      plan.ochs.min(max_block)
    };
    let dram_stride = if flags.dw {
      ELEM_BYTES
    } else if flags.trans_weight_1203 {
      cfg.kernel_dim * cfg.kernel_dim * cfg.out_channels * ELEM_BYTES
    } else if flags.trans_weight_0132 {
      cfg.in_channels * ELEM_BYTES
    } else {
      cfg.weight_stride * ELEM_BYTES
    };
    let spad_block_stride = if flags.trans_weight_0132 {
      cfg.krows * cfg.kcols * plan.ochs
    } else {
      cfg.krows * cfg.kcols * cfg.kchs
    };

    self.state.config.set_load_config(
      1,
      LoadConfig {
        stride: dram_stride as RegT,
        block_stride: spad_block_stride,
        scale: MVIN_SCALE_IDENTITY,
        shrunk: false,
        pixels_per_row: 1,
      },
    )?;

    let och_it = if flags.trans_weight_0132 { dim } else { max_chs_per_mvin };
    let kch_it = if flags.trans_weight_0132 { max_chs_per_mvin } else { dim };
    let kernel_dim = cfg.kernel_dim;

    for och in (0..plan.ochs).step_by(och_it) {
      for krow in 0..cfg.krows {
        for kcol in 0..cfg.kcols {
          for kch in (0..cfg.kchs).step_by(kch_it) {
            let (k, j) = if flags.trans_weight_0132 {
              ((plan.ochs - och).min(dim), (cfg.kchs - kch).min(max_chs_per_mvin))
            } else {
              ((cfg.kchs - kch).min(dim), (plan.ochs - och).min(max_chs_per_mvin))
            };

            let offset = if flags.dw {
              krow * kernel_dim + kcol
            } else if flags.trans_weight_1203 {
              (kch * kernel_dim * kernel_dim + krow * kernel_dim + kcol) * cfg.out_channels + och
            } else if flags.trans_weight_0132 {
              (krow * kernel_dim * cfg.out_channels + kcol * cfg.out_channels + och) * cfg.in_channels + kch
            } else {
              (krow * kernel_dim * cfg.in_channels + kcol * cfg.in_channels + kch) * cfg.weight_stride + och
            };

            let sp = LocalAddr::scratchpad(plan.b_row(och, krow, kcol, kch), k, j);
            self.mvin(cfg.weights.wrapping_add((offset * ELEM_BYTES) as RegT), codec.encode(&sp), 1)?;
          }
        }
      }
    }
    Ok(())
  }

  fn compute_conv(&mut self, plan: &ConvPlan) -> Result<()> {
    let dim = plan.dim;
    let cfg = &plan.cfg;
    let flags = &plan.flags;
    let codec = self.codec();

    let dilation_shift = if flags.input_dilated { 1 } else { 0 };
    let b_it = if flags.trans_input_3120 { dim } else { 1 };
    let ocol_it = if flags.trans_input_3120 { 1 } else { dim << dilation_shift };

    if flags.trans_input_3120 {
      self.state.config.set_strides(plan.irows * plan.icols, cfg.orows * cfg.ocols);
    }

    let spad_image = plan.ds(plan.irows) * plan.ds(plan.icols);
    let (upad, lpad) = (cfg.upad as i64, cfg.lpad as i64);
    let dilation = cfg.kernel_dilation;

    for och in (0..plan.ochs).step_by(dim) {
      for krow in 0..cfg.krows {
        for kcol in (0..cfg.kcols).step_by(flags.max_pixels_per_row) {
          for kch in (0..cfg.kchs).step_by(dim) {
            let mut new_weights = true;

            for b in (0..cfg.batches).step_by(b_it) {
              for orow in 0..cfg.orows {
                if flags.input_dilated && ((krow * dilation + orow) as i64 - upad).rem_euclid(2) != 0 {
                  continue;
                }

                let mut ocol = 0;
                while ocol < cfg.ocols {
                  if flags.input_dilated && ((kcol * dilation + ocol) as i64 - lpad).rem_euclid(2) != 0 {
                    ocol += 1;
                    continue;
                  }

                  let irow = plan.undilated((orow * cfg.stride + krow * dilation) as i64) as usize;
                  let icol = plan.undilated((ocol * cfg.stride + kcol * dilation) as i64) as usize;

                  let pixels = (cfg.kcols - kcol).min(flags.max_pixels_per_row);
                  let i = if flags.trans_input_3120 {
                    (cfg.batches - b).min(dim)
                  } else {
                    plan.undilated((cfg.ocols - ocol).min(dim << dilation_shift) as i64) as usize
                  };
                  let j = (plan.ochs - och).min(dim);
                  let k = pixels * (cfg.kchs - kch).min(dim);

                  let pixel = plan.ds(irow) * plan.ds(plan.icols) + plan.ds(icol);
                  let a_row = if flags.trans_input_3120 {
                    plan.a_sp_addr_start + (b / dim) * cfg.kchs * spad_image + kch * spad_image + pixel
                  } else {
                    plan.a_sp_addr_start + (kch / dim) * cfg.batches * spad_image + b * spad_image + pixel
                  };

                  let (krow_, kcol_) = if flags.wrot180 {
                    (cfg.krows - krow - 1, cfg.kcols - kcol - 1)
                  } else {
                    (krow, kcol)
                  };
                  let b_row = plan.b_row(och, krow_, kcol_, kch);

                  let pre_sp_addr = if new_weights {
                    codec.encode(&LocalAddr::scratchpad(b_row, k, j))
                  } else {
                    codec.garbage(k, j)
                  };
                  let out_sp_addr = LocalAddr::accumulator(plan.c_row(och, b, orow, ocol), i, j, true);
                  self.preload(pre_sp_addr, codec.encode(&out_sp_addr))?;

                  let a_sp_addr = codec.encode(&LocalAddr::scratchpad(a_row, i, k));
                  self.compute(a_sp_addr, codec.garbage(i, j), new_weights)?;

                  ocol += ocol_it;
                  new_weights = false;
                }
              }
            }
          }
        }
      }
    }
    Ok(())
  }

  fn mvout_conv(&mut self, plan: &ConvPlan) -> Result<()> {
    let dim = plan.dim;
    let cfg = &plan.cfg;
    let codec = self.codec();

    let mut st = self.state.config.st.clone();
    st.stride = if plan.flags.trans_output_1203 {
      (cfg.batch_size * cfg.out_channels * ELEM_BYTES) as RegT
    } else {
      (cfg.out_stride * ELEM_BYTES) as RegT
    };
    st.activation = plan.flags.activation;
    st.pool = PoolConfig::default();
    self.state.config.set_store_config(st)?;

    for b in 0..cfg.batches {
      for orow in 0..cfg.orows {
        for ocol in (0..cfg.ocols).step_by(dim) {
          let i = (cfg.ocols - ocol).min(dim);

          for och in (0..plan.ochs).step_by(dim) {
            let j = (plan.ochs - och).min(dim);
            let offset = if plan.flags.trans_output_1203 {
              (orow * cfg.out_col_dim * cfg.batch_size + ocol * cfg.batch_size + b) * cfg.out_channels + och
            } else {
              (b * cfg.out_row_dim * cfg.out_col_dim + orow * cfg.out_col_dim + ocol) * cfg.out_stride + och
            };

            let sp = LocalAddr::accumulator(plan.c_row(och, b, orow, ocol), i, j, false);
            self.mvout(cfg.output.wrapping_add((offset * ELEM_BYTES) as RegT), codec.encode(&sp))?;
          }
        }
      }
    }
    Ok(())
  }

  fn mvout_conv_pooled(&mut self, plan: &ConvPlan) -> Result<()> {
    let dim = plan.dim;
    let cfg = &plan.cfg;
    let codec = self.codec();

    let mut st = self.state.config.st.clone();
    st.stride = (cfg.out_stride * ELEM_BYTES) as RegT;
    st.activation = plan.flags.activation;
    st.pool = PoolConfig {
      stride: cfg.pool_stride,
      size: cfg.pool_size,
      upad: cfg.pupad,
      lpad: cfg.plpad,
      out_dim: cfg.pool_out_col_dim,
      porows: cfg.porows,
      pocols: cfg.pocols,
      orows: cfg.orows,
      ocols: cfg.ocols,
    };
    self.state.config.set_store_config(st)?;

    for b in 0..cfg.batches {
      for poch in (0..cfg.pochs).step_by(dim) {
        let channels = (cfg.pochs - poch).min(dim);
        let sp = LocalAddr::accumulator(plan.c_row(poch, b, 0, 0), 0, channels, false);
        let offset = b * cfg.pool_out_row_dim * cfg.pool_out_col_dim * cfg.out_stride + poch;
        self.mvout(cfg.output.wrapping_add((offset * ELEM_BYTES) as RegT), codec.encode(&sp))?;
      }
    }
    Ok(())
  }
}
