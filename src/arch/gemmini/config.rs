//! Accelerator-wide configuration register and the `config` instruction.

use super::dram::Dram;
use super::error::{bail, ensure, Result};
use super::gemmini::Gemmini;
use super::layout::config as cfg;
use super::params::GemminiParams;
use super::types::{
  acc_scale_from_bits, scale_from_bits, AccScaleT, Activation, Dataflow, RegT, ScaleT, ACC_BITS,
  ACC_SCALE_IDENTITY, MVIN_SCALE_IDENTITY,
};

pub const MAX_RELU6_SHIFT: u32 = 28;

/// Execute pipeline settings (config_ex)
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteConfig {
  pub dataflow: Dataflow,
  pub activation: Activation,
  pub sys_shift: u32,
  pub acc_shift: u32,
  pub relu6_shift: u32,
  pub a_transpose: bool,
  pub b_transpose: bool,
  pub a_stride: usize,
  pub c_stride: usize,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      dataflow: Dataflow::OS,
      activation: Activation::NONE,
      sys_shift: 0,
      acc_shift: 0,
      relu6_shift: 0,
      a_transpose: false,
      b_transpose: false,
      a_stride: 1,
      c_stride: 1,
    }
  }
}

/// Settings of one load state (config_ld)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadConfig {
  /// DRAM bytes between consecutive rows
  pub stride: RegT,
  /// Local rows between consecutive DIM-wide blocks
  pub block_stride: usize,
  pub scale: ScaleT,
  /// Accumulator move-ins read narrow elements
  pub shrunk: bool,
  pub pixels_per_row: usize,
}

impl LoadConfig {
  pub fn new(dim: usize) -> Self {
    Self {
      stride: dim as RegT,
      block_stride: dim,
      scale: MVIN_SCALE_IDENTITY,
      shrunk: false,
      pixels_per_row: 1,
    }
  }
}

/// Max-pool geometry fused into the store path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolConfig {
  pub stride: usize,
  pub size: usize,
  pub upad: usize,
  pub lpad: usize,
  pub out_dim: usize,
  pub porows: usize,
  pub pocols: usize,
  pub orows: usize,
  pub ocols: usize,
}

impl PoolConfig {
  pub fn is_enabled(&self) -> bool {
    self.stride > 0
  }
}

/// Store pipeline settings (config_st)
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
  pub stride: RegT,
  pub activation: Activation,
  pub acc_scale: AccScaleT,
  pub pool: PoolConfig,
}

impl StoreConfig {
  pub fn new(dim: usize) -> Self {
    Self {
      stride: dim as RegT,
      activation: Activation::NONE,
      acc_scale: ACC_SCALE_IDENTITY,
      pool: PoolConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRegister {
  pub ex: ExecuteConfig,
  pub ld: Vec<LoadConfig>,
  pub st: StoreConfig,
}

impl ConfigRegister {
  pub fn new(params: &GemminiParams) -> Self {
    Self {
      ex: ExecuteConfig::default(),
      ld: vec![LoadConfig::new(params.dim); params.load_states],
      st: StoreConfig::new(params.dim),
    }
  }

  pub fn set_execute_config(&mut self, ex: ExecuteConfig) -> Result<()> {
    ensure!(ex.sys_shift < ACC_BITS, "sys_shift {} out of range", ex.sys_shift);
    ensure!(ex.acc_shift < ACC_BITS, "acc_shift {} out of range", ex.acc_shift);
    ensure!(
      ex.relu6_shift <= MAX_RELU6_SHIFT,
      "relu6_shift {} out of range",
      ex.relu6_shift
    );
    check_transpose(ex.dataflow, ex.a_transpose, ex.b_transpose)?;
    self.ex = ex;
    Ok(())
  }

  pub fn set_strides(&mut self, a_stride: usize, c_stride: usize) {
    self.ex.a_stride = a_stride;
    self.ex.c_stride = c_stride;
  }

  pub fn set_load_config(&mut self, state_id: usize, ld: LoadConfig) -> Result<()> {
    ensure!(
      state_id < self.ld.len(),
      "load state {} does not exist ({} states)",
      state_id,
      self.ld.len()
    );
    ensure!(ld.pixels_per_row > 0, "pixels_per_row must be at least one");
    self.ld[state_id] = ld;
    Ok(())
  }

  pub fn set_store_config(&mut self, st: StoreConfig) -> Result<()> {
    let pool = &st.pool;
    ensure!(
      !pool.is_enabled() || pool.size > 0,
      "pool stride {} set without a pool window",
      pool.stride
    );
    self.st = st;
    Ok(())
  }
}

/// Reject transpose combinations the array cannot realise
pub fn check_transpose(dataflow: Dataflow, a_transpose: bool, b_transpose: bool) -> Result<()> {
  match dataflow {
    Dataflow::WS => ensure!(
      !(a_transpose && b_transpose),
      "weight-stationary cannot transpose both A and B"
    ),
    Dataflow::OS => ensure!(
      a_transpose || !b_transpose,
      "output-stationary cannot transpose B without A"
    ),
  }
  Ok(())
}

pub(crate) fn decode_activation(bits: u64) -> Result<Activation> {
  match Activation::from_bits(bits) {
    Some(act) => Ok(act),
    None => bail!("activation encoding {} is reserved", bits),
  }
}

impl<D: Dram> Gemmini<D> {
  pub fn config(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    match cfg::CMD.get(rs1) {
      cfg::CMD_EX => self.config_ex(rs1, rs2),
      cfg::CMD_LD => self.config_ld(rs1, rs2),
      cfg::CMD_ST => self.config_st(rs1, rs2),
      cmd => bail!("config sub-command {} is reserved", cmd),
    }
  }

  fn config_ex(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let a_stride = cfg::EX_A_STRIDE.get(rs1) as usize;
    let c_stride = cfg::EX_C_STRIDE.get(rs2) as usize;

    if !cfg::EX_SET_ONLY_STRIDES.flag(rs1) {
      let ex = ExecuteConfig {
        dataflow: if cfg::EX_DATAFLOW.flag(rs1) {
          Dataflow::WS
        } else {
          Dataflow::OS
        },
        activation: decode_activation(cfg::EX_ACTIVATION.get(rs1))?,
        sys_shift: cfg::EX_SYS_SHIFT.get(rs2) as u32,
        acc_shift: cfg::EX_ACC_SHIFT.get(rs1) as u32,
        relu6_shift: cfg::EX_RELU6_SHIFT.get(rs2) as u32,
        a_transpose: cfg::EX_A_TRANSPOSE.flag(rs1),
        b_transpose: cfg::EX_B_TRANSPOSE.flag(rs1),
        a_stride,
        c_stride,
      };
      self.state.config.set_execute_config(ex)?;
    }
    self.state.config.set_strides(a_stride, c_stride);

    let ex = &self.state.config.ex;
    log::info!(
      "GEMMINI: config_ex - set mode to {:?}, activation to {:?}, sys shift to {}, acc shift to {}, relu6 shift to {}, a transpose to {}, b transpose to {}, a stride to {}, c stride to {}",
      ex.dataflow,
      ex.activation,
      ex.sys_shift,
      ex.acc_shift,
      ex.relu6_shift,
      ex.a_transpose,
      ex.b_transpose,
      ex.a_stride,
      ex.c_stride
    );
    Ok(())
  }

  fn config_ld(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let state_id = cfg::LD_STATE_ID.get(rs1) as usize;
    let ld = LoadConfig {
      stride: cfg::LD_STRIDE.get(rs2),
      block_stride: cfg::LD_BLOCK_STRIDE.get(rs1) as usize,
      scale: scale_from_bits(cfg::LD_SCALE.get(rs1) as u32),
      shrunk: cfg::LD_SHRUNK.flag(rs1),
      pixels_per_row: (cfg::LD_PIXELS_PER_ROW.get(rs1) as usize).max(1),
    };

    log::info!(
      "GEMMINI: config_ld - state {} load stride {} (rs2=0x{:x}), block stride {}, scale {}, shrunk {}, pixels per row {}",
      state_id,
      ld.stride,
      rs2,
      ld.block_stride,
      ld.scale,
      ld.shrunk,
      ld.pixels_per_row
    );
    self.state.config.set_load_config(state_id, ld)
  }

  fn config_st(&mut self, rs1: RegT, rs2: RegT) -> Result<()> {
    let st = StoreConfig {
      stride: cfg::ST_STRIDE.get(rs2),
      activation: decode_activation(cfg::ST_ACTIVATION.get(rs1))?,
      acc_scale: acc_scale_from_bits(cfg::ST_ACC_SCALE.get(rs2) as u32),
      pool: PoolConfig {
        stride: cfg::ST_POOL_STRIDE.get(rs1) as usize,
        size: cfg::ST_POOL_SIZE.get(rs1) as usize,
        upad: cfg::ST_POOL_UPAD.get(rs1) as usize,
        lpad: cfg::ST_POOL_LPAD.get(rs1) as usize,
        out_dim: cfg::ST_POOL_OUT_DIM.get(rs1) as usize,
        porows: cfg::ST_POOL_POROWS.get(rs1) as usize,
        pocols: cfg::ST_POOL_POCOLS.get(rs1) as usize,
        orows: cfg::ST_POOL_OROWS.get(rs1) as usize,
        ocols: cfg::ST_POOL_OCOLS.get(rs1) as usize,
      },
    };

    log::info!(
      "GEMMINI: config_st - set store stride to {}, activation to {:?}, acc scale to {}, pool {:?}",
      st.stride,
      st.activation,
      st.acc_scale,
      st.pool
    );
    self.state.config.set_store_config(st)
  }
}
