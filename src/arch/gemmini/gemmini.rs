use super::addr::{AddressCodec, LocalAddr};
use super::banks::MemoryBanks;
use super::cisc::CiscConfig;
use super::config::ConfigRegister;
use super::counters::{CounterEvent, Counters, ExternalSource};
use super::dram::{read_from_dram, write_to_dram, Dram, DramWord};
use super::error::{GemminiError, Result};
use super::loop_conv::LoopConvConfig;
use super::loop_ws::LoopWsConfig;
use super::params::GemminiParams;
use super::types::{AccT, RegT};

/// Function codes of the custom instructions
pub mod funct {
  pub const CONFIG: u64 = 0;
  pub const MVIN2: u64 = 1;
  pub const MVIN: u64 = 2;
  pub const MVOUT: u64 = 3;
  pub const COMPUTE_PRELOADED: u64 = 4;
  pub const COMPUTE_ACCUMULATED: u64 = 5;
  pub const PRELOAD: u64 = 6;
  pub const FLUSH: u64 = 7;
  pub const LOOP_WS: u64 = 8;
  pub const LOOP_WS_CONFIG_BOUNDS: u64 = 9;
  pub const LOOP_WS_CONFIG_ADDRS_AB: u64 = 10;
  pub const LOOP_WS_CONFIG_ADDRS_DC: u64 = 11;
  pub const LOOP_WS_CONFIG_STRIDES_AB: u64 = 12;
  pub const LOOP_WS_CONFIG_STRIDES_DC: u64 = 13;
  pub const MVIN3: u64 = 14;
  pub const LOOP_CONV_WS: u64 = 15;
  pub const LOOP_CONV_WS_CONFIG_1: u64 = 16;
  pub const LOOP_CONV_WS_CONFIG_2: u64 = 17;
  pub const LOOP_CONV_WS_CONFIG_3: u64 = 18;
  pub const LOOP_CONV_WS_CONFIG_4: u64 = 19;
  pub const LOOP_CONV_WS_CONFIG_5: u64 = 20;
  pub const LOOP_CONV_WS_CONFIG_6: u64 = 21;
  pub const CISC_CONFIG_AB: u64 = 22;
  pub const CISC_CONFIG_CD: u64 = 23;
  pub const CISC_CONFIG_SIZE: u64 = 24;
  pub const CISC_COMPUTE: u64 = 25;
  pub const COUNTER_OP: u64 = 126;
  pub const FENCE: u64 = 127;
}

/// Operands recorded by `preload` for the next `compute`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadState {
  /// Tile loaded into the PE array; `None` loads zeros
  pub source: Option<LocalAddr>,
  /// Where results are written; `None` discards them
  pub output: Option<LocalAddr>,
}

pub struct GemminiState {
  pub params: GemminiParams,
  pub codec: AddressCodec,
  pub banks: MemoryBanks,
  pub pe_state: Vec<Vec<AccT>>,
  pub config: ConfigRegister,
  pub preload: PreloadState,
  pub loop_ws: LoopWsConfig,
  pub loop_conv: LoopConvConfig,
  pub cisc: CiscConfig,
  pub counters: Counters,
  /// Set by the first fatal error; cleared only by reset
  pub fault: Option<String>,
}

impl GemminiState {
  pub fn new(params: GemminiParams) -> Self {
    Self {
      codec: AddressCodec::new(params.addr_layout, params.dim),
      banks: MemoryBanks::new(&params),
      pe_state: vec![vec![0; params.dim]; params.dim],
      config: ConfigRegister::new(&params),
      preload: PreloadState::default(),
      loop_ws: LoopWsConfig::default(),
      loop_conv: LoopConvConfig::default(),
      cisc: CiscConfig::default(),
      counters: Counters::new(),
      fault: None,
      params,
    }
  }

  pub fn reset(&mut self) {
    self.banks.clear();
    for row in self.pe_state.iter_mut() {
      row.fill(0);
    }
    self.config = ConfigRegister::new(&self.params);
    self.preload = PreloadState::default();
    self.loop_ws = LoopWsConfig::default();
    self.loop_conv = LoopConvConfig::default();
    self.cisc = CiscConfig::default();
    self.counters = Counters::new();
    self.fault = None;

    log::info!("Gemmini extension configured with:");
    log::info!("    dim = {}", self.params.dim);
    log::info!(
      "    scratchpad = {} x {} rows, accumulator = {} rows",
      self.params.sp_banks,
      self.params.sp_bank_rows,
      self.params.acc_rows
    );
  }
}

pub type Handler<D> = fn(&mut Gemmini<D>, RegT, RegT) -> Result<RegT>;

/// One entry of the funct -> handler table
pub struct Primitive<D: Dram> {
  pub funct: u64,
  pub name: &'static str,
  pub handler: Handler<D>,
}

impl<D: Dram> Primitive<D> {
  pub fn new(funct: u64, name: &'static str, handler: Handler<D>) -> Self {
    Self { funct, name, handler }
  }
}

impl<D: Dram> Clone for Primitive<D> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<D: Dram> Copy for Primitive<D> {}

impl<D: Dram> std::fmt::Debug for Primitive<D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Primitive").field("funct", &self.funct).field("name", &self.name).finish()
  }
}

/// The instruction table exposed to the host dispatcher
pub fn primitive_instructions<D: Dram>() -> Vec<Primitive<D>> {
  use funct::*;
  vec![
    Primitive::new(CONFIG, "config", |g, rs1, rs2| g.config(rs1, rs2).map(|_| 0)),
    Primitive::new(MVIN, "mvin", |g, rs1, rs2| g.mvin(rs1, rs2, 0).map(|_| 0)),
    Primitive::new(MVIN2, "mvin2", |g, rs1, rs2| g.mvin(rs1, rs2, 1).map(|_| 0)),
    Primitive::new(MVIN3, "mvin3", |g, rs1, rs2| g.mvin(rs1, rs2, 2).map(|_| 0)),
    Primitive::new(MVOUT, "mvout", |g, rs1, rs2| g.mvout(rs1, rs2).map(|_| 0)),
    Primitive::new(PRELOAD, "preload", |g, rs1, rs2| g.preload(rs1, rs2).map(|_| 0)),
    Primitive::new(COMPUTE_PRELOADED, "compute_preloaded", |g, rs1, rs2| {
      g.compute(rs1, rs2, true).map(|_| 0)
    }),
    Primitive::new(COMPUTE_ACCUMULATED, "compute_accumulated", |g, rs1, rs2| {
      g.compute(rs1, rs2, false).map(|_| 0)
    }),
    Primitive::new(FLUSH, "flush", |_, _, _| {
      log::info!("GEMMINI: flush");
      Ok(0)
    }),
    Primitive::new(LOOP_WS, "loop_ws", |g, rs1, rs2| g.loop_ws(rs1, rs2).map(|_| 0)),
    Primitive::new(LOOP_WS_CONFIG_BOUNDS, "loop_ws_config_bounds", |g, rs1, rs2| {
      g.loop_ws_config_bounds(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_WS_CONFIG_ADDRS_AB, "loop_ws_config_addrs_ab", |g, rs1, rs2| {
      g.loop_ws_config_addrs_ab(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_WS_CONFIG_ADDRS_DC, "loop_ws_config_addrs_dc", |g, rs1, rs2| {
      g.loop_ws_config_addrs_dc(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_WS_CONFIG_STRIDES_AB, "loop_ws_config_strides_ab", |g, rs1, rs2| {
      g.loop_ws_config_strides_ab(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_WS_CONFIG_STRIDES_DC, "loop_ws_config_strides_dc", |g, rs1, rs2| {
      g.loop_ws_config_strides_dc(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_CONV_WS, "loop_conv_ws", |g, rs1, rs2| g.loop_conv_ws(rs1, rs2).map(|_| 0)),
    Primitive::new(LOOP_CONV_WS_CONFIG_1, "loop_conv_ws_config_1", |g, rs1, rs2| {
      g.loop_conv_ws_config(1, rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_CONV_WS_CONFIG_2, "loop_conv_ws_config_2", |g, rs1, rs2| {
      g.loop_conv_ws_config(2, rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_CONV_WS_CONFIG_3, "loop_conv_ws_config_3", |g, rs1, rs2| {
      g.loop_conv_ws_config(3, rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_CONV_WS_CONFIG_4, "loop_conv_ws_config_4", |g, rs1, rs2| {
      g.loop_conv_ws_config(4, rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_CONV_WS_CONFIG_5, "loop_conv_ws_config_5", |g, rs1, rs2| {
      g.loop_conv_ws_config(5, rs1, rs2).map(|_| 0)
    }),
    Primitive::new(LOOP_CONV_WS_CONFIG_6, "loop_conv_ws_config_6", |g, rs1, rs2| {
      g.loop_conv_ws_config(6, rs1, rs2).map(|_| 0)
    }),
    Primitive::new(CISC_CONFIG_AB, "cisc_config_ab", |g, rs1, rs2| {
      g.cisc_config_ab(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(CISC_CONFIG_CD, "cisc_config_cd", |g, rs1, rs2| {
      g.cisc_config_cd(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(CISC_CONFIG_SIZE, "cisc_config_size", |g, rs1, rs2| {
      g.cisc_config_size(rs1, rs2).map(|_| 0)
    }),
    Primitive::new(CISC_COMPUTE, "cisc_compute", |g, _, _| g.compute_cisc().map(|_| 0)),
    Primitive::new(COUNTER_OP, "counter_op", |g, rs1, _| g.counter_operation(rs1)),
    Primitive::new(FENCE, "fence", |_, _, _| {
      log::info!("GEMMINI: fence");
      Ok(0)
    }),
  ]
}

/// One accelerator instance attached to a DRAM
pub struct Gemmini<D: Dram> {
  pub state: GemminiState,
  pub dram: D,
  primitives: Vec<Primitive<D>>,
}

impl<D: Dram> Gemmini<D> {
  pub fn new(params: GemminiParams, dram: D) -> Result<Self> {
    params.validate()?;
    let mut gemmini = Self {
      state: GemminiState::new(params),
      dram,
      primitives: primitive_instructions(),
    };
    gemmini.reset();
    Ok(gemmini)
  }

  pub fn params(&self) -> &GemminiParams {
    &self.state.params
  }

  pub fn dim(&self) -> usize {
    self.state.params.dim
  }

  pub fn codec(&self) -> AddressCodec {
    self.state.codec
  }

  /// Reset hook: zero all banks and restore the default configuration
  pub fn reset(&mut self) {
    self.state.reset();
  }

  pub fn primitive_instructions(&self) -> &[Primitive<D>] {
    &self.primitives
  }

  pub fn is_halted(&self) -> bool {
    self.state.fault.is_some()
  }

  pub fn into_dram(self) -> D {
    self.dram
  }

  /// Run one instruction to completion.
  ///
  /// Returns the value written back to the destination register. A fatal
  /// error halts the accelerator; every later call fails with
  /// [`GemminiError::Halted`] until [`Gemmini::reset`].
  pub fn execute(&mut self, funct: u64, rs1: RegT, rs2: RegT) -> Result<RegT> {
    if let Some(reason) = &self.state.fault {
      return Err(GemminiError::Halted { reason: reason.clone() });
    }

    let primitive = match self.primitives.iter().find(|p| p.funct == funct) {
      Some(p) => *p,
      None => {
        log::error!("GEMMINI: encountered unknown instruction with funct: {}", funct);
        return Err(GemminiError::UnknownInstruction { funct });
      },
    };

    log::trace!("GEMMINI: {} rs1=0x{:x} rs2=0x{:x}", primitive.name, rs1, rs2);
    self.state.counters.record(CounterEvent::Instructions, 1);

    let result = (primitive.handler)(self, rs1, rs2);
    if let Err(e) = &result {
      if e.is_fatal() {
        log::error!("GEMMINI: {} faulted, accelerator halted: {}", primitive.name, e);
        self.state.fault = Some(e.to_string());
        self.state.counters.add_external(ExternalSource::Faults, 1);
      }
    }
    self.sync_external_counters();
    result
  }

  fn sync_external_counters(&mut self) {
    let spad_writes = self.state.banks.spad_writes();
    let acc_writes = self.state.banks.acc_writes();
    let counters = &mut self.state.counters;
    counters.set_external(ExternalSource::SpadElemsWritten, spad_writes);
    counters.set_external(ExternalSource::AccElemsWritten, acc_writes);
  }

  pub(crate) fn read_dram<T: DramWord>(&mut self, addr: RegT) -> T {
    self.state.counters.add_external(ExternalSource::DramBytesRead, T::BYTES as u64);
    read_from_dram(&self.dram, addr)
  }

  pub(crate) fn write_dram<T: DramWord>(&mut self, addr: RegT, value: T) {
    self.state.counters.add_external(ExternalSource::DramBytesWritten, T::BYTES as u64);
    write_to_dram(&mut self.dram, addr, value)
  }
}
