#![allow(dead_code)]

use gemmini_sim::arch::gemmini::layout::{config as cfg, counter, loop_ws as lw};
use gemmini_sim::arch::gemmini::types::{acc_scale_to_bits, scale_to_bits};
use gemmini_sim::arch::gemmini::{
  funct, Activation, AddrLayout, AddressCodec, Dataflow, FlatDram, Gemmini, GemminiParams, LocalAddr, RegT,
};
use gemmini_sim::simulator::utils::log::init_log;

pub const DIM: usize = 16;

pub fn new_gemmini() -> Gemmini<FlatDram> {
  init_log(true);
  Gemmini::new(GemminiParams::default(), FlatDram::new()).expect("default params are valid")
}

fn codec() -> AddressCodec {
  AddressCodec::new(AddrLayout::RowCol, DIM)
}

pub fn spad(row: usize, rows: usize, cols: usize) -> RegT {
  codec().encode(&LocalAddr::scratchpad(row, rows, cols))
}

pub fn acc(row: usize, rows: usize, cols: usize, accumulate: bool) -> RegT {
  codec().encode(&LocalAddr::accumulator(row, rows, cols, accumulate))
}

pub fn acc_full(row: usize, rows: usize, cols: usize) -> RegT {
  codec().encode(&LocalAddr::accumulator(row, rows, cols, false).with_read_full(true))
}

pub fn garbage(rows: usize, cols: usize) -> RegT {
  codec().garbage(rows, cols)
}

pub fn config_ex(dataflow: Dataflow, act: Activation, sys_shift: u64, a_transpose: bool, b_transpose: bool) -> (RegT, RegT) {
  let mut rs1 = cfg::CMD.put(0, cfg::CMD_EX);
  rs1 = cfg::EX_DATAFLOW.put(rs1, (dataflow == Dataflow::WS) as RegT);
  rs1 = cfg::EX_ACTIVATION.put(rs1, act.bits());
  rs1 = cfg::EX_A_TRANSPOSE.put(rs1, a_transpose as RegT);
  rs1 = cfg::EX_B_TRANSPOSE.put(rs1, b_transpose as RegT);
  rs1 = cfg::EX_A_STRIDE.put(rs1, 1);
  let mut rs2 = cfg::EX_SYS_SHIFT.put(0, sys_shift);
  rs2 = cfg::EX_C_STRIDE.put(rs2, 1);
  (rs1, rs2)
}

pub fn set_dataflow(g: &mut Gemmini<FlatDram>, dataflow: Dataflow) {
  let (rs1, rs2) = config_ex(dataflow, Activation::NONE, 0, false, false);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
}

pub fn config_ld(state: u64, stride: u64, shrunk: bool, pixels: u64) -> (RegT, RegT) {
  let mut rs1 = cfg::CMD.put(0, cfg::CMD_LD);
  rs1 = cfg::LD_STATE_ID.put(rs1, state);
  rs1 = cfg::LD_SHRUNK.put(rs1, shrunk as RegT);
  rs1 = cfg::LD_PIXELS_PER_ROW.put(rs1, pixels);
  rs1 = cfg::LD_BLOCK_STRIDE.put(rs1, DIM as RegT);
  rs1 = cfg::LD_SCALE.put(rs1, scale_to_bits(1.0) as RegT);
  (rs1, cfg::LD_STRIDE.put(0, stride))
}

pub fn set_load(g: &mut Gemmini<FlatDram>, state: u64, stride: u64) {
  let (rs1, rs2) = config_ld(state, stride, false, 1);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
}

pub fn config_st(stride: u64, act: Activation, acc_scale: f32) -> (RegT, RegT) {
  let mut rs1 = cfg::CMD.put(0, cfg::CMD_ST);
  rs1 = cfg::ST_ACTIVATION.put(rs1, act.bits());
  let mut rs2 = cfg::ST_STRIDE.put(0, stride);
  rs2 = cfg::ST_ACC_SCALE.put(rs2, acc_scale_to_bits(acc_scale) as RegT);
  (rs1, rs2)
}

pub fn set_store(g: &mut Gemmini<FlatDram>, stride: u64, act: Activation) {
  let (rs1, rs2) = config_st(stride, act, 1.0);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
}

/// Issue the five loop_ws configuration instructions
#[allow(clippy::too_many_arguments)]
pub fn config_loop_ws(
  g: &mut Gemmini<FlatDram>,
  (m, n, k): (usize, usize, usize),
  (a, b, d, c): (RegT, RegT, RegT, RegT),
  (a_stride, b_stride, d_stride, c_stride): (RegT, RegT, RegT, RegT),
) {
  let tiles = |x: usize| x.div_ceil(DIM);
  let pad = |x: usize| tiles(x) * DIM - x;

  let mut bounds = lw::BOUND_I.put(0, tiles(m) as RegT);
  bounds = lw::BOUND_J.put(bounds, tiles(n) as RegT);
  bounds = lw::BOUND_K.put(bounds, tiles(k) as RegT);
  let mut pads = lw::PAD_I.put(0, pad(m) as RegT);
  pads = lw::PAD_J.put(pads, pad(n) as RegT);
  pads = lw::PAD_K.put(pads, pad(k) as RegT);

  g.execute(funct::LOOP_WS_CONFIG_BOUNDS, pads, bounds).unwrap();
  g.execute(funct::LOOP_WS_CONFIG_ADDRS_AB, a, b).unwrap();
  g.execute(funct::LOOP_WS_CONFIG_ADDRS_DC, d, c).unwrap();
  g.execute(funct::LOOP_WS_CONFIG_STRIDES_AB, a_stride, b_stride).unwrap();
  g.execute(funct::LOOP_WS_CONFIG_STRIDES_DC, d_stride, c_stride).unwrap();
}

/// Bind counter `index` to `event`
pub fn watch_counter(g: &mut Gemmini<FlatDram>, index: u64, event: u64, external: bool) {
  let mut rs1 = counter::CHANGE_CONFIG.put(0, 1);
  rs1 = counter::INDEX.put(rs1, index);
  rs1 = counter::EVENT.put(rs1, event);
  rs1 = counter::EXTERNAL.put(rs1, external as RegT);
  g.execute(funct::COUNTER_OP, rs1, 0).unwrap();
}

pub fn read_counter(g: &mut Gemmini<FlatDram>, index: u64) -> RegT {
  g.execute(funct::COUNTER_OP, counter::INDEX.put(0, index), 0).unwrap()
}

/// Small deterministic values in [-range, range]
pub fn pattern(rows: usize, cols: usize, seed: usize, range: i32) -> Vec<i8> {
  let span = (2 * range + 1) as usize;
  (0..rows * cols)
    .map(|idx| {
      let (i, j) = (idx / cols, idx % cols);
      (((i * 7 + j * 13 + seed * 31 + i * j) % span) as i32 - range) as i8
    })
    .collect()
}

/// Row-major `m x k` times `k x n`
pub fn reference_matmul(a: &[i8], b: &[i8], m: usize, k: usize, n: usize) -> Vec<i32> {
  let mut c = vec![0i32; m * n];
  for i in 0..m {
    for j in 0..n {
      c[i * n + j] = (0..k).map(|kk| a[i * k + kk] as i32 * b[kk * n + j] as i32).sum();
    }
  }
  c
}

pub fn saturate_i8(v: i32) -> i8 {
  v.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}
