mod common;

use common::*;
use gemmini_sim::arch::gemmini::layout::loop_ws as lw;
use gemmini_sim::arch::gemmini::{funct, Activation, Dataflow, FlatDram, Gemmini, GemminiError, RegT};

const A_ADDR: RegT = 0x10_0000;
const B_ADDR: RegT = 0x20_0000;
const D_ADDR: RegT = 0x30_0000;
const C_ADDR: RegT = 0x40_0000;

#[derive(Clone, Copy, Default)]
struct Tiling {
  relu: bool,
  bias: bool,
  low_d: bool,
  full_c: bool,
  a_transpose: bool,
}

fn loop_ws_flags(opts: Tiling) -> (RegT, RegT) {
  let act = if opts.relu { Activation::RELU } else { Activation::NONE };
  let mut rs1 = lw::ACT.put(0, act.bits());
  rs1 = lw::FULL_C.put(rs1, opts.full_c as RegT);
  rs1 = lw::LOW_D.put(rs1, opts.low_d as RegT);
  let rs2 = lw::A_TRANSPOSE.put(0, opts.a_transpose as RegT);
  (rs1, rs2)
}

/// Run C = A * B (+ D) through loop_ws and compare against a host reference
fn run_tiled(m: usize, n: usize, k: usize, opts: Tiling) {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);

  let a = pattern(m, k, 1, 2);
  let b = pattern(k, n, 2, 2);
  let d = pattern(m, n, 3, 20);

  let a_stride = if opts.a_transpose {
    g.dram.load_i8(A_ADDR, &transpose(&a, m, k));
    m
  } else {
    g.dram.load_i8(A_ADDR, &a);
    k
  };
  g.dram.load_i8(B_ADDR, &b);

  let d_addr = if opts.bias {
    if opts.low_d {
      g.dram.load_i8(D_ADDR, &d);
    } else {
      let wide: Vec<i32> = d.iter().map(|&v| v as i32).collect();
      g.dram.load_i32(D_ADDR, &wide);
    }
    D_ADDR
  } else {
    0
  };

  config_loop_ws(
    &mut g,
    (m, n, k),
    (A_ADDR, B_ADDR, d_addr, C_ADDR),
    (a_stride as RegT, n as RegT, n as RegT, n as RegT),
  );
  let (rs1, rs2) = loop_ws_flags(opts);
  g.execute(funct::LOOP_WS, rs1, rs2).unwrap();

  let mut expected = reference_matmul(&a, &b, m, k, n);
  if opts.bias {
    for (e, &v) in expected.iter_mut().zip(&d) {
      *e += v as i32;
    }
  }
  if opts.relu {
    for e in expected.iter_mut() {
      *e = (*e).max(0);
    }
  }

  if opts.full_c {
    assert_eq!(g.dram.read_i32(C_ADDR, m * n), expected);
  } else {
    let narrowed: Vec<i8> = expected.into_iter().map(saturate_i8).collect();
    assert_eq!(g.dram.read_i8(C_ADDR, m * n), narrowed);
  }
}

fn transpose(m: &[i8], rows: usize, cols: usize) -> Vec<i8> {
  let mut t = vec![0i8; m.len()];
  for i in 0..rows {
    for j in 0..cols {
      t[j * rows + i] = m[i * cols + j];
    }
  }
  t
}

macro_rules! test_case {
  ($name:ident, ($m:expr, $n:expr, $k:expr), $opts:expr) => {
    #[test]
    fn $name() {
      run_tiled($m, $n, $k, $opts);
    }
  };
}

test_case!(test_tiled_single_tile, (16, 16, 16), Tiling::default());
test_case!(test_tiled_padded, (30, 20, 25), Tiling::default());
test_case!(test_tiled_tall, (50, 7, 33), Tiling::default());
test_case!(
  test_tiled_wide_bias_full_c,
  (30, 20, 25),
  Tiling {
    bias: true,
    full_c: true,
    ..Default::default()
  }
);
test_case!(
  test_tiled_narrow_bias,
  (18, 40, 17),
  Tiling {
    bias: true,
    low_d: true,
    ..Default::default()
  }
);
test_case!(
  test_tiled_relu,
  (30, 20, 25),
  Tiling {
    relu: true,
    ..Default::default()
  }
);
test_case!(
  test_tiled_a_transpose,
  (20, 16, 18),
  Tiling {
    a_transpose: true,
    ..Default::default()
  }
);

#[test]
fn test_loop_restores_configuration() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);
  let (rs1, rs2) = config_st(64, Activation::RELU6, 0.25);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
  set_load(&mut g, 1, 48);
  let before = g.state.config.clone();

  g.dram.load_i8(A_ADDR, &pattern(32, 32, 0, 1));
  g.dram.load_i8(B_ADDR, &pattern(32, 32, 1, 1));
  config_loop_ws(&mut g, (32, 32, 32), (A_ADDR, B_ADDR, 0, C_ADDR), (32, 32, 32, 32));
  g.execute(funct::LOOP_WS, 0, 0).unwrap();

  assert_eq!(g.state.config, before);
}

#[test]
fn test_loop_ws_counts_invocations() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);
  watch_counter(&mut g, 0, 8, false);

  config_loop_ws(&mut g, (16, 16, 16), (A_ADDR, B_ADDR, 0, C_ADDR), (16, 16, 16, 16));
  g.execute(funct::LOOP_WS, 0, 0).unwrap();
  g.execute(funct::LOOP_WS, 0, 0).unwrap();
  assert_eq!(read_counter(&mut g, 0), 2);
}

#[test]
fn test_loop_ws_wraps_at_top_of_memory() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);
  let (m, n, k) = (32, 16, 16);
  let d_addr = RegT::MAX - 200;
  let c_addr = RegT::MAX - 100;

  let a = pattern(m, k, 1, 2);
  let b = pattern(k, n, 2, 2);
  let d: Vec<i32> = pattern(m, n, 3, 20).iter().map(|&v| v as i32).collect();
  g.dram.load_i8(A_ADDR, &a);
  g.dram.load_i8(B_ADDR, &b);
  g.dram.load_i32(d_addr, &d);

  config_loop_ws(&mut g, (m, n, k), (A_ADDR, B_ADDR, d_addr, c_addr), (k as RegT, n as RegT, n as RegT, n as RegT));
  g.execute(funct::LOOP_WS, 0, 0).unwrap();

  let expected: Vec<i8> = reference_matmul(&a, &b, m, k, n)
    .into_iter()
    .zip(&d)
    .map(|(e, &v)| saturate_i8(e + v))
    .collect();
  // C runs past the last byte and continues from address 0
  assert_eq!(g.dram.read_i8(c_addr, m * n), expected);
  assert_eq!(g.dram.read_i8(0, 4), expected[101..105].to_vec());
}

fn expect_violation(g: &mut Gemmini<FlatDram>) -> String {
  match g.execute(funct::LOOP_WS, 0, 0) {
    Err(GemminiError::ConfigurationViolation { reason }) => reason,
    other => panic!("expected a configuration violation, got {:?}", other),
  }
}

#[test]
fn test_loop_ws_requires_weight_stationary() {
  let mut g = new_gemmini();
  config_loop_ws(&mut g, (16, 16, 16), (A_ADDR, B_ADDR, 0, C_ADDR), (16, 16, 16, 16));
  expect_violation(&mut g);
}

#[test]
fn test_loop_ws_zero_bounds() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);
  expect_violation(&mut g);
}

#[test]
fn test_loop_ws_too_large() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);
  // 6 x 6 output tiles need 576 accumulator rows, half the bank is 512
  config_loop_ws(&mut g, (96, 96, 16), (A_ADDR, B_ADDR, 0, C_ADDR), (16, 96, 96, 96));
  let reason = expect_violation(&mut g);
  assert!(reason.contains("double-buffering"));
}
