mod common;

use common::*;
use gemmini_sim::arch::gemmini::{funct, Activation, Dataflow, FlatDram, Gemmini, GemminiError};

/// Stage a row-major `rows x cols` matrix in the scratchpad at `row`
fn stage(g: &mut Gemmini<FlatDram>, dram_addr: u64, row: usize, data: &[i8], rows: usize, cols: usize) {
  g.dram.load_i8(dram_addr, data);
  set_load(g, 0, cols as u64);
  g.execute(funct::MVIN, dram_addr, spad(row, rows, cols)).unwrap();
}

fn acc_tile(g: &Gemmini<FlatDram>, row: usize) -> Vec<i32> {
  let mut out = Vec::with_capacity(DIM * DIM);
  for r in 0..DIM {
    for c in 0..DIM {
      out.push(g.state.banks.acc(row + r, c).unwrap());
    }
  }
  out
}

fn spad_tile(g: &Gemmini<FlatDram>, row: usize) -> Vec<i8> {
  let mut out = Vec::with_capacity(DIM * DIM);
  for r in 0..DIM {
    for c in 0..DIM {
      out.push(g.state.banks.spad(row + r, c).unwrap());
    }
  }
  out
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

/// Round-half-even right shift
fn shift_even(v: i32, shift: u32) -> i32 {
  let q = v >> shift;
  let rem = v & ((1 << shift) - 1);
  let half = 1 << (shift - 1);
  if rem > half || (rem == half && q & 1 == 1) {
    q + 1
  } else {
    q
  }
}

#[test]
fn test_ones_output_stationary() {
  let mut g = new_gemmini();
  stage(&mut g, 0x1000, 0, &[1; 256], DIM, DIM);
  stage(&mut g, 0x2000, DIM, &[1; 256], DIM, DIM);

  g.execute(funct::PRELOAD, garbage(DIM, DIM), acc(0, DIM, DIM, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), spad(DIM, DIM, DIM)).unwrap();

  assert!(acc_tile(&g, 0).iter().all(|&v| v == 16));
}

#[test]
fn test_dataflows_agree() {
  let mut g = new_gemmini();
  let a = pattern(DIM, DIM, 0, 3);
  let b = pattern(DIM, DIM, 1, 3);
  let expected = reference_matmul(&a, &b, DIM, DIM, DIM);
  stage(&mut g, 0x1000, 0, &a, DIM, DIM);
  stage(&mut g, 0x2000, DIM, &b, DIM, DIM);

  // Output-stationary
  g.execute(funct::PRELOAD, garbage(DIM, DIM), acc(0, DIM, DIM, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), spad(DIM, DIM, DIM)).unwrap();
  assert_eq!(acc_tile(&g, 0), expected);

  // Weight-stationary
  set_dataflow(&mut g, Dataflow::WS);
  g.execute(funct::PRELOAD, spad(DIM, DIM, DIM), acc(32, DIM, DIM, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), garbage(DIM, DIM)).unwrap();
  assert_eq!(acc_tile(&g, 32), expected);
}

#[test]
fn test_output_stationary_keeps_accumulating() {
  let mut g = new_gemmini();
  let a = pattern(DIM, DIM, 2, 2);
  let b = pattern(DIM, DIM, 3, 2);
  let expected: Vec<i32> = reference_matmul(&a, &b, DIM, DIM, DIM).iter().map(|v| v * 2).collect();
  stage(&mut g, 0x1000, 0, &a, DIM, DIM);
  stage(&mut g, 0x2000, DIM, &b, DIM, DIM);

  g.execute(funct::PRELOAD, garbage(DIM, DIM), acc(0, DIM, DIM, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), spad(DIM, DIM, DIM)).unwrap();
  g.execute(funct::COMPUTE_ACCUMULATED, spad(0, DIM, DIM), spad(DIM, DIM, DIM)).unwrap();
  assert_eq!(acc_tile(&g, 0), expected);
}

#[test]
fn test_weight_stationary_bias_and_accumulate() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);
  let a = pattern(DIM, DIM, 4, 3);
  let b = pattern(DIM, DIM, 5, 3);
  let d = pattern(DIM, DIM, 6, 5);
  let ab = reference_matmul(&a, &b, DIM, DIM, DIM);
  stage(&mut g, 0x1000, 0, &a, DIM, DIM);
  stage(&mut g, 0x2000, DIM, &b, DIM, DIM);
  stage(&mut g, 0x3000, 2 * DIM, &d, DIM, DIM);

  // D is added to A * B
  g.execute(funct::PRELOAD, spad(DIM, DIM, DIM), acc(0, DIM, DIM, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), spad(2 * DIM, DIM, DIM)).unwrap();
  let with_bias: Vec<i32> = ab.iter().zip(&d).map(|(&x, &y)| x + y as i32).collect();
  assert_eq!(acc_tile(&g, 0), with_bias);

  // Accumulating output adds the plain product on top, reusing the weights
  g.execute(funct::PRELOAD, garbage(DIM, DIM), acc(0, DIM, DIM, true)).unwrap();
  g.execute(funct::COMPUTE_ACCUMULATED, spad(0, DIM, DIM), garbage(DIM, DIM)).unwrap();
  let doubled: Vec<i32> = with_bias.iter().zip(&ab).map(|(x, y)| x + y).collect();
  assert_eq!(acc_tile(&g, 0), doubled);
}

#[test]
fn test_weight_stationary_a_transpose() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::WS, Activation::NONE, 0, true, false);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();

  let a = pattern(DIM, DIM, 7, 3);
  let b = pattern(DIM, DIM, 8, 3);
  stage(&mut g, 0x1000, 0, &transpose(&a, DIM, DIM), DIM, DIM);
  stage(&mut g, 0x2000, DIM, &b, DIM, DIM);

  g.execute(funct::PRELOAD, spad(DIM, DIM, DIM), acc(0, DIM, DIM, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), garbage(DIM, DIM)).unwrap();
  assert_eq!(acc_tile(&g, 0), reference_matmul(&a, &b, DIM, DIM, DIM));
}

#[test]
fn test_sys_shift_into_scratchpad() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::OS, Activation::NONE, 2, false, false);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();

  let a = pattern(DIM, DIM, 9, 3);
  let b = pattern(DIM, DIM, 10, 3);
  stage(&mut g, 0x1000, 0, &a, DIM, DIM);
  stage(&mut g, 0x2000, DIM, &b, DIM, DIM);

  g.execute(funct::PRELOAD, garbage(DIM, DIM), spad(64, DIM, DIM)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), spad(DIM, DIM, DIM)).unwrap();

  let expected: Vec<i8> = reference_matmul(&a, &b, DIM, DIM, DIM)
    .into_iter()
    .map(|v| saturate_i8(shift_even(v, 2)))
    .collect();
  assert_eq!(spad_tile(&g, 64), expected);
}

#[test]
fn test_relu_into_scratchpad() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::OS, Activation::RELU, 0, false, false);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();

  let a = pattern(DIM, DIM, 11, 2);
  let b = pattern(DIM, DIM, 12, 2);
  stage(&mut g, 0x1000, 0, &a, DIM, DIM);
  stage(&mut g, 0x2000, DIM, &b, DIM, DIM);

  g.execute(funct::PRELOAD, garbage(DIM, DIM), spad(64, DIM, DIM)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, DIM, DIM), spad(DIM, DIM, DIM)).unwrap();

  let expected: Vec<i8> = reference_matmul(&a, &b, DIM, DIM, DIM)
    .into_iter()
    .map(|v| saturate_i8(v.max(0)))
    .collect();
  assert_eq!(spad_tile(&g, 64), expected);
}

#[test]
fn test_partial_tile_output() {
  let mut g = new_gemmini();
  stage(&mut g, 0x1000, 0, &[2; 256], DIM, DIM);
  stage(&mut g, 0x2000, DIM, &[3; 256], DIM, DIM);

  g.execute(funct::PRELOAD, garbage(DIM, DIM), acc(0, 4, 5, false)).unwrap();
  g.execute(funct::COMPUTE_PRELOADED, spad(0, 4, DIM), spad(DIM, DIM, DIM)).unwrap();

  assert_eq!(g.state.banks.acc(3, 4).unwrap(), 2 * 3 * 16);
  assert_eq!(g.state.banks.acc(3, 5).unwrap(), 0);
  assert_eq!(g.state.banks.acc(4, 0).unwrap(), 0);
}

#[test]
fn test_double_transpose_rejected() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::WS, Activation::NONE, 0, true, true);
  let err = g.execute(funct::CONFIG, rs1, rs2).unwrap_err();
  assert!(matches!(err, GemminiError::ConfigurationViolation { .. }));
}

#[test]
fn test_output_stationary_b_only_transpose_rejected() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::OS, Activation::NONE, 0, false, true);
  assert!(g.execute(funct::CONFIG, rs1, rs2).is_err());

  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::OS, Activation::NONE, 0, true, true);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
}

#[test]
fn test_preload_from_accumulator_rejected() {
  let mut g = new_gemmini();
  let err = g
    .execute(funct::PRELOAD, acc(0, DIM, DIM, false), garbage(DIM, DIM))
    .unwrap_err();
  assert!(matches!(err, GemminiError::ConfigurationViolation { .. }));
  assert!(g.is_halted());
}

#[test]
fn test_oversized_tile_rejected() {
  let mut g = new_gemmini();
  let err = g
    .execute(funct::PRELOAD, garbage(DIM, DIM), acc(0, DIM + 1, DIM, false))
    .unwrap_err();
  assert!(matches!(err, GemminiError::ConfigurationViolation { .. }));
}
