mod common;

use common::*;
use gemmini_sim::arch::gemmini::counters::{CounterEvent, ExternalSource};
use gemmini_sim::arch::gemmini::layout::{config as cfg, counter};
use gemmini_sim::arch::gemmini::{funct, Activation, Dataflow, FlatDram, Gemmini, GemminiError, GemminiParams, RegT};
use std::collections::HashSet;

fn is_violation(result: Result<RegT, GemminiError>) -> bool {
  matches!(result, Err(GemminiError::ConfigurationViolation { .. }))
}

#[test]
fn test_config_ex_fields() {
  let mut g = new_gemmini();
  let (mut rs1, mut rs2) = config_ex(Dataflow::WS, Activation::RELU6, 3, true, false);
  rs1 = cfg::EX_ACC_SHIFT.put(rs1, 5);
  rs2 = cfg::EX_RELU6_SHIFT.put(rs2, 2);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();

  let ex = &g.state.config.ex;
  assert_eq!(ex.dataflow, Dataflow::WS);
  assert_eq!(ex.activation, Activation::RELU6);
  assert_eq!(ex.sys_shift, 3);
  assert_eq!(ex.acc_shift, 5);
  assert_eq!(ex.relu6_shift, 2);
  assert!(ex.a_transpose);
  assert!(!ex.b_transpose);
}

#[test]
fn test_config_ex_strides_only() {
  let mut g = new_gemmini();
  set_dataflow(&mut g, Dataflow::WS);

  let mut rs1 = cfg::CMD.put(0, cfg::CMD_EX);
  rs1 = cfg::EX_SET_ONLY_STRIDES.put(rs1, 1);
  rs1 = cfg::EX_A_STRIDE.put(rs1, 3);
  let rs2 = cfg::EX_C_STRIDE.put(0, 2);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();

  let ex = &g.state.config.ex;
  assert_eq!(ex.dataflow, Dataflow::WS);
  assert_eq!((ex.a_stride, ex.c_stride), (3, 2));
}

#[test]
fn test_config_ld_and_st_fields() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ld(1, 96, true, 3);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
  let ld = &g.state.config.ld[1];
  assert_eq!(ld.stride, 96);
  assert!(ld.shrunk);
  assert_eq!(ld.pixels_per_row, 3);
  assert_eq!(ld.scale, 1.0);

  let (rs1, rs2) = config_st(40, Activation::RELU, 0.125);
  g.execute(funct::CONFIG, rs1, rs2).unwrap();
  let st = &g.state.config.st;
  assert_eq!(st.stride, 40);
  assert_eq!(st.activation, Activation::RELU);
  assert_eq!(st.acc_scale, 0.125);
  assert!(!st.pool.is_enabled());
}

#[test]
fn test_reserved_config_sub_command() {
  let mut g = new_gemmini();
  assert!(is_violation(g.execute(funct::CONFIG, cfg::CMD.put(0, 3), 0)));
  assert!(g.is_halted());
}

#[test]
fn test_reserved_activation() {
  let mut g = new_gemmini();
  let (mut rs1, rs2) = config_ex(Dataflow::OS, Activation::NONE, 0, false, false);
  rs1 = cfg::EX_ACTIVATION.put(rs1, 3);
  assert!(is_violation(g.execute(funct::CONFIG, rs1, rs2)));
}

#[test]
fn test_out_of_range_shift_and_load_state() {
  let mut g = new_gemmini();
  let (rs1, rs2) = config_ex(Dataflow::OS, Activation::NONE, 32, false, false);
  assert!(is_violation(g.execute(funct::CONFIG, rs1, rs2)));

  let mut g = new_gemmini();
  let (rs1, rs2) = config_ld(3, 16, false, 1);
  assert!(is_violation(g.execute(funct::CONFIG, rs1, rs2)));
}

#[test]
fn test_unknown_funct_is_not_fatal() {
  let mut g = new_gemmini();
  let err = g.execute(99, 0, 0).unwrap_err();
  assert_eq!(err, GemminiError::UnknownInstruction { funct: 99 });
  assert!(!err.is_fatal());
  assert!(!g.is_halted());
  g.execute(funct::FENCE, 0, 0).unwrap();
}

#[test]
fn test_reset_clears_state() {
  let mut g = new_gemmini();
  g.dram.load_i8(0x1000, &[5; 16]);
  g.execute(funct::MVIN, 0x1000, spad(0, 1, 16)).unwrap();
  set_dataflow(&mut g, Dataflow::WS);
  assert!(is_violation(g.execute(funct::CONFIG, cfg::CMD.put(0, 3), 0)));

  g.reset();
  assert!(!g.is_halted());
  assert_eq!(g.state.banks.spad(0, 0).unwrap(), 0);
  assert_eq!(g.state.config.ex.dataflow, Dataflow::OS);
  // DRAM is not part of the accelerator
  assert_eq!(g.dram.read_i8(0x1000, 1), vec![5]);
}

#[test]
fn test_event_counter() {
  let mut g = new_gemmini();
  watch_counter(&mut g, 2, CounterEvent::Instructions.id() as u64, false);
  for _ in 0..3 {
    g.execute(funct::FLUSH, 0, 0).unwrap();
  }
  // The reading counter_op is itself an instruction
  assert_eq!(read_counter(&mut g, 2), 4);

  let reset = counter::RESET.put(counter::INDEX.put(0, 2), 1);
  assert_eq!(g.execute(funct::COUNTER_OP, reset, 0).unwrap(), 0);
}

#[test]
fn test_counter_snapshot() {
  let mut g = new_gemmini();
  watch_counter(&mut g, 2, CounterEvent::Instructions.id() as u64, false);
  g.execute(funct::FLUSH, 0, 0).unwrap();
  g.execute(funct::FLUSH, 0, 0).unwrap();

  let take = counter::TAKE_SNAPSHOT.put(counter::INDEX.put(0, 2), 1);
  assert_eq!(g.execute(funct::COUNTER_OP, take, 0).unwrap(), 3);
  g.execute(funct::FLUSH, 0, 0).unwrap();
  assert_eq!(read_counter(&mut g, 2), 3);

  let release = counter::SNAPSHOT_RESET.put(counter::INDEX.put(0, 2), 1);
  assert_eq!(g.execute(funct::COUNTER_OP, release, 0).unwrap(), 6);
}

#[test]
fn test_external_counter() {
  let mut g = new_gemmini();
  watch_counter(&mut g, 3, ExternalSource::DramBytesRead as u64, true);
  watch_counter(&mut g, 4, ExternalSource::SpadElemsWritten as u64, true);
  g.execute(funct::MVIN, 0x1000, spad(0, 16, 16)).unwrap();
  assert_eq!(read_counter(&mut g, 3), 256);
  assert_eq!(read_counter(&mut g, 4), 256);
}

#[test]
fn test_unknown_counter_event_rejected() {
  let mut g = new_gemmini();
  let mut rs1 = counter::CHANGE_CONFIG.put(0, 1);
  rs1 = counter::EVENT.put(rs1, 40);
  assert!(is_violation(g.execute(funct::COUNTER_OP, rs1, 0)));
}

#[test]
fn test_primitive_table() {
  let g = new_gemmini();
  let table = g.primitive_instructions();
  let functs: HashSet<u64> = table.iter().map(|p| p.funct).collect();
  assert_eq!(functs.len(), table.len());

  let name_of = |f: u64| table.iter().find(|p| p.funct == f).map(|p| p.name);
  assert_eq!(name_of(funct::MVIN), Some("mvin"));
  assert_eq!(name_of(funct::MVIN3), Some("mvin3"));
  assert_eq!(name_of(funct::LOOP_CONV_WS_CONFIG_6), Some("loop_conv_ws_config_6"));
  assert_eq!(name_of(funct::CISC_COMPUTE), Some("cisc_compute"));
  assert_eq!(name_of(funct::COUNTER_OP), Some("counter_op"));
}

#[test]
fn test_custom_params() {
  let params = GemminiParams::from_toml_str("dim = 4\nsp_bank_rows = 64\nacc_rows = 32\nmax_bytes = 16\n").unwrap();
  assert_eq!(params.sp_rows(), 256);
  assert_eq!(params.max_block_len(), 4);
  assert_eq!(params.max_block_len_acc(), 1);

  let mut g = Gemmini::new(params, FlatDram::new()).unwrap();
  let codec = g.codec();
  let too_tall = codec.encode(&gemmini_sim::arch::gemmini::LocalAddr::scratchpad(0, 5, 4));
  assert!(is_violation(g.execute(funct::MVIN, 0x1000, too_tall)));
}

#[test]
fn test_invalid_params_rejected() {
  assert!(GemminiParams::from_toml_str("dim = 0\n").is_err());
  let params = GemminiParams {
    max_bytes: 8,
    ..Default::default()
  };
  assert!(Gemmini::new(params, FlatDram::new()).is_err());
}
