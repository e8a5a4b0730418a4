//! Bit-field layouts of the rs1/rs2 operands, per instruction.
//!
//! Every field an instruction decodes is listed here as `{name, offset, width}`
//! so the encoding contract can be checked independently of the code that
//! consumes it.

use super::types::RegT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
  pub name: &'static str,
  pub offset: u32,
  pub width: u32,
}

impl Field {
  pub const fn new(name: &'static str, offset: u32, width: u32) -> Self {
    Self { name, offset, width }
  }

  pub const fn mask(&self) -> RegT {
    if self.width >= 64 {
      !0
    } else {
      (1 << self.width) - 1
    }
  }

  pub const fn get(&self, reg: RegT) -> RegT {
    (reg >> self.offset) & self.mask()
  }

  pub const fn flag(&self, reg: RegT) -> bool {
    self.get(reg) != 0
  }

  /// Insert `value` into `reg`; bits of `value` beyond the field width are dropped
  pub const fn put(&self, reg: RegT, value: RegT) -> RegT {
    (reg & !(self.mask() << self.offset)) | ((value & self.mask()) << self.offset)
  }
}

/// Operand layout of one instruction
#[derive(Debug, Clone, Copy)]
pub struct InstLayout {
  pub name: &'static str,
  pub rs1: &'static [Field],
  pub rs2: &'static [Field],
}

// ---------------------------------------------------------------------------
// Local (scratchpad / accumulator) addresses
// ---------------------------------------------------------------------------

pub mod local_addr {
  use super::Field;

  /// A local address whose low word is all ones names no operand
  pub const GARBAGE_WORD: u32 = u32::MAX;

  pub const ROW: Field = Field::new("row", 0, 29);
  pub const READ_FULL: Field = Field::new("read_full", 29, 1);
  pub const ACCUMULATE: Field = Field::new("accumulate", 30, 1);
  pub const IS_ACC: Field = Field::new("is_acc", 31, 1);
  pub const COLS: Field = Field::new("cols", 32, 16);
  pub const ROWS: Field = Field::new("rows", 48, 16);

  pub const ROW_COL: &[Field] = &[ROW, READ_FULL, ACCUMULATE, IS_ACC, COLS, ROWS];

  pub const BLOCKED_ROW: Field = Field::new("row", 0, 30);
  pub const BLOCKS: Field = Field::new("blocks", 32, 32);

  pub const BLOCKED: &[Field] = &[BLOCKED_ROW, ACCUMULATE, IS_ACC, BLOCKS];
}

// ---------------------------------------------------------------------------
// config (funct 0), sub-command in rs1[1:0]
// ---------------------------------------------------------------------------

pub mod config {
  use super::{Field, InstLayout};

  pub const CMD: Field = Field::new("cmd", 0, 2);

  pub const CMD_EX: u64 = 0;
  pub const CMD_LD: u64 = 1;
  pub const CMD_ST: u64 = 2;

  // config_ex
  pub const EX_DATAFLOW: Field = Field::new("dataflow", 2, 1);
  pub const EX_ACTIVATION: Field = Field::new("activation", 3, 2);
  pub const EX_SET_ONLY_STRIDES: Field = Field::new("set_only_strides", 7, 1);
  pub const EX_A_TRANSPOSE: Field = Field::new("a_transpose", 8, 1);
  pub const EX_B_TRANSPOSE: Field = Field::new("b_transpose", 9, 1);
  pub const EX_A_STRIDE: Field = Field::new("a_stride", 16, 16);
  pub const EX_ACC_SHIFT: Field = Field::new("acc_shift", 32, 32);
  pub const EX_SYS_SHIFT: Field = Field::new("sys_shift", 0, 32);
  pub const EX_RELU6_SHIFT: Field = Field::new("relu6_shift", 32, 16);
  pub const EX_C_STRIDE: Field = Field::new("c_stride", 48, 16);

  pub const EX: InstLayout = InstLayout {
    name: "config_ex",
    rs1: &[CMD, EX_DATAFLOW, EX_ACTIVATION, EX_SET_ONLY_STRIDES, EX_A_TRANSPOSE, EX_B_TRANSPOSE, EX_A_STRIDE, EX_ACC_SHIFT],
    rs2: &[EX_SYS_SHIFT, EX_RELU6_SHIFT, EX_C_STRIDE],
  };

  // config_ld
  pub const LD_SHRUNK: Field = Field::new("shrunk", 2, 1);
  pub const LD_STATE_ID: Field = Field::new("state_id", 3, 2);
  pub const LD_PIXELS_PER_ROW: Field = Field::new("pixels_per_row", 8, 8);
  pub const LD_BLOCK_STRIDE: Field = Field::new("block_stride", 16, 16);
  pub const LD_SCALE: Field = Field::new("scale", 32, 32);
  pub const LD_STRIDE: Field = Field::new("stride", 0, 64);

  pub const LD: InstLayout = InstLayout {
    name: "config_ld",
    rs1: &[CMD, LD_SHRUNK, LD_STATE_ID, LD_PIXELS_PER_ROW, LD_BLOCK_STRIDE, LD_SCALE],
    rs2: &[LD_STRIDE],
  };

  // config_st
  pub const ST_ACTIVATION: Field = Field::new("activation", 2, 2);
  pub const ST_POOL_STRIDE: Field = Field::new("pool_stride", 4, 2);
  pub const ST_POOL_SIZE: Field = Field::new("pool_size", 6, 2);
  pub const ST_POOL_UPAD: Field = Field::new("pool_upad", 8, 2);
  pub const ST_POOL_LPAD: Field = Field::new("pool_lpad", 10, 2);
  pub const ST_POOL_OUT_DIM: Field = Field::new("pool_out_dim", 24, 8);
  pub const ST_POOL_POROWS: Field = Field::new("pool_porows", 32, 8);
  pub const ST_POOL_POCOLS: Field = Field::new("pool_pocols", 40, 8);
  pub const ST_POOL_OROWS: Field = Field::new("pool_orows", 48, 8);
  pub const ST_POOL_OCOLS: Field = Field::new("pool_ocols", 56, 8);
  pub const ST_STRIDE: Field = Field::new("store_stride", 0, 32);
  pub const ST_ACC_SCALE: Field = Field::new("acc_scale", 32, 32);

  pub const ST: InstLayout = InstLayout {
    name: "config_st",
    rs1: &[
      CMD,
      ST_ACTIVATION,
      ST_POOL_STRIDE,
      ST_POOL_SIZE,
      ST_POOL_UPAD,
      ST_POOL_LPAD,
      ST_POOL_OUT_DIM,
      ST_POOL_POROWS,
      ST_POOL_POCOLS,
      ST_POOL_OROWS,
      ST_POOL_OCOLS,
    ],
    rs2: &[ST_STRIDE, ST_ACC_SCALE],
  };
}

// ---------------------------------------------------------------------------
// loop_ws (funct 8..13)
// ---------------------------------------------------------------------------

pub mod loop_ws {
  use super::{Field, InstLayout};

  pub const BOUND_I: Field = Field::new("I", 0, 16);
  pub const BOUND_J: Field = Field::new("J", 16, 16);
  pub const BOUND_K: Field = Field::new("K", 32, 16);
  pub const PAD_I: Field = Field::new("pad_I", 0, 16);
  pub const PAD_J: Field = Field::new("pad_J", 16, 16);
  pub const PAD_K: Field = Field::new("pad_K", 32, 16);

  pub const CONFIG_BOUNDS: InstLayout = InstLayout {
    name: "loop_ws_config_bounds",
    rs1: &[PAD_I, PAD_J, PAD_K],
    rs2: &[BOUND_I, BOUND_J, BOUND_K],
  };

  pub const EX_ACCUMULATE: Field = Field::new("ex_accumulate", 0, 1);
  pub const FULL_C: Field = Field::new("full_c", 1, 1);
  pub const LOW_D: Field = Field::new("low_d", 2, 1);
  pub const ACT: Field = Field::new("act", 8, 3);
  pub const B_SPAD_ID: Field = Field::new("b_spad_id", 16, 2);
  pub const A_SPAD_ID: Field = Field::new("a_spad_id", 18, 2);
  pub const A_TRANSPOSE: Field = Field::new("a_transpose", 0, 1);
  pub const B_TRANSPOSE: Field = Field::new("b_transpose", 1, 1);

  pub const LOOP: InstLayout = InstLayout {
    name: "loop_ws",
    rs1: &[EX_ACCUMULATE, FULL_C, LOW_D, ACT, B_SPAD_ID, A_SPAD_ID],
    rs2: &[A_TRANSPOSE, B_TRANSPOSE],
  };
}

// ---------------------------------------------------------------------------
// loop_conv_ws (funct 15..21)
// ---------------------------------------------------------------------------

pub mod loop_conv {
  use super::{Field, InstLayout};

  // config 1
  pub const BATCH_SIZE: Field = Field::new("batch_size", 0, 16);
  pub const IN_ROW_DIM: Field = Field::new("in_row_dim", 16, 16);
  pub const IN_CHANNELS: Field = Field::new("in_channels", 32, 16);
  pub const OUT_CHANNELS: Field = Field::new("out_channels", 48, 16);
  pub const OUT_ROW_DIM: Field = Field::new("out_row_dim", 0, 16);
  pub const POOL_OUT_ROW_DIM: Field = Field::new("pool_out_row_dim", 16, 16);
  pub const OUT_COL_DIM: Field = Field::new("out_col_dim", 32, 16);
  pub const STRIDE: Field = Field::new("stride", 48, 8);
  pub const PADDING: Field = Field::new("padding", 56, 8);

  pub const CONFIG_1: InstLayout = InstLayout {
    name: "loop_conv_ws_config_1",
    rs1: &[BATCH_SIZE, IN_ROW_DIM, IN_CHANNELS, OUT_CHANNELS],
    rs2: &[OUT_ROW_DIM, POOL_OUT_ROW_DIM, OUT_COL_DIM, STRIDE, PADDING],
  };

  // config 2
  pub const POOL_PADDING: Field = Field::new("pool_padding", 0, 8);
  pub const POOL_STRIDE: Field = Field::new("pool_stride", 8, 8);
  pub const POOL_SIZE: Field = Field::new("pool_size", 16, 16);
  pub const POOL_OUT_COL_DIM: Field = Field::new("pool_out_col_dim", 32, 16);
  pub const KERNEL_DIM: Field = Field::new("kernel_dim", 48, 16);
  pub const POCHS: Field = Field::new("pochs", 0, 16);
  pub const POCOLS: Field = Field::new("pocols", 16, 16);
  pub const POROWS: Field = Field::new("porows", 32, 16);
  pub const BATCHES: Field = Field::new("batches", 48, 16);

  pub const CONFIG_2: InstLayout = InstLayout {
    name: "loop_conv_ws_config_2",
    rs1: &[POOL_PADDING, POOL_STRIDE, POOL_SIZE, POOL_OUT_COL_DIM, KERNEL_DIM],
    rs2: &[POCHS, POCOLS, POROWS, BATCHES],
  };

  // config 3
  pub const LPAD: Field = Field::new("lpad", 0, 16);
  pub const KCHS: Field = Field::new("kchs", 16, 16);
  pub const KCOLS: Field = Field::new("kcols", 32, 16);
  pub const KROWS: Field = Field::new("krows", 48, 16);
  pub const IN_COL_DIM: Field = Field::new("in_col_dim", 0, 16);
  pub const PLPAD: Field = Field::new("plpad", 16, 8);
  pub const DPAD: Field = Field::new("dpad", 24, 8);
  pub const UPAD: Field = Field::new("upad", 32, 16);
  pub const RPAD: Field = Field::new("rpad", 48, 16);

  pub const CONFIG_3: InstLayout = InstLayout {
    name: "loop_conv_ws_config_3",
    rs1: &[LPAD, KCHS, KCOLS, KROWS],
    rs2: &[IN_COL_DIM, PLPAD, DPAD, UPAD, RPAD],
  };

  // config 4
  pub const KERNEL_DILATION: Field = Field::new("kernel_dilation", 0, 8);
  pub const PDPAD: Field = Field::new("pdpad", 10, 8);
  pub const PUPAD: Field = Field::new("pupad", 21, 8);
  pub const PRAD: Field = Field::new("prad", 32, 16);
  pub const OROWS: Field = Field::new("orows", 48, 16);
  pub const OCOLS: Field = Field::new("ocols", 0, 16);
  pub const OUT_STRIDE: Field = Field::new("out_stride", 16, 16);
  pub const WEIGHT_STRIDE: Field = Field::new("weight_stride", 32, 16);
  pub const IN_STRIDE: Field = Field::new("in_stride", 48, 16);

  pub const CONFIG_4: InstLayout = InstLayout {
    name: "loop_conv_ws_config_4",
    rs1: &[KERNEL_DILATION, PDPAD, PUPAD, PRAD, OROWS],
    rs2: &[OCOLS, OUT_STRIDE, WEIGHT_STRIDE, IN_STRIDE],
  };

  // config 5 and 6 carry raw DRAM addresses
  pub const ADDR: Field = Field::new("addr", 0, 64);

  pub const CONFIG_5: InstLayout = InstLayout { name: "loop_conv_ws_config_5", rs1: &[ADDR], rs2: &[ADDR] };
  pub const CONFIG_6: InstLayout = InstLayout { name: "loop_conv_ws_config_6", rs1: &[ADDR], rs2: &[ADDR] };

  // loop_conv_ws flags
  pub const NO_BIAS: Field = Field::new("no_bias", 0, 1);
  pub const WROT180: Field = Field::new("wrot180", 1, 1);
  pub const TRANS_OUTPUT_1203: Field = Field::new("trans_output_1203", 2, 1);
  pub const TRANS_WEIGHT_1203: Field = Field::new("trans_weight_1203", 3, 1);
  pub const TRANS_WEIGHT_0132: Field = Field::new("trans_weight_0132", 4, 1);
  pub const TRANS_INPUT_3120: Field = Field::new("trans_input_3120", 5, 1);
  pub const DW: Field = Field::new("dw", 6, 1);
  pub const MAX_PIXELS_PER_ROW: Field = Field::new("max_pixels_per_row", 8, 8);
  pub const B_SPAD_ID: Field = Field::new("b_spad_id", 16, 2);
  pub const A_SPAD_ID: Field = Field::new("a_spad_id", 18, 2);
  pub const NO_POOL: Field = Field::new("no_pool", 0, 1);
  pub const DOWNSAMPLE: Field = Field::new("downsample", 1, 1);
  pub const INPUT_DILATED: Field = Field::new("input_dilated", 2, 1);
  pub const ACTIVATION: Field = Field::new("activation", 3, 2);

  pub const LOOP: InstLayout = InstLayout {
    name: "loop_conv_ws",
    rs1: &[
      NO_BIAS,
      WROT180,
      TRANS_OUTPUT_1203,
      TRANS_WEIGHT_1203,
      TRANS_WEIGHT_0132,
      TRANS_INPUT_3120,
      DW,
      MAX_PIXELS_PER_ROW,
      B_SPAD_ID,
      A_SPAD_ID,
    ],
    rs2: &[NO_POOL, DOWNSAMPLE, INPUT_DILATED, ACTIVATION],
  };
}

// ---------------------------------------------------------------------------
// CISC wrapper (funct 22..25)
// ---------------------------------------------------------------------------

pub mod cisc {
  use super::{Field, InstLayout};

  pub const ADDR: Field = Field::new("addr", 0, 64);
  pub const M: Field = Field::new("M", 0, 16);
  pub const N: Field = Field::new("N", 16, 16);
  pub const K: Field = Field::new("K", 32, 16);
  pub const REPEATING_BIAS: Field = Field::new("repeating_bias", 0, 1);

  pub const CONFIG_AB: InstLayout = InstLayout { name: "cisc_config_ab", rs1: &[ADDR], rs2: &[ADDR] };
  pub const CONFIG_CD: InstLayout = InstLayout { name: "cisc_config_cd", rs1: &[ADDR], rs2: &[ADDR] };
  pub const CONFIG_SIZE: InstLayout = InstLayout {
    name: "cisc_config_size",
    rs1: &[M, N, K],
    rs2: &[REPEATING_BIAS],
  };
}

// ---------------------------------------------------------------------------
// counter_op (funct 126)
// ---------------------------------------------------------------------------

pub mod counter {
  use super::{Field, InstLayout};

  pub const RESET: Field = Field::new("reset", 0, 1);
  pub const SNAPSHOT_RESET: Field = Field::new("snapshot_reset", 1, 1);
  pub const TAKE_SNAPSHOT: Field = Field::new("take_snapshot", 2, 1);
  pub const CHANGE_CONFIG: Field = Field::new("change_config", 3, 1);
  pub const INDEX: Field = Field::new("index", 4, 3);
  pub const EVENT: Field = Field::new("event", 12, 6);
  pub const EXTERNAL: Field = Field::new("external", 32, 1);

  pub const OP: InstLayout = InstLayout {
    name: "counter_op",
    rs1: &[RESET, SNAPSHOT_RESET, TAKE_SNAPSHOT, CHANGE_CONFIG, INDEX, EVENT, EXTERNAL],
    rs2: &[],
  };
}

/// All documented operand layouts
pub const ALL: &[InstLayout] = &[
  config::EX,
  config::LD,
  config::ST,
  loop_ws::CONFIG_BOUNDS,
  loop_ws::LOOP,
  loop_conv::CONFIG_1,
  loop_conv::CONFIG_2,
  loop_conv::CONFIG_3,
  loop_conv::CONFIG_4,
  loop_conv::CONFIG_5,
  loop_conv::CONFIG_6,
  loop_conv::LOOP,
  cisc::CONFIG_AB,
  cisc::CONFIG_CD,
  cisc::CONFIG_SIZE,
  counter::OP,
];
