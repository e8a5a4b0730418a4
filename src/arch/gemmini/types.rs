use serde::{Deserialize, Serialize};

// Datatypes of the default Gemmini configuration
pub type ElemT = i8;
pub type AccT = i32;
pub type OutputT = AccT;
pub type ScaleT = f32;
pub type AccScaleT = f32;
pub type RegT = u64;

pub const ELEM_T_MAX: ElemT = ElemT::MAX;
pub const ELEM_T_MIN: ElemT = ElemT::MIN;
pub const MVIN_SCALE_IDENTITY: ScaleT = 1.0;
pub const ACC_SCALE_IDENTITY: AccScaleT = 1.0;

pub const ELEM_BYTES: usize = std::mem::size_of::<ElemT>();
pub const ACC_BYTES: usize = std::mem::size_of::<AccT>();
pub const ACC_BITS: u32 = AccT::BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dataflow {
  OS, // Output Stationary
  WS, // Weight Stationary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
  NONE,
  RELU,
  RELU6,
}

impl Activation {
  pub fn from_bits(bits: u64) -> Option<Self> {
    match bits {
      0 => Some(Activation::NONE),
      1 => Some(Activation::RELU),
      2 => Some(Activation::RELU6),
      _ => None,
    }
  }

  pub fn bits(self) -> u64 {
    match self {
      Activation::NONE => 0,
      Activation::RELU => 1,
      Activation::RELU6 => 2,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bank {
  Scratchpad,
  Accumulator,
}

impl std::fmt::Display for Bank {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Bank::Scratchpad => write!(f, "scratchpad"),
      Bank::Accumulator => write!(f, "accumulator"),
    }
  }
}

pub fn elem_to_acc(value: ElemT) -> AccT {
  AccT::from(value)
}

pub fn acc_to_elem_saturating(value: AccT) -> ElemT {
  value.clamp(AccT::from(ELEM_T_MIN), AccT::from(ELEM_T_MAX)) as ElemT
}

// Scale registers travel through rs1/rs2 as raw IEEE-754 bits
pub fn scale_from_bits(bits: u32) -> ScaleT {
  ScaleT::from_bits(bits)
}

pub fn scale_to_bits(scale: ScaleT) -> u32 {
  scale.to_bits()
}

pub fn acc_scale_from_bits(bits: u32) -> AccScaleT {
  AccScaleT::from_bits(bits)
}

pub fn acc_scale_to_bits(scale: AccScaleT) -> u32 {
  scale.to_bits()
}
