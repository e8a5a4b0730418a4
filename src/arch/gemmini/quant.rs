//! Quantization pipeline: rounding shifts, saturating casts, scaling and
//! activation functions.
//!
//! All narrowing saturates; nothing here wraps.

use super::types::{AccScaleT, AccT, Activation, ElemT, ScaleT};

/// A signed integer type values can be narrowed into
pub trait Narrow: Copy {
  const MIN: i64;
  const MAX: i64;

  fn from_i64_unchecked(value: i64) -> Self;
  fn to_i64(self) -> i64;

  fn saturate(value: i64) -> Self {
    Self::from_i64_unchecked(value.clamp(Self::MIN, Self::MAX))
  }
}

macro_rules! impl_narrow {
  ($($t:ty),*) => {
    $(
      impl Narrow for $t {
        const MIN: i64 = <$t>::MIN as i64;
        const MAX: i64 = <$t>::MAX as i64;

        fn from_i64_unchecked(value: i64) -> Self {
          value as $t
        }

        fn to_i64(self) -> i64 {
          self as i64
        }
      }
    )*
  };
}

impl_narrow!(i8, i16, i32);

/// Arithmetic right shift rounding to nearest. Ties go to the even neighbour,
/// not away from zero: `5 >> 1` gives 2 and `-5 >> 1` gives -2.
pub fn rounding_right_shift(value: i64, shift: u32) -> i64 {
  if shift == 0 {
    return value;
  }
  let shift = shift.min(63);
  let shifted = value >> shift;
  let round_bit = (value >> (shift - 1)) & 1;
  let sticky = (value & ((1i64 << (shift - 1)) - 1)) != 0;
  let round_up = round_bit & ((sticky as i64) | (shifted & 1));
  shifted + round_up
}

pub fn rounding_saturating_shift<T: Narrow>(value: AccT, shift: u32) -> T {
  T::saturate(rounding_right_shift(value as i64, shift))
}

/// ReLU6 saturates at `6 << relu6_shift`
pub fn apply_activation<T: Narrow>(value: T, act: Activation, relu6_shift: u32) -> T {
  let v = value.to_i64();
  let out = match act {
    Activation::NONE => v,
    Activation::RELU => v.max(0),
    Activation::RELU6 => v.clamp(0, 6i64 << relu6_shift.min(32)),
  };
  T::saturate(out)
}

fn scale_saturating<T: Narrow>(value: i64, scale: f64) -> T {
  let y = (value as f64 * scale).round_ties_even();
  if y.is_nan() {
    return T::saturate(0);
  }
  T::saturate(y.clamp(T::MIN as f64, T::MAX as f64) as i64)
}

pub fn mvin_scale(value: ElemT, scale: ScaleT) -> ElemT {
  scale_saturating(value as i64, scale as f64)
}

/// Scale applied to full-width accumulator move-ins
pub fn mvin_scale_acc(value: AccT, scale: ScaleT) -> AccT {
  scale_saturating(value as i64, scale as f64)
}

pub fn acc_scale(value: AccT, scale: AccScaleT) -> AccT {
  scale_saturating(value as i64, scale as f64)
}

/// Accumulator to output: scale, shift, activation
pub fn acc_output(value: AccT, scale: AccScaleT, shift: u32, act: Activation, relu6_shift: u32) -> ElemT {
  let scaled = acc_scale(value, scale);
  let shifted: ElemT = rounding_saturating_shift(scaled, shift);
  apply_activation(shifted, act, relu6_shift)
}

/// Systolic array result to scratchpad: shift, activation
pub fn sys_output(value: AccT, shift: u32, act: Activation, relu6_shift: u32) -> ElemT {
  let shifted: ElemT = rounding_saturating_shift(value, shift);
  apply_activation(shifted, act, relu6_shift)
}
