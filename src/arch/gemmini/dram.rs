//! Byte-addressable main memory seen by the accelerator.
//!
//! Multi-byte values are assembled little-endian from single-byte accesses.

use super::types::RegT;
use std::collections::HashMap;

/// Load/store interface to DRAM supplied by the host
pub trait Dram {
  fn read_byte(&self, addr: RegT) -> u8;
  fn write_byte(&mut self, addr: RegT, value: u8);
}

impl<T: Dram + ?Sized> Dram for &mut T {
  fn read_byte(&self, addr: RegT) -> u8 {
    (**self).read_byte(addr)
  }

  fn write_byte(&mut self, addr: RegT, value: u8) {
    (**self).write_byte(addr, value)
  }
}

impl<T: Dram + ?Sized> Dram for Box<T> {
  fn read_byte(&self, addr: RegT) -> u8 {
    (**self).read_byte(addr)
  }

  fn write_byte(&mut self, addr: RegT, value: u8) {
    (**self).write_byte(addr, value)
  }
}

/// A fixed-width integer that can travel through DRAM
pub trait DramWord: Copy {
  const BYTES: usize;

  fn from_le(bytes: &[u8]) -> Self;
  fn to_le(self, out: &mut [u8]);
}

macro_rules! impl_dram_word {
  ($($t:ty),*) => {
    $(
      impl DramWord for $t {
        const BYTES: usize = std::mem::size_of::<$t>();

        fn from_le(bytes: &[u8]) -> Self {
          let mut buf = [0u8; std::mem::size_of::<$t>()];
          buf.copy_from_slice(&bytes[..Self::BYTES]);
          <$t>::from_le_bytes(buf)
        }

        fn to_le(self, out: &mut [u8]) {
          out[..Self::BYTES].copy_from_slice(&self.to_le_bytes());
        }
      }
    )*
  };
}

impl_dram_word!(u8, i8, u16, i16, u32, i32, u64, i64);

const MAX_WORD_BYTES: usize = 8;

pub fn read_from_dram<T: DramWord, D: Dram + ?Sized>(dram: &D, addr: RegT) -> T {
  let mut bytes = [0u8; MAX_WORD_BYTES];
  for (i, byte) in bytes[..T::BYTES].iter_mut().enumerate() {
    *byte = dram.read_byte(addr.wrapping_add(i as RegT));
  }
  T::from_le(&bytes[..T::BYTES])
}

pub fn write_to_dram<T: DramWord, D: Dram + ?Sized>(dram: &mut D, addr: RegT, value: T) {
  let mut bytes = [0u8; MAX_WORD_BYTES];
  value.to_le(&mut bytes[..T::BYTES]);
  for (i, &byte) in bytes[..T::BYTES].iter().enumerate() {
    dram.write_byte(addr.wrapping_add(i as RegT), byte);
  }
}

const PAGE_BITS: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_BITS;

/// In-memory DRAM over the full 64-bit address space.
/// Pages are allocated on first write; unwritten bytes read as zero.
#[derive(Debug, Clone, Default)]
pub struct FlatDram {
  pages: HashMap<RegT, Box<[u8; PAGE_SIZE]>>,
}

impl FlatDram {
  pub fn new() -> Self {
    Self::default()
  }

  /// Copy `bytes` into memory starting at `base`
  pub fn load(&mut self, base: RegT, bytes: &[u8]) {
    for (i, &b) in bytes.iter().enumerate() {
      self.write_byte(base.wrapping_add(i as RegT), b);
    }
  }

  pub fn read_bytes(&self, base: RegT, len: usize) -> Vec<u8> {
    (0..len).map(|i| self.read_byte(base.wrapping_add(i as RegT))).collect()
  }

  pub fn load_i8(&mut self, base: RegT, values: &[i8]) {
    for (i, &v) in values.iter().enumerate() {
      self.write_byte(base.wrapping_add(i as RegT), v as u8);
    }
  }

  pub fn read_i8(&self, base: RegT, len: usize) -> Vec<i8> {
    (0..len).map(|i| self.read_byte(base.wrapping_add(i as RegT)) as i8).collect()
  }

  pub fn load_i32(&mut self, base: RegT, values: &[i32]) {
    for (i, &v) in values.iter().enumerate() {
      write_to_dram(self, base.wrapping_add((i * 4) as RegT), v);
    }
  }

  pub fn read_i32(&self, base: RegT, len: usize) -> Vec<i32> {
    (0..len).map(|i| read_from_dram(self, base.wrapping_add((i * 4) as RegT))).collect()
  }

  /// Number of allocated pages
  pub fn resident_pages(&self) -> usize {
    self.pages.len()
  }
}

impl Dram for FlatDram {
  fn read_byte(&self, addr: RegT) -> u8 {
    match self.pages.get(&(addr >> PAGE_BITS)) {
      Some(page) => page[(addr as usize) & (PAGE_SIZE - 1)],
      None => 0,
    }
  }

  fn write_byte(&mut self, addr: RegT, value: u8) {
    let page = self.pages.entry(addr >> PAGE_BITS).or_insert_with(|| Box::new([0; PAGE_SIZE]));
    page[(addr as usize) & (PAGE_SIZE - 1)] = value;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_little_endian_assembly() {
    let mut dram = FlatDram::new();
    dram.load(0x100, &[0x78, 0x56, 0x34, 0x12]);
    assert_eq!(read_from_dram::<u32, _>(&dram, 0x100), 0x1234_5678);
    assert_eq!(read_from_dram::<u16, _>(&dram, 0x102), 0x1234);
    assert_eq!(read_from_dram::<i8, _>(&dram, 0x100), 0x78);

    write_to_dram(&mut dram, 0x200, -2i32);
    assert_eq!(dram.read_bytes(0x200, 4), vec![0xFE, 0xFF, 0xFF, 0xFF]);
  }

  #[test]
  fn test_sparse_pages() {
    let mut dram = FlatDram::new();
    assert_eq!(dram.read_byte(0xDEAD_BEEF_0000), 0);
    assert_eq!(dram.resident_pages(), 0);
    dram.write_byte(0x8000_0000, 7);
    dram.write_byte(0x8000_0001, 8);
    assert_eq!(dram.resident_pages(), 1);
    assert_eq!(dram.read_bytes(0x8000_0000, 3), vec![7, 8, 0]);
  }

  #[test]
  fn test_word_straddles_page() {
    let mut dram = FlatDram::new();
    dram.load_i32(0xFFE, &[-123456]);
    assert_eq!(dram.resident_pages(), 2);
    assert_eq!(dram.read_i32(0xFFE, 1), vec![-123456]);
  }

  #[test]
  fn test_through_mut_reference() {
    let mut dram = FlatDram::new();
    {
      let mut view = &mut dram;
      write_to_dram(&mut view, 0x10, 0x0102u16);
    }
    assert_eq!(dram.read_i8(0x10, 2), vec![2, 1]);
  }
}
