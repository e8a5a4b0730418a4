//! Performance counters read and programmed through `counter_op`.

use super::dram::Dram;
use super::error::{ensure, Result};
use super::gemmini::Gemmini;
use super::layout::counter as op;
use super::types::RegT;

pub const NUM_COUNTERS: usize = 8;
pub const NUM_EXTERNAL_COUNTERS: usize = 6;

/// Internal events a counter can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CounterEvent {
  Disabled = 0,
  Instructions = 1,
  MvinRows = 2,
  MvoutRows = 3,
  Preloads = 4,
  Computes = 5,
  Macs = 6,
  PooledOutputs = 7,
  LoopWs = 8,
  LoopConvWs = 9,
}

impl CounterEvent {
  pub fn id(self) -> u16 {
    self as u16
  }
}

/// Free-running values a counter can mirror instead of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalSource {
  DramBytesRead = 0,
  DramBytesWritten = 1,
  SpadElemsWritten = 2,
  AccElemsWritten = 3,
  PeLoads = 4,
  Faults = 5,
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
  config: [u16; NUM_COUNTERS],
  external_flag: [bool; NUM_COUNTERS],
  values: [u64; NUM_COUNTERS],
  snapshot: [u64; NUM_COUNTERS],
  snapshot_enable: bool,
  external: [u64; NUM_EXTERNAL_COUNTERS],
}

impl Counters {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bump every counter bound to `event`
  pub fn record(&mut self, event: CounterEvent, n: u64) {
    for i in 0..NUM_COUNTERS {
      if !self.external_flag[i] && self.config[i] == event.id() && event != CounterEvent::Disabled {
        self.values[i] = self.values[i].wrapping_add(n);
      }
    }
  }

  pub fn add_external(&mut self, source: ExternalSource, n: u64) {
    let slot = &mut self.external[source as usize];
    *slot = slot.wrapping_add(n);
  }

  pub fn set_external(&mut self, source: ExternalSource, value: u64) {
    self.external[source as usize] = value;
  }

  pub fn external(&self, source: ExternalSource) -> u64 {
    self.external[source as usize]
  }

  /// Live value of counter `index`
  pub fn value(&self, index: usize) -> u64 {
    if self.external_flag[index] {
      self.external[self.config[index] as usize]
    } else {
      self.values[index]
    }
  }

  /// Decode and apply one `counter_op` command
  pub fn operate(&mut self, rs1: RegT) -> Result<RegT> {
    let index = op::INDEX.get(rs1) as usize;
    let event = op::EVENT.get(rs1) as u16;
    let external = op::EXTERNAL.flag(rs1);

    if op::RESET.flag(rs1) {
      self.values = [0; NUM_COUNTERS];
    }
    if op::SNAPSHOT_RESET.flag(rs1) {
      self.snapshot_enable = false;
    }
    if op::TAKE_SNAPSHOT.flag(rs1) {
      self.snapshot_enable = true;
      for i in 0..NUM_COUNTERS {
        self.snapshot[i] = self.value(i);
      }
    }
    if op::CHANGE_CONFIG.flag(rs1) {
      if external {
        ensure!(
          (event as usize) < NUM_EXTERNAL_COUNTERS,
          "external counter source {} does not exist",
          event
        );
      } else {
        ensure!(event <= CounterEvent::LoopConvWs.id(), "counter event {} does not exist", event);
      }
      self.config[index] = event;
      self.values[index] = 0;
      self.external_flag[index] = external;
    }

    let value = if self.snapshot_enable {
      self.snapshot[index]
    } else {
      self.value(index)
    };
    Ok(value)
  }
}

impl<D: Dram> Gemmini<D> {
  pub fn counter_operation(&mut self, rs1: RegT) -> Result<RegT> {
    let value = self.state.counters.operate(rs1)?;
    log::info!(
      "GEMMINI: counter_op - rs1 0x{:x}, counter {} reads {}",
      rs1,
      op::INDEX.get(rs1),
      value
    );
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn configure(index: u64, event: u64, external: bool) -> RegT {
    let mut rs1 = op::CHANGE_CONFIG.put(0, 1);
    rs1 = op::INDEX.put(rs1, index);
    rs1 = op::EVENT.put(rs1, event);
    op::EXTERNAL.put(rs1, external as u64)
  }

  fn read(index: u64) -> RegT {
    op::INDEX.put(0, index)
  }

  #[test]
  fn test_event_counter() {
    let mut counters = Counters::new();
    counters.operate(configure(2, CounterEvent::Computes as u64, false)).unwrap();
    counters.record(CounterEvent::Computes, 1);
    counters.record(CounterEvent::Computes, 1);
    counters.record(CounterEvent::MvinRows, 16);
    assert_eq!(counters.operate(read(2)).unwrap(), 2);
    assert_eq!(counters.operate(read(0)).unwrap(), 0);

    // Disabled counters never count
    counters.record(CounterEvent::Disabled, 5);
    assert_eq!(counters.operate(read(0)).unwrap(), 0);

    counters.operate(op::RESET.put(0, 1)).unwrap();
    assert_eq!(counters.operate(read(2)).unwrap(), 0);
  }

  #[test]
  fn test_external_counter() {
    let mut counters = Counters::new();
    counters.operate(configure(7, ExternalSource::DramBytesRead as u64, true)).unwrap();
    counters.add_external(ExternalSource::DramBytesRead, 64);
    assert_eq!(counters.operate(read(7)).unwrap(), 64);
    assert!(counters.operate(configure(1, 6, true)).is_err());
  }

  #[test]
  fn test_snapshot_freezes_values() {
    let mut counters = Counters::new();
    counters.operate(configure(0, CounterEvent::Instructions as u64, false)).unwrap();
    counters.record(CounterEvent::Instructions, 3);
    let snap = op::TAKE_SNAPSHOT.put(0, 1);
    assert_eq!(counters.operate(snap).unwrap(), 3);
    counters.record(CounterEvent::Instructions, 10);
    assert_eq!(counters.operate(read(0)).unwrap(), 3);
    assert_eq!(counters.operate(op::SNAPSHOT_RESET.put(0, 1)).unwrap(), 13);
  }
}
