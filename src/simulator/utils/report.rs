use crate::arch::gemmini::{Dram, ExternalSource, Gemmini};
use crate::simulator::simulator::RunSummary;

const EXTERNAL_SOURCES: [(ExternalSource, &str); 6] = [
  (ExternalSource::DramBytesRead, "dram bytes read"),
  (ExternalSource::DramBytesWritten, "dram bytes written"),
  (ExternalSource::SpadElemsWritten, "scratchpad elements written"),
  (ExternalSource::AccElemsWritten, "accumulator elements written"),
  (ExternalSource::PeLoads, "pe state loads"),
  (ExternalSource::Faults, "faults"),
];

pub fn print_run_report<D: Dram>(gemmini: &Gemmini<D>, summary: &RunSummary) {
  println!("\n--- Simulation Report ---");
  println!("  instructions executed: {}", summary.executed);
  println!("  instructions rejected: {}", summary.errors);
  if let Some(reason) = &gemmini.state.fault {
    println!("  halted: {}", reason);
  }

  let counters = &gemmini.state.counters;
  for (source, name) in EXTERNAL_SOURCES {
    println!("  {}: {}", name, counters.external(source));
  }
  println!("--- End Report ---\n");
}
