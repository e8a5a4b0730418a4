use clap::Parser;
use gemmini_sim::simulator::config::{default_config_path, load_config, AppConfig};
use gemmini_sim::simulator::sim::mode::{SimConfig, StepMode};
use gemmini_sim::simulator::utils::log::init_log;
use gemmini_sim::simulator::utils::report::print_run_report;
use gemmini_sim::simulator::Simulator;
use std::path::PathBuf;

/// Replay a Gemmini custom-instruction trace against the functional model
#[derive(Parser, Debug)]
#[command(name = "gemmini-sim")]
#[command(version = "0.1.0")]
#[command(about = "Functional Gemmini accelerator simulator", long_about = None)]
struct Args {
  /// Accelerator and replay configuration (TOML)
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Instruction trace, one JSON object per line
  #[arg(long, value_name = "FILE")]
  trace: Option<PathBuf>,

  /// Raw DRAM image loaded before the run
  #[arg(long, value_name = "FILE")]
  image: Option<PathBuf>,

  /// DRAM address the image is loaded at
  #[arg(long, value_name = "ADDR", value_parser = parse_addr)]
  image_base: Option<u64>,

  /// Write the DRAM window back to this file after the run
  #[arg(long, value_name = "FILE")]
  dump: Option<PathBuf>,

  /// Bytes to dump (default: image length)
  #[arg(long, value_name = "N")]
  dump_len: Option<usize>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (warnings and errors only)
  #[arg(short, long)]
  quiet: bool,

  /// Record executed instructions and results as JSON lines
  #[arg(long, value_name = "FILE")]
  record: Option<PathBuf>,
}

/// Accept decimal or 0x-prefixed hex addresses
fn parse_addr(s: &str) -> Result<u64, String> {
  let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
    Some(hex) => u64::from_str_radix(hex, 16),
    None => s.parse::<u64>(),
  };
  parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn non_empty(s: &str) -> Option<PathBuf> {
  if s.is_empty() {
    None
  } else {
    Some(PathBuf::from(s))
  }
}

fn main() -> std::io::Result<()> {
  let args = Args::parse();

  let app: AppConfig = match &args.config {
    Some(path) => load_config(path)?,
    None => load_config(&default_config_path()).unwrap_or_default(),
  };
  let sim = &app.simulation;

  let quiet = args.quiet || sim.quiet;
  init_log(quiet);

  let trace_file = args.trace.clone().or_else(|| non_empty(&sim.trace_file)).ok_or_else(|| {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, "no trace given (--trace or simulation.trace_file)")
  })?;

  let step_mode = if args.step || sim.step_mode {
    StepMode::Step
  } else {
    StepMode::Continuous
  };

  let config = SimConfig {
    quiet,
    step_mode,
    trace_file,
    image_file: args.image.clone().or_else(|| non_empty(&sim.image_file)),
    image_base: args.image_base.unwrap_or(sim.image_base),
    dump_file: args.dump.clone().or_else(|| non_empty(&sim.dump_file)),
    dump_len: args.dump_len.unwrap_or(sim.dump_len),
    record_file: args.record.clone().or_else(|| non_empty(&sim.record_file)),
  };

  let mut simulator = Simulator::new(config, app.gemmini.clone())?;
  let summary = simulator.run()?;

  if !quiet {
    print_run_report(simulator.gemmini(), &summary);
  }
  Ok(())
}
