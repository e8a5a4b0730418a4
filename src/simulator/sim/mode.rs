use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

/// Host-side settings for one replay run
#[derive(Debug, Clone)]
pub struct SimConfig {
  pub quiet: bool,
  pub step_mode: StepMode,
  pub trace_file: PathBuf,
  /// Raw DRAM image loaded before the first instruction
  pub image_file: Option<PathBuf>,
  pub image_base: u64,
  /// Where the DRAM window is written after the run
  pub dump_file: Option<PathBuf>,
  /// Bytes to dump from `image_base`; zero dumps the image length
  pub dump_len: usize,
  /// JSON-lines log of executed instructions and their results
  pub record_file: Option<PathBuf>,
}
