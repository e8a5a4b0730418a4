use super::sim::mode::{SimConfig, StepMode};
use super::sim::shell::{Command, Shell};
use super::sim::trace::{read_trace, TraceEntry, TraceRecorder};
use crate::arch::gemmini::{FlatDram, Gemmini, GemminiError, GemminiParams};
use crate::sim_info;
use std::fs::{self, File};
use std::io::{self, BufWriter, Result};

/// Outcome of a replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub executed: usize,
  pub errors: usize,
  pub halted: bool,
}

/// Replays an instruction trace against one accelerator and a flat DRAM
pub struct Simulator {
  config: SimConfig,
  gemmini: Gemmini<FlatDram>,
  trace: Vec<TraceEntry>,
  next: usize,
  image_len: usize,
  recorder: Option<TraceRecorder<BufWriter<File>>>,
  summary: RunSummary,
}

fn to_io_error(e: GemminiError) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

impl Simulator {
  pub fn new(config: SimConfig, params: GemminiParams) -> Result<Self> {
    let trace = read_trace(&config.trace_file)?;
    Self::with_trace(config, params, trace)
  }

  /// Build a simulator around an already parsed trace
  pub fn with_trace(config: SimConfig, params: GemminiParams, trace: Vec<TraceEntry>) -> Result<Self> {
    let mut dram = FlatDram::new();
    let mut image_len = 0;
    if let Some(path) = &config.image_file {
      let image = fs::read(path)
        .map_err(|e| io::Error::new(e.kind(), format!("cannot read DRAM image {:?}: {}", path, e)))?;
      dram.load(config.image_base, &image);
      image_len = image.len();
      sim_info!("Loaded {} byte DRAM image at 0x{:x}", image_len, config.image_base);
    }

    let gemmini = Gemmini::new(params, dram).map_err(to_io_error)?;
    let recorder = match &config.record_file {
      Some(path) => Some(TraceRecorder::create(path)?),
      None => None,
    };

    sim_info!("Replaying {} instruction(s)", trace.len());
    Ok(Self {
      config,
      gemmini,
      trace,
      next: 0,
      image_len,
      recorder,
      summary: RunSummary::default(),
    })
  }

  pub fn gemmini(&self) -> &Gemmini<FlatDram> {
    &self.gemmini
  }

  pub fn summary(&self) -> &RunSummary {
    &self.summary
  }

  pub fn is_finished(&self) -> bool {
    self.next >= self.trace.len() || self.gemmini.is_halted()
  }

  pub fn run(&mut self) -> Result<RunSummary> {
    match self.config.step_mode {
      StepMode::Continuous => self.run_continuous()?,
      StepMode::Step => self.run_step_mode()?,
    }
    self.finish()?;
    Ok(self.summary.clone())
  }

  fn run_continuous(&mut self) -> Result<()> {
    while self.step()? {}
    Ok(())
  }

  fn run_step_mode(&mut self) -> Result<()> {
    println!("Step mode - Enter steps one instruction, 'si N' steps N, 'c' continues, 'q' quits\n");
    let mut shell = Shell::new()?;

    while !self.is_finished() {
      match shell.read_command()? {
        Command::Step(n) => {
          for _ in 0..n {
            if !self.step()? {
              break;
            }
          }
        },
        Command::Continue => return self.run_continuous(),
        Command::Quit => break,
      }
    }
    Ok(())
  }

  /// Execute the next trace entry; false once the trace is exhausted or the accelerator halted
  pub fn step(&mut self) -> Result<bool> {
    if self.is_finished() {
      return Ok(false);
    }

    let index = self.next;
    let entry = self.trace[index];
    self.next += 1;

    let name = self
      .gemmini
      .primitive_instructions()
      .iter()
      .find(|p| p.funct == entry.funct)
      .map(|p| p.name)
      .unwrap_or("unknown");

    let outcome = self.gemmini.execute(entry.funct, entry.rs1, entry.rs2);
    self.summary.executed += 1;
    if let Err(e) = &outcome {
      self.summary.errors += 1;
      log::warn!("instruction {} ({}) failed: {}", index, name, e);
    }
    self.summary.halted = self.gemmini.is_halted();

    if let Some(recorder) = &mut self.recorder {
      recorder.record(index, name, &entry, outcome.map_err(|e| e.to_string()))?;
    }
    Ok(!self.is_finished())
  }

  fn finish(&mut self) -> Result<()> {
    if let Some(recorder) = &mut self.recorder {
      recorder.flush()?;
    }
    if let Some(path) = &self.config.dump_file {
      let len = if self.config.dump_len > 0 {
        self.config.dump_len
      } else {
        self.image_len
      };
      let bytes = self.gemmini.dram.read_bytes(self.config.image_base, len);
      fs::write(path, &bytes)?;
      sim_info!("Dumped {} byte(s) from 0x{:x} to {:?}", len, self.config.image_base, path);
    }
    if self.summary.halted {
      sim_info!("Accelerator halted after {} instruction(s)", self.summary.executed);
    }
    Ok(())
  }
}
