//! Instruction traces: JSON lines in, JSON lines out.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One custom instruction as issued by the host core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
  pub funct: u64,
  pub rs1: u64,
  pub rs2: u64,
}

/// Parse a trace; blank lines and lines starting with `#` are skipped
pub fn parse_trace(content: &str) -> io::Result<Vec<TraceEntry>> {
  let mut entries = Vec::new();
  for (lineno, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let entry: TraceEntry = serde_json::from_str(line).map_err(|e| {
      io::Error::new(
        io::ErrorKind::InvalidData,
        format!("parse trace line {} failed: {}", lineno + 1, e),
      )
    })?;
    entries.push(entry);
  }
  Ok(entries)
}

pub fn read_trace(path: &Path) -> io::Result<Vec<TraceEntry>> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(e.kind(), format!("cannot read trace {:?}: {}", path, e)))?;
  parse_trace(&content)
}

/// Appends one JSON object per executed instruction
pub struct TraceRecorder<W: Write> {
  out: W,
}

impl TraceRecorder<BufWriter<File>> {
  pub fn create(path: &Path) -> io::Result<Self> {
    Ok(Self::new(BufWriter::new(File::create(path)?)))
  }
}

impl<W: Write> TraceRecorder<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }

  pub fn record(&mut self, index: usize, name: &str, entry: &TraceEntry, outcome: Result<u64, String>) -> io::Result<()> {
    let line = match outcome {
      Ok(result) => serde_json::json!({
        "index": index,
        "name": name,
        "funct": entry.funct,
        "rs1": entry.rs1,
        "rs2": entry.rs2,
        "result": result,
      }),
      Err(error) => serde_json::json!({
        "index": index,
        "name": name,
        "funct": entry.funct,
        "rs1": entry.rs1,
        "rs2": entry.rs2,
        "error": error,
      }),
    };
    writeln!(self.out, "{}", line)
  }

  pub fn flush(&mut self) -> io::Result<()> {
    self.out.flush()
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}
