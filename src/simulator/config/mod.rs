use crate::arch::gemmini::GemminiParams;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Environment variables with this prefix override file settings,
/// e.g. `GEMMINI_GEMMINI__DIM=8` or `GEMMINI_SIMULATION__QUIET=true`
pub const ENV_PREFIX: &str = "GEMMINI";

/// Replay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default = "default_step_mode")]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
  #[serde(default)]
  pub image_file: String,
  #[serde(default)]
  pub image_base: u64,
  #[serde(default)]
  pub dump_file: String,
  #[serde(default)]
  pub dump_len: usize,
  #[serde(default)]
  pub record_file: String,
}

fn default_step_mode() -> bool {
  false
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      quiet: false,
      step_mode: default_step_mode(),
      trace_file: String::new(),
      image_file: String::new(),
      image_base: 0,
      dump_file: String::new(),
      dump_len: 0,
      record_file: String::new(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub gemmini: GemminiParams,
  #[serde(default)]
  pub simulation: SimulationSection,
}

pub fn default_config_path() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("src")
    .join("simulator")
    .join("config")
    .join("default.toml")
}

fn to_io_error(e: config::ConfigError) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, format!("load configuration failed: {}", e))
}

/// Layer `path` (TOML) under `GEMMINI_*` environment overrides
pub fn load_config(path: &Path) -> io::Result<AppConfig> {
  if !path.exists() {
    return Err(io::Error::new(
      io::ErrorKind::NotFound,
      format!("cannot read config file {:?}", path),
    ));
  }
  let name = path.to_string_lossy();

  let settings = config::Config::builder()
    .add_source(config::File::new(&name, config::FileFormat::Toml))
    .add_source(
      config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .map_err(to_io_error)?;

  let app: AppConfig = settings.try_deserialize().map_err(to_io_error)?;
  app
    .gemmini
    .validate()
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
  Ok(app)
}

/// Parse TOML text directly, without environment overrides
pub fn parse_config(content: &str) -> io::Result<AppConfig> {
  let app: AppConfig = toml::from_str(content)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("parse TOML configuration failed: {}", e)))?;
  app
    .gemmini
    .validate()
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
  Ok(app)
}
