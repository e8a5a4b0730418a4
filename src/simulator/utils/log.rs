/// Global logging configuration
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

/// Install the `env_logger` backend once; `RUST_LOG` wins over the default level.
/// Quiet mode lowers the default to warnings and silences the host banner.
pub fn init_log(quiet: bool) {
  QUIET.store(quiet, Ordering::Relaxed);
  let default_level = if quiet { "warn" } else { "info" };
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
    .format_timestamp(None)
    .format_target(false)
    .try_init();
}

pub fn is_quiet() -> bool {
  QUIET.load(Ordering::Relaxed)
}

/// Print a host message with blue [Sim] prefix unless quiet
#[macro_export]
macro_rules! sim_info {
  ($($arg:tt)*) => {
    if !$crate::simulator::utils::log::is_quiet() {
      println!("\x1b[34m[Sim]\x1b[0m {}", format!($($arg)*));
    }
  };
}
