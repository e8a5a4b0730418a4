pub mod arch;
pub mod simulator;

pub use arch::gemmini::{Gemmini, GemminiError, GemminiParams};
pub use simulator::sim::mode::SimConfig;
pub use simulator::utils::log;
