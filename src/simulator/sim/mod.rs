pub mod mode;
pub mod shell;
pub mod trace;

pub use mode::StepMode;
pub use trace::TraceEntry;
