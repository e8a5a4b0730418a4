//! Functional model of a Gemmini-style systolic-array accelerator.

pub mod addr;
pub mod banks;
pub mod cisc;
pub mod config;
pub mod counters;
pub mod dram;
pub mod engine;
pub mod error;
#[allow(clippy::module_inception)]
pub mod gemmini;
pub mod layout;
pub mod loop_conv;
pub mod loop_ws;
pub mod mover;
pub mod params;
pub mod quant;
pub mod types;

pub use addr::{AddressCodec, LocalAddr};
pub use banks::MemoryBanks;
pub use config::{ConfigRegister, ExecuteConfig, LoadConfig, PoolConfig, StoreConfig};
pub use counters::{CounterEvent, Counters, ExternalSource};
pub use dram::{Dram, FlatDram};
pub use error::{GemminiError, Result};
pub use gemmini::{funct, primitive_instructions, Gemmini, Primitive};
pub use params::{AddrLayout, GemminiParams};
pub use types::{AccT, Activation, Bank, Dataflow, ElemT, RegT};
