pub mod gemmini;
