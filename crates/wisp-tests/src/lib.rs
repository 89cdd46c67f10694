//! Integration harness for the wisp emulator.

pub mod harness;

pub use harness::{TestFs, TreeSpec};
