//! Stemdrive Core - telemetry-reactive stem mixing engine
//!
//! Maps live vehicle telemetry (road speed, engine RPM) onto the per-stem
//! gains of a looping multi-stem recording. The audio thread owns the mix
//! transport exclusively; the control-rate scheduler publishes gains through
//! a lock-free bank.

pub mod audio;
pub mod config;
pub mod control;
pub mod engine;
pub mod gain;
pub mod session;
pub mod stems;
pub mod telemetry;
pub mod types;

pub use types::*;
