//! Telemetry for budgeted training
//!
//! Memory probes feeding the cost model, and an event collector describing
//! the decisions taken during each fit.

pub mod events;
pub mod memory;

pub use events::{FitEvent, FitStats, FitTelemetry};
pub use memory::{MemoryProbe, MemorySnapshot, ScriptedProbe, SharedProbe, StaticProbe, SysinfoProbe};
