//! Simulation engine: configuration, per-run state and the bar loop.

pub mod config;
pub mod exits;
pub mod loop_runner;
pub mod state;

pub use config::{ConfigError, EngineConfig, SimulationConfig};
pub use exits::{resolve_exit, IntrabarPolicy};
pub use loop_runner::{run_simulation, BarEvents, EngineError, Simulation};
pub use state::{EngineState, RunResult, RunStats};
