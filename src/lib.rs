//! # Orrery
//!
//! A deterministic, multi-rate simulation kernel for spacecraft dynamics and
//! flight software.
//!
//! ## Design Principles
//!
//! - **Models and messages**: every component is a [`Model`] that talks to the
//!   rest of the simulation only through named, typed messages on a
//!   per-process [`MessageBus`](messaging::MessageBus).
//! - **Processes and tasks**: processes own a bus and a priority-ordered list
//!   of fixed-period tasks; tasks update their models in priority order.
//!   Interface bridges mirror messages between processes with optional
//!   latency, so dynamics and flight software can run as separate "computers".
//! - **Integer time**: the clock is `u64` nanoseconds ([`SimTime`]), so task
//!   firing is exact for every rate combination.
//! - **Reproducible**: all noise is seeded; identical seeds give identical logs.
//!
//! ## Features
//!
//! - `parallel` - Run Monte Carlo trials in parallel using rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use orrery::dynamics::{Spacecraft, SpacecraftConfig};
//! use orrery::messaging::ScStatesMsg;
//! use orrery::types::sec2nano;
//! use orrery::SimulationContext;
//!
//! let mut sim = SimulationContext::new();
//! sim.create_process("dynamics", 0).unwrap();
//! sim.create_task("dynamics", "dyn_task", sec2nano(0.1), 0).unwrap();
//! let sc = Spacecraft::new(SpacecraftConfig::default()).unwrap();
//! sim.add_model_to_task("dyn_task", "scObject", Box::new(sc), 0).unwrap();
//! sim.log_message("dynamics", "sc_states", sec2nano(1.0)).unwrap();
//!
//! sim.initialize().unwrap();
//! sim.configure_stop_time(sec2nano(10.0));
//! sim.execute().unwrap();
//!
//! let state: ScStatesMsg = sim.read_message("dynamics", "sc_states").unwrap();
//! assert!(state.r_bn_n[1] > 0.0);
//! let rows = sim.pull_logged_data("sc_states.r_bn_n", None).unwrap();
//! assert_eq!(rows.len(), 11);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use orrery::{create_default_registry, SimConfig};
//!
//! let config = SimConfig::from_file("scenario.yaml")?;
//! let mut sim = config.build(&create_default_registry())?;
//! sim.initialize()?;
//! sim.execute()?;
//! ```

pub mod types;
pub mod error;
pub mod messaging;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod engine;
pub mod config;
pub mod math;
pub mod dynamics;
pub mod environment;
pub mod sensors;
pub mod fsw;
pub mod montecarlo;
pub mod stats;

// Re-export commonly used types
pub use types::{sec2nano, nano2sec, ModelHandle, SimTime};
pub use error::{MessagingError, ModelError, ModelResult, SimError, SimResult};
pub use messaging::{InterfaceBridge, Message, MessageBus, MessageHeader, MessageId, TimeAlignment};
pub use model::{InitContext, Model, ModelContext, ModelKind, SimWarning, WarningKind};
pub use engine::{SimState, SimulationContext};
pub use config::{ConfigError, SimConfig, SimConfigBuilder};
pub use registry::{create_default_registry, ModelRegistry};
pub use montecarlo::{MonteCarlo, MonteCarloResults, TrialOutcome, TrialSpec};
pub use stats::{SimulationStats, Timer};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` overrides `level` when set. Returns false if a global
/// subscriber was already installed.
///
/// # Example
///
/// ```rust,ignore
/// orrery::init_logging("info");
/// ```
pub fn init_logging(level: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
