//! Scenario files for the simulation kernel.
//!
//! A scenario describes processes, their tasks, the models bound to each task
//! (by registered type name plus parameters), interface bridges, message logs
//! and preset configuration messages. Files are YAML or JSON; times are in
//! seconds and converted to nanoseconds when the context is built.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   stop_time: 60.0
//!   seed: 42
//!
//! processes:
//!   - name: dynamics
//!     priority: 10
//!     tasks:
//!       - name: dyn_task
//!         period: 0.1
//!         models:
//!           - type: Spacecraft
//!             tag: scObject
//!             params:
//!               sigma_bn: [0.1, 0.2, -0.3]
//!   - name: fsw
//!     tasks:
//!       - name: fsw_task
//!         period: 0.5
//!         models:
//!           - type: MrpFeedback
//!             tag: mrpFeedback
//!
//! bridges:
//!   - from: dynamics
//!     to: fsw
//!
//! logs:
//!   - process: dynamics
//!     message: sc_states
//!     period: 1.0
//!
//! messages:
//!   - process: fsw
//!     name: vehicle_config
//!     type: VehicleConfig
//!     inertia_b: [900, 0, 0, 0, 800, 0, 0, 0, 600]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::engine::SimulationContext;
use crate::error::{SimError, SimResult};
use crate::messaging::{
    AttRefMsg, CmdTorqueBodyMsg, InterfaceBridge, ThrArrayCmdForceMsg, TimeAlignment,
    VehicleConfigMsg, MAX_THRUSTERS,
};
use crate::registry::ModelRegistry;
use crate::scheduler::Task;
use crate::types::{derive_seed, sec2nano};

/// Errors that can occur while loading or building a scenario.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),

    #[error("Unknown model type '{type_name}' for model '{tag}'")]
    UnknownModelType { type_name: String, tag: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global scenario parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Stop time [s]
    #[serde(default = "default_stop_time")]
    pub stop_time: f64,

    /// Base seed; every seeded model derives its own stream from it
    #[serde(default)]
    pub seed: u64,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_stop_time() -> f64 {
    10.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            stop_time: default_stop_time(),
            seed: 0,
            log_level: default_log_level(),
        }
    }
}

/// A model bound to a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Registered type name
    #[serde(rename = "type")]
    pub model_type: String,

    /// Unique model tag
    pub tag: String,

    /// Order within the task (higher first)
    #[serde(default)]
    pub priority: i32,

    /// Type-specific parameters; omitted means defaults
    #[serde(default)]
    pub params: serde_yaml::Value,
}

/// A fixed-period task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,

    /// Firing period [s]
    pub period: f64,

    #[serde(default)]
    pub priority: i32,

    /// Delay before the first firing [s]
    #[serde(default)]
    pub first_start: f64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl TaskConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.period.is_finite() && self.period > 0.0) || sec2nano(self.period) == 0 {
            return Err(ConfigError::Validation(format!(
                "Task '{}' needs a positive period",
                self.name
            )));
        }
        if !(self.first_start.is_finite() && self.first_start >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "Task '{}' has a negative first start",
                self.name
            )));
        }
        Ok(())
    }
}

/// A process with its own message bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub name: String,

    /// Execution order among processes (higher first)
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// A directional message bridge between two processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub from: String,
    pub to: String,

    /// Messages to expose; empty exposes all
    #[serde(default)]
    pub messages: Vec<String>,

    /// Added delay [s]
    #[serde(default)]
    pub latency: f64,

    #[serde(default)]
    pub alignment: TimeAlignment,
}

impl BridgeConfig {
    pub fn to_bridge(&self) -> InterfaceBridge {
        InterfaceBridge::new(&self.from, &self.to)
            .with_messages(self.messages.iter().cloned())
            .with_latency(sec2nano(self.latency))
            .with_alignment(self.alignment)
    }
}

/// A message to record during the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub process: String,
    pub message: String,

    /// Minimum spacing between samples [s]; 0 records every write
    #[serde(default)]
    pub period: f64,
}

/// Payload of a preset configuration message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresetPayload {
    VehicleConfig {
        inertia_b: [f64; 9],
        #[serde(default)]
        com_b: [f64; 3],
        #[serde(default)]
        mass: f64,
    },
    AttRef {
        sigma_rn: [f64; 3],
        #[serde(default)]
        omega_rn_n: [f64; 3],
        #[serde(default)]
        domega_rn_n: [f64; 3],
    },
    CmdTorqueBody {
        torque_request_body: [f64; 3],
    },
    ThrForce {
        thr_force: Vec<f64>,
    },
}

/// A message written before initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetMessage {
    pub process: String,
    pub name: String,
    #[serde(flatten)]
    pub payload: PresetPayload,
}

impl PresetMessage {
    /// Writes the message into its process bus.
    pub fn apply(&self, ctx: &mut SimulationContext) -> SimResult<()> {
        let (process, name) = (self.process.as_str(), self.name.as_str());
        match &self.payload {
            PresetPayload::VehicleConfig {
                inertia_b,
                com_b,
                mass,
            } => ctx.set_message(
                process,
                name,
                &VehicleConfigMsg {
                    inertia_b: *inertia_b,
                    com_b: *com_b,
                    mass: *mass,
                },
            ),
            PresetPayload::AttRef {
                sigma_rn,
                omega_rn_n,
                domega_rn_n,
            } => ctx.set_message(
                process,
                name,
                &AttRefMsg {
                    sigma_rn: *sigma_rn,
                    omega_rn_n: *omega_rn_n,
                    domega_rn_n: *domega_rn_n,
                },
            ),
            PresetPayload::CmdTorqueBody {
                torque_request_body,
            } => ctx.set_message(
                process,
                name,
                &CmdTorqueBodyMsg {
                    torque_request_body: *torque_request_body,
                },
            ),
            PresetPayload::ThrForce { thr_force } => {
                let mut msg = ThrArrayCmdForceMsg::default();
                for (slot, force) in msg.thr_force.iter_mut().zip(thr_force) {
                    *slot = *force;
                }
                ctx.set_message(process, name, &msg)
            }
        }
    }
}

/// Complete scenario description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationParams,

    #[serde(default)]
    pub processes: Vec<ProcessConfig>,

    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,

    #[serde(default)]
    pub logs: Vec<LogConfig>,

    #[serde(default)]
    pub messages: Vec<PresetMessage>,
}

impl SimConfig {
    /// Creates a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates names and cross references.
    ///
    /// Model parameters are checked later, when the registry builds them.
    pub fn validate(&self) -> ConfigResult<()> {
        let sim = &self.simulation;
        if !(sim.stop_time.is_finite() && sim.stop_time >= 0.0) {
            return Err(ConfigError::Validation(
                "stop_time must be non-negative".to_string(),
            ));
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&sim.log_level) {
            return Err(ConfigError::Validation(format!(
                "invalid log_level '{}': {e}",
                sim.log_level
            )));
        }

        let mut processes = HashSet::new();
        let mut tasks = HashSet::new();
        let mut tags = HashSet::new();
        for process in &self.processes {
            if !processes.insert(process.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate process: {}",
                    process.name
                )));
            }
            for task in &process.tasks {
                task.validate()?;
                if !tasks.insert(task.name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Duplicate task: {}",
                        task.name
                    )));
                }
                for model in &task.models {
                    if !tags.insert(model.tag.as_str()) {
                        return Err(ConfigError::Validation(format!(
                            "Duplicate model tag: {}",
                            model.tag
                        )));
                    }
                }
            }
        }

        for bridge in &self.bridges {
            for end in [&bridge.from, &bridge.to] {
                if !processes.contains(end.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Bridge references non-existent process: {end}"
                    )));
                }
            }
            if bridge.from == bridge.to {
                return Err(ConfigError::Validation(format!(
                    "Bridge connects process {} to itself",
                    bridge.from
                )));
            }
            if !(bridge.latency.is_finite() && bridge.latency >= 0.0) {
                return Err(ConfigError::Validation(
                    "Bridge latency must be non-negative".to_string(),
                ));
            }
        }

        for log in &self.logs {
            if !processes.contains(log.process.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Log references non-existent process: {}",
                    log.process
                )));
            }
        }

        for preset in &self.messages {
            if !processes.contains(preset.process.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Message '{}' references non-existent process: {}",
                    preset.name, preset.process
                )));
            }
            if let PresetPayload::ThrForce { thr_force } = &preset.payload {
                if thr_force.len() > MAX_THRUSTERS {
                    return Err(ConfigError::Validation(format!(
                        "Message '{}' has more than {MAX_THRUSTERS} thrusters",
                        preset.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Builds an uninitialized context, creating models through `registry`.
    ///
    /// Model `i` (in file order) receives seed `derive_seed(seed, i)`. The
    /// stop time is configured; call `initialize` and `execute` to run.
    pub fn build(&self, registry: &ModelRegistry) -> SimResult<SimulationContext> {
        self.validate()?;
        let mut ctx = SimulationContext::new();
        let mut model_index = 0u64;

        for process in &self.processes {
            ctx.create_process(&process.name, process.priority)?;
            for task_cfg in &process.tasks {
                let task = Task::new(&task_cfg.name, 0, sec2nano(task_cfg.period))
                    .with_priority(task_cfg.priority)
                    .with_first_start(sec2nano(task_cfg.first_start));
                ctx.add_task(&process.name, task)?;
                if !task_cfg.enabled {
                    ctx.disable_task(&task_cfg.name)?;
                }

                for model_cfg in &task_cfg.models {
                    let seed = derive_seed(self.simulation.seed, model_index);
                    model_index += 1;
                    let model = registry
                        .create(&model_cfg.model_type, &model_cfg.params, seed)
                        .ok_or_else(|| ConfigError::UnknownModelType {
                            type_name: model_cfg.model_type.clone(),
                            tag: model_cfg.tag.clone(),
                        })?
                        .map_err(|source| SimError::Config {
                            tag: model_cfg.tag.clone(),
                            source,
                        })?;
                    ctx.add_model_to_task(&task_cfg.name, &model_cfg.tag, model, model_cfg.priority)?;
                }
            }
            if !process.enabled {
                ctx.enable_process(&process.name, false)?;
            }
        }

        for bridge in &self.bridges {
            ctx.add_bridge(bridge.to_bridge())?;
        }
        for log in &self.logs {
            ctx.log_message(&log.process, &log.message, sec2nano(log.period))?;
        }
        for preset in &self.messages {
            preset.apply(&mut ctx)?;
        }

        ctx.configure_stop_time(sec2nano(self.simulation.stop_time));
        ctx.set_seed(self.simulation.seed);
        tracing::debug!(
            processes = self.processes.len(),
            models = model_index,
            seed = self.simulation.seed,
            "scenario built"
        );
        Ok(ctx)
    }

    /// Installs the global subscriber at the scenario's `log_level`.
    ///
    /// Returns false if a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        crate::init_logging(&self.simulation.log_level)
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Total number of models across all tasks.
    pub fn model_count(&self) -> usize {
        self.processes
            .iter()
            .flat_map(|p| &p.tasks)
            .map(|t| t.models.len())
            .sum()
    }

    /// Finds a model configuration by tag.
    pub fn find_model(&self, tag: &str) -> Option<&ModelConfig> {
        self.processes
            .iter()
            .flat_map(|p| &p.tasks)
            .flat_map(|t| &t.models)
            .find(|m| m.tag == tag)
    }

    /// Finds a model configuration by tag for in-place edits (dispersions).
    pub fn find_model_mut(&mut self, tag: &str) -> Option<&mut ModelConfig> {
        self.processes
            .iter_mut()
            .flat_map(|p| &mut p.tasks)
            .flat_map(|t| &mut t.models)
            .find(|m| m.tag == tag)
    }
}

/// Builder for creating a `SimConfig` programmatically.
///
/// Tasks attach to the most recently added process, models to the most
/// recently added task.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stop time [s].
    pub fn stop_time(mut self, seconds: f64) -> Self {
        self.config.simulation.stop_time = seconds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.simulation.seed = seed;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    pub fn add_process(mut self, name: impl Into<String>, priority: i32) -> Self {
        self.config.processes.push(ProcessConfig {
            name: name.into(),
            priority,
            enabled: true,
            tasks: Vec::new(),
        });
        self
    }

    /// Adds a task with period in seconds to the last process.
    pub fn add_task(mut self, name: impl Into<String>, period: f64) -> Self {
        if let Some(process) = self.config.processes.last_mut() {
            process.tasks.push(TaskConfig {
                name: name.into(),
                period,
                priority: 0,
                first_start: 0.0,
                enabled: true,
                models: Vec::new(),
            });
        }
        self
    }

    /// Adds a model to the last task.
    pub fn add_model(
        mut self,
        model_type: impl Into<String>,
        tag: impl Into<String>,
        params: serde_yaml::Value,
    ) -> Self {
        if let Some(task) = self
            .config
            .processes
            .last_mut()
            .and_then(|p| p.tasks.last_mut())
        {
            task.models.push(ModelConfig {
                model_type: model_type.into(),
                tag: tag.into(),
                priority: 0,
                params,
            });
        }
        self
    }

    pub fn add_bridge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.bridges.push(BridgeConfig {
            from: from.into(),
            to: to.into(),
            messages: Vec::new(),
            latency: 0.0,
            alignment: TimeAlignment::default(),
        });
        self
    }

    pub fn add_log(mut self, process: impl Into<String>, message: impl Into<String>, period: f64) -> Self {
        self.config.logs.push(LogConfig {
            process: process.into(),
            message: message.into(),
            period,
        });
        self
    }

    pub fn add_message(
        mut self,
        process: impl Into<String>,
        name: impl Into<String>,
        payload: PresetPayload,
    ) -> Self {
        self.config.messages.push(PresetMessage {
            process: process.into(),
            name: name.into(),
            payload,
        });
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimState;
    use crate::messaging::CmdTorqueBodyMsg;
    use crate::registry::create_default_registry;

    const SCENARIO: &str = r#"
simulation:
  stop_time: 2.0
  seed: 7

processes:
  - name: dynamics
    priority: 10
    tasks:
      - name: dyn_task
        period: 0.1
        models:
          - type: Spacecraft
            tag: scObject
            params:
              sigma_bn: [0.1, 0.2, -0.3]
              omega_bn_b: [0.001, -0.01, 0.03]
              r_bn_n: [7000000.0, 0.0, 0.0]
              v_bn_n: [0.0, 7546.05, 0.0]
              gravity:
                - name: earth
                  mu: 3.986004418e14
                  central: true
              ext_force_torque:
                cmd_torque_msg: cmd_torque
          - type: SimpleNav
            tag: simpleNav
  - name: fsw
    tasks:
      - name: fsw_task
        period: 0.5
        models:
          - type: Inertial3D
            tag: inertial3D
            priority: 3
          - type: AttTrackingError
            tag: attTrackingError
            priority: 2
          - type: MrpFeedback
            tag: mrpFeedback
            priority: 1

bridges:
  - from: dynamics
    to: fsw
    messages: [nav_att]
  - from: fsw
    to: dynamics
    messages: [cmd_torque]

logs:
  - process: fsw
    message: cmd_torque

messages:
  - process: fsw
    name: vehicle_config
    type: VehicleConfig
    inertia_b: [900, 0, 0, 0, 800, 0, 0, 0, 600]
    mass: 750
"#;

    #[test]
    fn test_yaml_parsing() {
        let config = SimConfig::from_yaml(SCENARIO).unwrap();
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.processes.len(), 2);
        assert_eq!(config.model_count(), 5);
        assert_eq!(config.bridges[0].messages, vec!["nav_att"]);
        assert_eq!(config.find_model("mrpFeedback").unwrap().priority, 1);
        assert!(matches!(
            config.messages[0].payload,
            PresetPayload::VehicleConfig { mass, .. } if mass == 750.0
        ));
    }

    #[test]
    fn test_log_level_drives_subscriber() {
        let mut config = SimConfig::from_yaml(SCENARIO).unwrap();
        assert_eq!(config.simulation.log_level, "info");
        config.simulation.log_level = "orrery=debug".to_string();
        assert!(config.validate().is_ok());
        config.init_logging();
        // The global subscriber is installed once.
        assert!(!config.init_logging());

        config.simulation.log_level = "orrery=loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{
            "simulation": {"stop_time": 1.0},
            "processes": [
                {"name": "fsw", "tasks": [
                    {"name": "t", "period": 0.5, "models": [
                        {"type": "MrpFeedback", "tag": "ctrl", "params": {"k": 6.0}}
                    ]}
                ]}
            ]
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.model_count(), 1);
        let params = &config.find_model("ctrl").unwrap().params;
        assert_eq!(params["k"].as_f64(), Some(6.0));
    }

    #[test]
    fn test_build_and_run() {
        let config = SimConfig::from_yaml(SCENARIO).unwrap();
        let mut ctx = config.build(&create_default_registry()).unwrap();
        assert_eq!(ctx.seed(), Some(7));
        ctx.initialize().unwrap();
        ctx.execute().unwrap();
        assert_eq!(ctx.state(), SimState::Stopped);
        assert_eq!(ctx.clock(), 2_000_000_000);

        let torque: CmdTorqueBodyMsg = ctx.read_message("dynamics", "cmd_torque").unwrap();
        assert!(torque.torque_request_body.iter().any(|t| *t != 0.0));
        // Samples at 0, 0.5, 1.0, 1.5, 2.0 s.
        assert_eq!(ctx.pull_logged_data("cmd_torque", None).unwrap().len(), 5);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let yaml = r#"
processes:
  - name: fsw
    tasks:
      - name: t
        period: 1.0
        models:
          - {type: Inertial3D, tag: ref}
          - {type: Inertial3D, tag: ref}
"#;
        assert!(matches!(
            SimConfig::from_yaml(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_cross_references_rejected() {
        let bridge = SimConfigBuilder::new()
            .add_process("a", 0)
            .add_bridge("a", "b")
            .build();
        assert!(matches!(bridge, Err(ConfigError::Validation(_))));

        let period = SimConfigBuilder::new()
            .add_process("a", 0)
            .add_task("t", 0.0)
            .build();
        assert!(matches!(period, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_model_type() {
        let config = SimConfigBuilder::new()
            .add_process("fsw", 0)
            .add_task("t", 1.0)
            .add_model("Warp", "drive", serde_yaml::Value::Null)
            .build()
            .unwrap();
        let err = config.build(&create_default_registry()).unwrap_err();
        assert!(matches!(
            err,
            SimError::Scenario(ConfigError::UnknownModelType { .. })
        ));
    }

    #[test]
    fn test_invalid_params_carry_tag() {
        let params: serde_yaml::Value = serde_yaml::from_str("wc: -1.0").unwrap();
        let config = SimConfigBuilder::new()
            .add_process("fsw", 0)
            .add_task("t", 1.0)
            .add_model("LowPassTorqueFilter", "lpf", params)
            .build()
            .unwrap();
        let err = config.build(&create_default_registry()).unwrap_err();
        assert_eq!(err.model_tag(), Some("lpf"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = SimConfig::from_yaml(SCENARIO).unwrap();
        let again = SimConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            SimConfig::from_file("scenario.toml"),
            Err(ConfigError::UnknownFormat(_))
        ));
    }
}
