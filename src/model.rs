//! The `Model` trait and the contexts handed to it.
//!
//! Models are the units of behavior scheduled by tasks: dynamics, environment,
//! sensors, flight software. A model owns its private configuration and state
//! and talks to other models only through the message bus of its process.
//!
//! # Lifecycle
//!
//! 1. `self_init` creates the model's output messages.
//! 2. `cross_init` subscribes to input messages, after every process has
//!    created its outputs and bridges have been resolved.
//! 3. `reset` is called once before the first `update`, and again only when
//!    requested explicitly.
//! 4. `update` runs every time the owning task fires.

use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::messaging::{Message, MessageBus, MessageHeader, MessageId, DEFAULT_BUFFER_COUNT};
use crate::types::{nano2sec, SimTime};

/// The kind of a model, used for reporting and statistics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Dynamics,
    Environment,
    Sensor,
    Estimator,
    Guidance,
    Control,
    Actuator,
    Custom(String),
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Custom(name) => write!(f, "{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Category of a numerical warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A sensor output hit its saturation limit
    Saturation,
    /// Measurement geometry too weak for a solution
    DegenerateGeometry,
    /// A matrix that must be inverted was singular
    SingularMatrix,
    /// Filter covariance grew beyond its bound
    Divergence,
}

/// A non-fatal numerical condition raised by a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimWarning {
    pub tag: String,
    pub time: SimTime,
    pub kind: WarningKind,
    pub detail: String,
}

/// Context for `self_init` and `cross_init`.
pub struct InitContext<'a> {
    bus: &'a mut MessageBus,
    tag: &'a str,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(bus: &'a mut MessageBus, tag: &'a str) -> Self {
        Self { bus, tag }
    }

    /// Tag of the model being initialized.
    pub fn tag(&self) -> &str {
        self.tag
    }

    /// Creates an output message with the default ring depth.
    pub fn create<T: Message>(&mut self, name: &str) -> ModelResult<MessageId> {
        self.create_buffered::<T>(name, DEFAULT_BUFFER_COUNT)
    }

    /// Creates an output message with `buffer_count` slots.
    pub fn create_buffered<T: Message>(
        &mut self,
        name: &str,
        buffer_count: usize,
    ) -> ModelResult<MessageId> {
        let id = self.bus.create::<T>(name, buffer_count)?;
        self.bus.set_producer(id, self.tag)?;
        Ok(id)
    }

    /// Resolves a required input message.
    pub fn subscribe<T: Message>(&self, name: &str) -> ModelResult<MessageId> {
        Ok(self.bus.subscribe::<T>(name)?)
    }

    /// Resolves an input message that may legitimately be absent.
    ///
    /// An empty name means "not connected".
    pub fn subscribe_optional<T: Message>(&self, name: &str) -> ModelResult<Option<MessageId>> {
        if name.is_empty() {
            return Ok(None);
        }
        self.subscribe::<T>(name).map(Some)
    }

    /// Read-only view of the process bus.
    pub fn bus(&self) -> &MessageBus {
        self.bus
    }
}

/// Context for `reset` and `update`.
pub struct ModelContext<'a> {
    bus: &'a mut MessageBus,
    tag: &'a str,
    time: SimTime,
    warnings: &'a mut Vec<SimWarning>,
}

impl<'a> ModelContext<'a> {
    pub(crate) fn new(
        bus: &'a mut MessageBus,
        tag: &'a str,
        time: SimTime,
        warnings: &'a mut Vec<SimWarning>,
    ) -> Self {
        Self {
            bus,
            tag,
            time,
            warnings,
        }
    }

    /// Tag of the running model.
    pub fn tag(&self) -> &str {
        self.tag
    }

    /// Current simulation time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Current simulation time in seconds.
    pub fn time_sec(&self) -> f64 {
        nano2sec(self.time)
    }

    /// Reads the latest payload visible now.
    pub fn read<T: Message>(&self, id: MessageId) -> ModelResult<T> {
        Ok(self.bus.read::<T>(id, self.time)?.0)
    }

    /// Reads the latest payload visible now, with its header.
    pub fn read_with_header<T: Message>(&self, id: MessageId) -> ModelResult<(T, MessageHeader)> {
        Ok(self.bus.read::<T>(id, self.time)?)
    }

    /// Writes a payload stamped with the current time.
    pub fn write<T: Message>(&mut self, id: MessageId, payload: &T) -> ModelResult<()> {
        Ok(self.bus.write(id, payload, self.time)?)
    }

    /// Records a numerical warning and logs it.
    pub fn warn(&mut self, kind: WarningKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(module = self.tag, time_ns = self.time, ?kind, "{detail}");
        self.warnings.push(SimWarning {
            tag: self.tag.to_string(),
            time: self.time,
            kind,
            detail,
        });
    }

    /// Read-only view of the process bus.
    pub fn bus(&self) -> &MessageBus {
        self.bus
    }
}

/// The core trait implemented by every simulation model.
///
/// Only `kind` and `update` are required.
pub trait Model: Send {
    /// The kind of model.
    fn kind(&self) -> ModelKind;

    /// Creates output messages.
    fn self_init(&mut self, _ctx: &mut InitContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Subscribes to input messages.
    fn cross_init(&mut self, _ctx: &mut InitContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Restores the initial state.
    ///
    /// # Arguments
    /// * `ctx` - Bus access for reading static configuration messages
    /// * `time` - The time the model is reset at
    fn reset(&mut self, _ctx: &mut ModelContext<'_>, _time: SimTime) -> ModelResult<()> {
        Ok(())
    }

    /// Advances the model to `time`.
    fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()>;
}

/// Drives one model against a private bus, outside any scheduler.
///
/// Used to unit test a model by publishing its inputs by hand.
pub struct ModelHarness {
    pub bus: MessageBus,
    pub warnings: Vec<SimWarning>,
    tag: String,
}

impl ModelHarness {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            bus: MessageBus::new(),
            warnings: Vec::new(),
            tag: tag.into(),
        }
    }

    /// Runs `self_init` then `cross_init`.
    pub fn init(&mut self, model: &mut dyn Model) -> ModelResult<()> {
        model.self_init(&mut InitContext::new(&mut self.bus, &self.tag))?;
        model.cross_init(&mut InitContext::new(&mut self.bus, &self.tag))
    }

    pub fn reset(&mut self, model: &mut dyn Model, time: SimTime) -> ModelResult<()> {
        let mut ctx = ModelContext::new(&mut self.bus, &self.tag, time, &mut self.warnings);
        model.reset(&mut ctx, time)
    }

    pub fn update(&mut self, model: &mut dyn Model, time: SimTime) -> ModelResult<()> {
        let mut ctx = ModelContext::new(&mut self.bus, &self.tag, time, &mut self.warnings);
        model.update(&mut ctx, time)
    }

    /// Writes `payload` to `name`, creating the message on first use.
    pub fn publish<T: Message>(
        &mut self,
        name: &str,
        payload: &T,
        time: SimTime,
    ) -> ModelResult<MessageId> {
        let id = match self.bus.find(name) {
            Some(id) => id,
            None => self.bus.create::<T>(name, DEFAULT_BUFFER_COUNT)?,
        };
        self.bus.write(id, payload, time)?;
        Ok(id)
    }

    /// Reads the payload of `name` visible at `time`.
    pub fn read<T: Message>(&self, name: &str, time: SimTime) -> ModelResult<T> {
        let id = self.bus.subscribe::<T>(name)?;
        Ok(self.bus.read::<T>(id, time)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::CmdTorqueBodyMsg;

    struct Echo {
        out: Option<MessageId>,
    }

    impl Model for Echo {
        fn kind(&self) -> ModelKind {
            ModelKind::Custom("Echo".to_string())
        }

        fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
            self.out = Some(ctx.create::<CmdTorqueBodyMsg>("echo_out")?);
            Ok(())
        }

        fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
            if let Some(id) = self.out {
                let msg = CmdTorqueBodyMsg {
                    torque_request_body: [time as f64, 0.0, 0.0],
                };
                ctx.write(id, &msg)?;
            }
            ctx.warn(WarningKind::Saturation, "test");
            Ok(())
        }
    }

    #[test]
    fn test_model_contexts() {
        let mut bus = MessageBus::new();
        let mut echo = Echo { out: None };
        echo.self_init(&mut InitContext::new(&mut bus, "echo")).unwrap();

        let info = bus.info(bus.find("echo_out").unwrap()).unwrap();
        assert_eq!(info.producer.as_deref(), Some("echo"));

        let mut warnings = Vec::new();
        let mut ctx = ModelContext::new(&mut bus, "echo", 42, &mut warnings);
        echo.update(&mut ctx, 42).unwrap();
        let out: CmdTorqueBodyMsg = ctx.read(echo.out.unwrap()).unwrap();
        assert_eq!(out.torque_request_body[0], 42.0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].tag, "echo");
    }

    #[test]
    fn test_optional_subscription() {
        let mut bus = MessageBus::new();
        let ctx = InitContext::new(&mut bus, "m");
        assert_eq!(ctx.subscribe_optional::<CmdTorqueBodyMsg>("").unwrap(), None);
        assert!(ctx.subscribe_optional::<CmdTorqueBodyMsg>("missing").is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ModelKind::Sensor.to_string(), "Sensor");
        assert_eq!(ModelKind::Custom("Probe".into()).to_string(), "Probe");
    }
}
