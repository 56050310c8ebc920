//! The simulation context: clock, processes, tasks and models.
//!
//! `SimulationContext` is the single owner of all run state. It replaces any
//! notion of a process-wide message system: scenario code creates processes
//! and tasks on it, registers models, initializes, and runs.
//!
//! # Example
//!
//! ```
//! use orrery::engine::SimulationContext;
//! use orrery::fsw::inertial3d::{Inertial3D, Inertial3DConfig};
//! use orrery::types::sec2nano;
//!
//! let mut sim = SimulationContext::new();
//! sim.create_process("fsw", 10).unwrap();
//! sim.create_task("fsw", "guidance", sec2nano(0.5), 0).unwrap();
//! let guidance = Inertial3D::new(Inertial3DConfig::default()).unwrap();
//! sim.add_model_to_task("guidance", "inertial3d", Box::new(guidance), 0).unwrap();
//!
//! sim.initialize().unwrap();
//! sim.configure_stop_time(sec2nano(2.0));
//! sim.execute().unwrap();
//! assert_eq!(sim.clock(), sec2nano(2.0));
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ModelError, SimError, SimResult};
use crate::messaging::bridge::Route;
use crate::messaging::{
    FieldDesc, InterfaceBridge, Message, MessageBus, MessageId, MessageLogger, DEFAULT_BUFFER_COUNT,
};
use crate::model::{InitContext, Model, ModelContext, ModelKind, SimWarning};
use crate::scheduler::{tick_granularity, Process, Task};
use crate::stats::{EngineStats, ModelStats, ProcessStats, SimulationStats, TaskSummary, Timer};
use crate::types::{ModelHandle, ProcessId, SimTime, TaskId};

/// Lifecycle state of a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SimState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
    /// A model raised a fatal error; logs remain available
    Faulted,
}

struct ModelSlot {
    tag: String,
    kind: ModelKind,
    process: ProcessId,
    task: TaskId,
    model: Box<dyn Model>,
    reset_done: bool,
    updates: u64,
    resets: u64,
}

struct BridgeSlot {
    bridge: InterfaceBridge,
    from: ProcessId,
    to: ProcessId,
    routes: Vec<Route>,
}

struct LogRequest {
    process: String,
    name: String,
    period: SimTime,
}

/// Owner of all state of one simulation run.
pub struct SimulationContext {
    processes: Vec<Process>,
    /// Process ids in execution order
    process_order: Vec<ProcessId>,
    tasks: Vec<Task>,
    models: Vec<ModelSlot>,
    model_index: HashMap<String, ModelHandle>,
    bridges: Vec<BridgeSlot>,
    pending_logs: Vec<LogRequest>,
    logger: MessageLogger,
    warnings: Vec<SimWarning>,
    clock: SimTime,
    last_tick: Option<SimTime>,
    stop_time: SimTime,
    state: SimState,
    terminate: Arc<AtomicBool>,
    stats: EngineStats,
    seed: Option<u64>,
    /// Wall time spent inside `run_until`
    wall_time_ms: f64,
}

impl std::fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationContext")
            .field("processes", &self.processes.len())
            .field("tasks", &self.tasks.len())
            .field("models", &self.models.len())
            .field("bridges", &self.bridges.len())
            .finish_non_exhaustive()
    }
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            process_order: Vec::new(),
            tasks: Vec::new(),
            models: Vec::new(),
            model_index: HashMap::new(),
            bridges: Vec::new(),
            pending_logs: Vec::new(),
            logger: MessageLogger::new(),
            warnings: Vec::new(),
            clock: 0,
            last_tick: None,
            stop_time: 0,
            state: SimState::Uninitialized,
            terminate: Arc::new(AtomicBool::new(false)),
            stats: EngineStats::default(),
            seed: None,
            wall_time_ms: 0.0,
        }
    }

    /// Records the base seed the models were seeded from.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Creates a process. Higher priority processes execute first.
    pub fn create_process(&mut self, name: &str, priority: i32) -> SimResult<ProcessId> {
        if self.process_id(name).is_ok() {
            return Err(SimError::Duplicate(name.to_string()));
        }
        let id = self.processes.len();
        self.processes.push(Process::new(name, priority));

        let processes = &self.processes;
        crate::scheduler::insert_by_priority(&mut self.process_order, id, |&p| {
            processes[p].priority
        });
        Ok(id)
    }

    /// Creates a task inside a process.
    ///
    /// # Arguments
    /// * `process` - Owning process name
    /// * `name` - Task name, unique in the context
    /// * `period` - Firing period in nanoseconds, must be positive
    /// * `priority` - Order among the process's tasks (higher first)
    pub fn create_task(
        &mut self,
        process: &str,
        name: &str,
        period: SimTime,
        priority: i32,
    ) -> SimResult<TaskId> {
        self.add_task(process, Task::new(name, 0, period).with_priority(priority))
    }

    /// Adds a pre-built task (for first-start offsets).
    pub fn add_task(&mut self, process: &str, mut task: Task) -> SimResult<TaskId> {
        let pid = self.process_id(process)?;
        if self.task_id(&task.name).is_ok() {
            return Err(SimError::Duplicate(task.name.clone()));
        }
        if task.period() == 0 {
            return Err(SimError::Config {
                tag: task.name.clone(),
                source: ModelError::config("period", "must be positive"),
            });
        }
        task.process = pid;
        if self.state != SimState::Uninitialized {
            // A late task starts at its next slot after the last tick.
            task.resync(self.last_tick);
        }
        let id = self.tasks.len();
        let priority = task.priority;
        self.tasks.push(task);
        self.processes[pid].add_task(id, priority);
        Ok(id)
    }

    /// Registers a model on a task.
    ///
    /// Models added after initialization are initialized and reset right away.
    pub fn add_model_to_task(
        &mut self,
        task: &str,
        tag: &str,
        model: Box<dyn Model>,
        priority: i32,
    ) -> SimResult<ModelHandle> {
        let tid = self.task_id(task)?;
        if self.model_index.contains_key(tag) {
            return Err(SimError::Duplicate(tag.to_string()));
        }
        let handle = ModelHandle(self.models.len());
        let kind = model.kind();
        self.models.push(ModelSlot {
            tag: tag.to_string(),
            kind,
            process: self.tasks[tid].process,
            task: tid,
            model,
            reset_done: false,
            updates: 0,
            resets: 0,
        });
        self.model_index.insert(tag.to_string(), handle);
        self.tasks[tid].add_model(handle, priority);

        if self.state != SimState::Uninitialized {
            self.init_model(handle, InitPhase::SelfInit)?;
            self.init_model(handle, InitPhase::CrossInit)?;
        }
        Ok(handle)
    }

    /// Adds an interface bridge. Resolved during initialization.
    pub fn add_bridge(&mut self, bridge: InterfaceBridge) -> SimResult<()> {
        let from = self.process_id(&bridge.from)?;
        let to = self.process_id(&bridge.to)?;
        if from == to {
            return Err(SimError::Config {
                tag: format!("bridge {}->{}", bridge.from, bridge.to),
                source: ModelError::config("to", "bridge must connect two different processes"),
            });
        }
        self.bridges.push(BridgeSlot {
            bridge,
            from,
            to,
            routes: Vec::new(),
        });
        Ok(())
    }

    /// Writes a payload into a process bus at the current clock, creating the
    /// message if needed. Used for static configuration messages.
    pub fn set_message<T: Message>(
        &mut self,
        process: &str,
        name: &str,
        payload: &T,
    ) -> SimResult<()> {
        let pid = self.process_id(process)?;
        let bus = &mut self.processes[pid].bus;
        let id = match bus.find(name) {
            Some(id) => id,
            None => bus.create::<T>(name, DEFAULT_BUFFER_COUNT)?,
        };
        bus.write(id, payload, self.clock)?;
        Ok(())
    }

    /// Requests logging of a message.
    ///
    /// # Arguments
    /// * `process` - Process whose bus holds the message
    /// * `name` - Message name
    /// * `period` - Minimum spacing between samples; 0 logs every write
    pub fn log_message(&mut self, process: &str, name: &str, period: SimTime) -> SimResult<()> {
        let pid = self.process_id(process)?;
        let pending_elsewhere = self
            .pending_logs
            .iter()
            .any(|r| r.name == name && r.process != process);
        let logged_elsewhere = matches!(self.logger.process_of(name), Some(p) if p != pid);
        if pending_elsewhere || logged_elsewhere {
            return Err(SimError::Duplicate(format!("logged message '{name}'")));
        }
        let request = LogRequest {
            process: process.to_string(),
            name: name.to_string(),
            period,
        };
        if self.state == SimState::Uninitialized {
            self.pending_logs.push(request);
            Ok(())
        } else {
            self.attach_log(&request)
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Initializes every model and resolves cross-process messages.
    ///
    /// Order: `self_init` for all models, bridge resolution, `cross_init` for
    /// all models, log resolution, then `reset` for all models at the current
    /// clock. Any failure is a configuration error.
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.state != SimState::Uninitialized {
            return Err(SimError::InvalidState(format!(
                "initialize called in state {:?}",
                self.state
            )));
        }
        tracing::info!(
            processes = self.processes.len(),
            tasks = self.tasks.len(),
            models = self.models.len(),
            "initializing simulation"
        );

        for h in 0..self.models.len() {
            self.init_model(ModelHandle(h), InitPhase::SelfInit)?;
        }

        for b in 0..self.bridges.len() {
            let (from, to) = (self.bridges[b].from, self.bridges[b].to);
            let (src, dst) = two_buses(&mut self.processes, from, to);
            let slot = &mut self.bridges[b];
            slot.routes = slot.bridge.resolve(src, dst).map_err(|e| SimError::Config {
                tag: format!("bridge {}->{}", slot.bridge.from, slot.bridge.to),
                source: e.into(),
            })?;
        }
        self.route_all()?;

        for h in 0..self.models.len() {
            self.init_model(ModelHandle(h), InitPhase::CrossInit)?;
        }

        for request in std::mem::take(&mut self.pending_logs) {
            self.attach_log(&request)?;
        }

        for h in 0..self.models.len() {
            self.reset_slot(ModelHandle(h), self.clock)
                .map_err(|(tag, source)| SimError::Config { tag, source })?;
        }

        for task in &mut self.tasks {
            task.reset_schedule();
        }
        self.state = SimState::Initialized;
        tracing::info!(tick = self.tick_granularity(), "simulation initialized");
        Ok(())
    }

    /// Sets the stop time used by [`execute`](Self::execute).
    pub fn configure_stop_time(&mut self, stop_time: SimTime) {
        self.stop_time = stop_time;
    }

    /// Runs until the configured stop time.
    pub fn execute(&mut self) -> SimResult<()> {
        self.run_until(self.stop_time)
    }

    /// Runs ticks until the last executed tick is at or after `stop_time`.
    ///
    /// The terminate flag is checked between ticks.
    pub fn run_until(&mut self, stop_time: SimTime) -> SimResult<()> {
        self.check_runnable()?;
        self.terminate.store(false, Ordering::SeqCst);
        self.state = SimState::Running;
        tracing::info!(from = self.clock, until = stop_time, "running simulation");

        let timer = Timer::start();
        let result = self.run_ticks(stop_time);
        self.wall_time_ms += timer.elapsed_ms();
        result?;

        self.state = SimState::Stopped;
        Ok(())
    }

    fn run_ticks(&mut self, stop_time: SimTime) -> SimResult<()> {
        loop {
            if self.terminate.load(Ordering::SeqCst) {
                tracing::info!(time_ns = self.clock, "simulation terminated");
                return Ok(());
            }
            if matches!(self.last_tick, Some(last) if last >= stop_time) {
                return Ok(());
            }
            self.step()?;
        }
    }

    /// Advances the clock to the next due task time and fires every due task.
    ///
    /// Processes run in priority order; before a process runs, bridges into it
    /// copy new writes from their source processes.
    ///
    /// # Returns
    /// The time of the executed tick.
    pub fn step(&mut self) -> SimResult<SimTime> {
        self.check_runnable()?;
        let next = self.next_tick_time().ok_or_else(|| {
            SimError::InvalidState("no enabled task left to schedule".to_string())
        })?;
        self.clock = next;
        tracing::trace!(time_ns = next, "tick");

        for i in 0..self.process_order.len() {
            let pid = self.process_order[i];
            if !self.processes[pid].is_enabled() {
                continue;
            }
            self.route_into(pid)?;

            let task_ids: Vec<TaskId> = self.processes[pid].task_ids().collect();
            for tid in task_ids {
                if !self.tasks[tid].is_due(next) {
                    continue;
                }
                for k in 0..self.tasks[tid].models().len() {
                    let handle = self.tasks[tid].models()[k].handle;
                    if let Err((tag, source)) = self.run_model(handle, next) {
                        self.fault(next);
                        tracing::error!(module = %tag, time_ns = next, error = %source, "fatal model error");
                        return Err(SimError::Fatal {
                            tag,
                            time: next,
                            source,
                        });
                    }
                }
                self.tasks[tid].mark_fired();
                self.stats.task_firings += 1;
            }
            self.logger.record(pid, &self.processes[pid].bus);
        }

        self.last_tick = Some(next);
        self.stats.ticks_executed += 1;
        self.stats.final_time = next;
        if self.state == SimState::Initialized || self.state == SimState::Stopped {
            self.state = SimState::Running;
        }
        Ok(next)
    }

    /// Returns a handle that stops `run_until` at the next tick boundary.
    pub fn terminate_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate)
    }

    /// Requests termination at the next tick boundary.
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    /// Explicitly resets one model at `time`.
    pub fn reset_model(&mut self, tag: &str, time: SimTime) -> SimResult<()> {
        let handle = self.model_handle(tag)?;
        self.reset_slot(handle, time)
            .map_err(|(tag, source)| SimError::Config { tag, source })
    }

    // ------------------------------------------------------------------
    // Task control
    // ------------------------------------------------------------------

    pub fn enable_task(&mut self, name: &str) -> SimResult<()> {
        let tid = self.task_id(name)?;
        self.tasks[tid].set_enabled(true, self.last_tick);
        Ok(())
    }

    pub fn disable_task(&mut self, name: &str) -> SimResult<()> {
        let tid = self.task_id(name)?;
        self.tasks[tid].set_enabled(false, self.last_tick);
        Ok(())
    }

    /// Changes a task period; takes effect after the last executed tick.
    pub fn update_task_period(&mut self, name: &str, period: SimTime) -> SimResult<()> {
        if period == 0 {
            return Err(SimError::Config {
                tag: name.to_string(),
                source: ModelError::config("period", "must be positive"),
            });
        }
        let tid = self.task_id(name)?;
        self.tasks[tid].set_period(period, self.last_tick);
        Ok(())
    }

    pub fn enable_process(&mut self, name: &str, enabled: bool) -> SimResult<()> {
        let pid = self.process_id(name)?;
        if enabled && !self.processes[pid].is_enabled() {
            // Skip the firings missed while the process was off.
            for tid in self.processes[pid].task_ids() {
                self.tasks[tid].resync(self.last_tick);
            }
        }
        self.processes[pid].set_enabled(enabled);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Current simulation time.
    pub fn clock(&self) -> SimTime {
        self.clock
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Greatest common divisor of all enabled task periods.
    pub fn tick_granularity(&self) -> SimTime {
        tick_granularity(
            self.tasks
                .iter()
                .filter(|t| t.is_enabled())
                .map(|t| t.period()),
        )
    }

    /// Numerical warnings raised so far.
    pub fn warnings(&self) -> &[SimWarning] {
        &self.warnings
    }

    pub fn logger(&self) -> &MessageLogger {
        &self.logger
    }

    /// Pulls logged rows `[time_ns, fields...]`.
    ///
    /// `selector` is a logged message name, optionally followed by
    /// `.field`; `range` indexes into the selection.
    pub fn pull_logged_data(
        &self,
        selector: &str,
        range: Option<Range<usize>>,
    ) -> SimResult<Vec<Vec<f64>>> {
        self.logger.pull(selector, range).ok_or_else(|| {
            SimError::Messaging(crate::error::MessagingError::UnknownMessage(
                selector.to_string(),
            ))
        })
    }

    /// Reads the latest payload of a message visible at the current clock.
    pub fn read_message<T: Message>(&self, process: &str, name: &str) -> SimResult<T> {
        let bus = self.bus(process)?;
        let id = bus.subscribe::<T>(name)?;
        Ok(bus.read::<T>(id, self.clock)?.0)
    }

    /// Message bus of a process.
    pub fn bus(&self, process: &str) -> SimResult<&MessageBus> {
        let pid = self.process_id(process)?;
        Ok(&self.processes[pid].bus)
    }

    pub fn task(&self, name: &str) -> SimResult<&Task> {
        Ok(&self.tasks[self.task_id(name)?])
    }

    /// Number of updates a model has received.
    pub fn model_updates(&self, tag: &str) -> SimResult<u64> {
        Ok(self.models[self.model_handle(tag)?.0].updates)
    }

    /// Engine counters.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Builds a full statistics snapshot.
    pub fn collect_stats(&self) -> SimulationStats {
        let mut stats = SimulationStats::new();
        stats.metadata.version = env!("CARGO_PKG_VERSION").to_string();
        stats.metadata.seed = self.seed;
        stats.engine = self.stats.clone();
        stats.engine.warnings = self.warnings.len() as u64;
        stats.engine.state = format!("{:?}", self.state);
        stats.compute_timing(self.wall_time_ms);

        for &pid in &self.process_order {
            let process = &self.processes[pid];
            stats.processes.push(ProcessStats {
                name: process.name.clone(),
                priority: process.priority,
                message_count: process.bus.len(),
                tasks: process
                    .task_ids()
                    .map(|tid| {
                        let task = &self.tasks[tid];
                        TaskSummary {
                            name: task.name.clone(),
                            period: task.period(),
                            firings: task.stats().firings,
                            model_updates: task.stats().model_updates,
                        }
                    })
                    .collect(),
            });
        }

        for slot in &self.models {
            stats.models.push(ModelStats {
                tag: slot.tag.clone(),
                kind: slot.kind.to_string(),
                task: self.tasks[slot.task].name.clone(),
                updates: slot.updates,
                resets: slot.resets,
            });
        }
        stats
    }

    /// Exports statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::to_value(self.collect_stats()).unwrap_or(serde_json::Value::Null)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn process_id(&self, name: &str) -> SimResult<ProcessId> {
        self.processes
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SimError::UnknownProcess(name.to_string()))
    }

    fn task_id(&self, name: &str) -> SimResult<TaskId> {
        self.tasks
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| SimError::UnknownTask(name.to_string()))
    }

    fn model_handle(&self, tag: &str) -> SimResult<ModelHandle> {
        self.model_index
            .get(tag)
            .copied()
            .ok_or_else(|| SimError::UnknownModel(tag.to_string()))
    }

    fn check_runnable(&self) -> SimResult<()> {
        match self.state {
            SimState::Uninitialized => Err(SimError::InvalidState(
                "simulation must be initialized before running".to_string(),
            )),
            SimState::Faulted => Err(SimError::InvalidState(
                "simulation faulted; rebuild the context to run again".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn next_tick_time(&self) -> Option<SimTime> {
        self.tasks
            .iter()
            .filter(|t| self.processes[t.process].is_enabled())
            .filter_map(|t| t.next_start())
            .min()
    }

    fn init_model(&mut self, handle: ModelHandle, phase: InitPhase) -> SimResult<()> {
        let slot = &mut self.models[handle.0];
        let bus = &mut self.processes[slot.process].bus;
        let mut ctx = InitContext::new(bus, &slot.tag);
        let result = match phase {
            InitPhase::SelfInit => slot.model.self_init(&mut ctx),
            InitPhase::CrossInit => slot.model.cross_init(&mut ctx),
        };
        result.map_err(|source| SimError::Config {
            tag: slot.tag.clone(),
            source,
        })
    }

    fn reset_slot(&mut self, handle: ModelHandle, time: SimTime) -> Result<(), (String, ModelError)> {
        let slot = &mut self.models[handle.0];
        let bus = &mut self.processes[slot.process].bus;
        let mut ctx = ModelContext::new(bus, &slot.tag, time, &mut self.warnings);
        slot.model
            .reset(&mut ctx, time)
            .map_err(|e| (slot.tag.clone(), e))?;
        slot.reset_done = true;
        slot.resets += 1;
        tracing::debug!(module = %slot.tag, time_ns = time, "model reset");
        Ok(())
    }

    fn run_model(&mut self, handle: ModelHandle, time: SimTime) -> Result<(), (String, ModelError)> {
        if !self.models[handle.0].reset_done {
            self.reset_slot(handle, time)?;
        }
        let slot = &mut self.models[handle.0];
        let bus = &mut self.processes[slot.process].bus;
        let mut ctx = ModelContext::new(bus, &slot.tag, time, &mut self.warnings);
        slot.model
            .update(&mut ctx, time)
            .map_err(|e| (slot.tag.clone(), e))?;
        slot.updates += 1;
        self.stats.model_updates += 1;
        Ok(())
    }

    fn route_into(&mut self, pid: ProcessId) -> SimResult<()> {
        for b in 0..self.bridges.len() {
            if self.bridges[b].to == pid {
                self.route_bridge(b)?;
            }
        }
        Ok(())
    }

    fn route_all(&mut self) -> SimResult<()> {
        for b in 0..self.bridges.len() {
            self.route_bridge(b)?;
        }
        Ok(())
    }

    fn route_bridge(&mut self, b: usize) -> SimResult<()> {
        let (from, to) = (self.bridges[b].from, self.bridges[b].to);
        let dst_tick = tick_granularity(
            self.processes[to]
                .task_ids()
                .map(|tid| self.tasks[tid].period()),
        );
        let (src, dst) = two_buses(&mut self.processes, from, to);
        let slot = &mut self.bridges[b];
        let copied = slot.bridge.route(&mut slot.routes, src, dst, dst_tick)?;
        self.stats.messages_routed += copied as u64;
        Ok(())
    }

    fn attach_log(&mut self, request: &LogRequest) -> SimResult<()> {
        let pid = self.process_id(&request.process)?;
        let bus = &self.processes[pid].bus;
        let id = bus.find(&request.name).ok_or_else(|| SimError::Config {
            tag: "logger".to_string(),
            source: ModelError::Messaging(crate::error::MessagingError::UnknownMessage(
                request.name.clone(),
            )),
        })?;
        let layout = layout_for(bus, id);
        self.logger
            .add(&request.name, pid, id, request.period, &layout)
            .map_err(|e| SimError::Config {
                tag: "logger".to_string(),
                source: e.into(),
            })
    }

    fn fault(&mut self, time: SimTime) {
        for &pid in &self.process_order {
            self.logger.record(pid, &self.processes[pid].bus);
        }
        self.last_tick = Some(time);
        self.stats.final_time = time;
        self.state = SimState::Faulted;
    }
}

#[derive(Clone, Copy)]
enum InitPhase {
    SelfInit,
    CrossInit,
}

/// Field layout used for logging a message.
///
/// Typed messages carry named fields; raw messages log one field named `data`.
fn layout_for(bus: &MessageBus, id: MessageId) -> Vec<FieldDesc> {
    match bus.info(id) {
        Ok(info) => match info.layout {
            Some(layout) => layout.to_vec(),
            None => vec![FieldDesc {
                name: "data",
                len: info.element_count,
            }],
        },
        Err(_) => Vec::new(),
    }
}

/// Borrows two distinct process buses mutably.
fn two_buses(
    processes: &mut [Process],
    from: ProcessId,
    to: ProcessId,
) -> (&MessageBus, &mut MessageBus) {
    if from < to {
        let (left, right) = processes.split_at_mut(to);
        (&left[from].bus, &mut right[0].bus)
    } else {
        let (left, right) = processes.split_at_mut(from);
        (&right[0].bus, &mut left[to].bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelResult;
    use crate::messaging::CmdTorqueBodyMsg;
    use parking_lot::Mutex;

    type FiringLog = Arc<Mutex<Vec<(String, SimTime)>>>;

    struct Recorder {
        name: String,
        log: FiringLog,
    }

    impl Model for Recorder {
        fn kind(&self) -> ModelKind {
            ModelKind::Custom("Recorder".into())
        }

        fn update(&mut self, _ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
            self.log.lock().push((self.name.clone(), time));
            Ok(())
        }
    }

    fn recorder(name: &str, log: &FiringLog) -> Box<dyn Model> {
        Box::new(Recorder {
            name: name.to_string(),
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut sim = SimulationContext::new();
        sim.create_process("dyn", 0).unwrap();
        assert!(matches!(
            sim.create_process("dyn", 1),
            Err(SimError::Duplicate(_))
        ));
        sim.create_task("dyn", "t", 10, 0).unwrap();
        assert!(matches!(
            sim.create_task("dyn", "t", 10, 0),
            Err(SimError::Duplicate(_))
        ));
        assert!(matches!(
            sim.create_task("dyn", "zero", 0, 0),
            Err(SimError::Config { .. })
        ));
    }

    #[test]
    fn test_step_requires_initialization() {
        let mut sim = SimulationContext::new();
        assert!(matches!(sim.step(), Err(SimError::InvalidState(_))));
    }

    #[test]
    fn test_process_and_task_priority_order() {
        let log: FiringLog = Arc::default();
        let mut sim = SimulationContext::new();
        sim.create_process("low", 0).unwrap();
        sim.create_process("high", 10).unwrap();
        sim.create_task("low", "low_task", 10, 0).unwrap();
        sim.create_task("high", "high_a", 10, 0).unwrap();
        sim.create_task("high", "high_b", 10, 5).unwrap();
        sim.add_model_to_task("low_task", "l", recorder("l", &log), 0).unwrap();
        sim.add_model_to_task("high_a", "a", recorder("a", &log), 0).unwrap();
        sim.add_model_to_task("high_b", "b", recorder("b", &log), 0).unwrap();

        sim.initialize().unwrap();
        sim.step().unwrap();

        let names: Vec<String> = log.lock().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["b", "a", "l"]);
    }

    #[test]
    fn test_terminate_handle_stops_between_ticks() {
        let mut sim = SimulationContext::new();
        sim.create_process("p", 0).unwrap();
        sim.create_task("p", "t", 10, 0).unwrap();
        sim.initialize().unwrap();
        sim.terminate();
        // The flag is cleared on entry, so a fresh run proceeds.
        sim.run_until(30).unwrap();
        assert_eq!(sim.clock(), 30);
        assert_eq!(sim.state(), SimState::Stopped);
    }

    struct Exploder;

    impl Model for Exploder {
        fn kind(&self) -> ModelKind {
            ModelKind::Dynamics
        }

        fn update(&mut self, _ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
            if time >= 20 {
                return Err(ModelError::NonFinite("state".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_fatal_error_reports_tag_and_time() {
        let mut sim = SimulationContext::new();
        sim.create_process("p", 0).unwrap();
        sim.create_task("p", "t", 10, 0).unwrap();
        sim.add_model_to_task("t", "boom", Box::new(Exploder), 0).unwrap();
        sim.initialize().unwrap();

        let err = sim.run_until(100).unwrap_err();
        match err {
            SimError::Fatal { tag, time, .. } => {
                assert_eq!(tag, "boom");
                assert_eq!(time, 20);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(sim.state(), SimState::Faulted);
        assert!(sim.step().is_err());
    }

    #[test]
    fn test_logged_name_is_unique_across_processes() {
        let mut sim = SimulationContext::new();
        sim.create_process("dyn", 0).unwrap();
        sim.create_process("fsw", 0).unwrap();
        sim.log_message("dyn", "sc_states", 0).unwrap();
        // Re-registering in the same process only changes the period.
        sim.log_message("dyn", "sc_states", 100).unwrap();
        assert!(matches!(
            sim.log_message("fsw", "sc_states", 0),
            Err(SimError::Duplicate(_))
        ));
    }

    #[test]
    fn test_task_added_mid_run_starts_after_last_tick() {
        let log: FiringLog = Arc::default();
        let mut sim = SimulationContext::new();
        sim.create_process("p", 0).unwrap();
        sim.create_task("p", "t", 10, 0).unwrap();
        sim.initialize().unwrap();
        sim.run_until(30).unwrap();

        sim.create_task("p", "late", 10, 0).unwrap();
        sim.add_model_to_task("late", "rec", recorder("rec", &log), 0)
            .unwrap();
        assert_eq!(sim.step().unwrap(), 40);
        assert_eq!(sim.clock(), 40);

        let times: Vec<SimTime> = log.lock().iter().map(|(_, t)| *t).collect();
        assert_eq!(times, vec![40]);
    }

    #[test]
    fn test_reenabled_process_does_not_rewind_clock() {
        let log: FiringLog = Arc::default();
        let mut sim = SimulationContext::new();
        sim.create_process("a", 0).unwrap();
        sim.create_process("b", 0).unwrap();
        sim.create_task("a", "ta", 10, 0).unwrap();
        sim.create_task("b", "tb", 10, 0).unwrap();
        sim.add_model_to_task("tb", "rec", recorder("rec", &log), 0)
            .unwrap();
        sim.initialize().unwrap();

        sim.enable_process("b", false).unwrap();
        sim.run_until(30).unwrap();
        sim.enable_process("b", true).unwrap();
        sim.run_until(50).unwrap();

        let times: Vec<SimTime> = log.lock().iter().map(|(_, t)| *t).collect();
        assert_eq!(times, vec![40, 50]);
        assert_eq!(sim.clock(), 50);
    }

    struct Producer {
        out: Option<MessageId>,
    }

    impl Model for Producer {
        fn kind(&self) -> ModelKind {
            ModelKind::Control
        }

        fn self_init(&mut self, ctx: &mut InitContext<'_>) -> ModelResult<()> {
            self.out = Some(ctx.create::<CmdTorqueBodyMsg>("torque")?);
            Ok(())
        }

        fn update(&mut self, ctx: &mut ModelContext<'_>, time: SimTime) -> ModelResult<()> {
            if let Some(id) = self.out {
                ctx.write(id, &CmdTorqueBodyMsg { torque_request_body: [time as f64; 3] })?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_stats_export() {
        let mut sim = SimulationContext::new();
        sim.create_process("p", 0).unwrap();
        sim.create_task("p", "t", 10, 0).unwrap();
        sim.add_model_to_task("t", "prod", Box::new(Producer { out: None }), 0)
            .unwrap();
        sim.log_message("p", "torque", 0).unwrap();
        sim.set_seed(9);
        sim.initialize().unwrap();
        sim.run_until(50).unwrap();

        let stats = sim.export_stats();
        assert_eq!(stats["metadata"]["seed"], 9);
        assert!(stats["timing"]["total_wall_time_ms"].as_f64().unwrap() > 0.0);
        assert!(stats["timing"]["ticks_per_second"].as_f64().unwrap() > 0.0);
        assert_eq!(stats["engine"]["ticks_executed"], 6);
        assert_eq!(stats["models"][0]["updates"], 6);
        assert_eq!(sim.logger().row_count("torque"), 6);
        let last: CmdTorqueBodyMsg = sim.read_message("p", "torque").unwrap();
        assert_eq!(last.torque_request_body, [50.0; 3]);
    }
}
