//! Fixed-period tasks.
//!
//! A `Task` fires when `clock == first_start + k * period` and, each time it
//! fires, updates its bound models in descending model priority. Models with
//! equal priority keep their insertion order.

use serde::Serialize;

use crate::scheduler::insert_by_priority;
use crate::types::{ModelHandle, ProcessId, SimTime};

/// A model bound to a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskModel {
    pub handle: ModelHandle,
    pub priority: i32,
}

/// Counters collected per task.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TaskStats {
    /// Number of times the task fired
    pub firings: u64,
    /// Number of model updates issued
    pub model_updates: u64,
}

/// A named, fixed-period, ordered list of model bindings.
#[derive(Clone, Debug)]
pub struct Task {
    pub name: String,
    pub process: ProcessId,
    pub priority: i32,
    period: SimTime,
    first_start: SimTime,
    next_start: SimTime,
    enabled: bool,
    models: Vec<TaskModel>,
    pub(crate) stats: TaskStats,
}

impl Task {
    /// Creates a task.
    ///
    /// # Arguments
    /// * `name` - Task name, unique within the context
    /// * `process` - Owning process
    /// * `period` - Firing period, must be positive
    pub fn new(name: impl Into<String>, process: ProcessId, period: SimTime) -> Self {
        Self {
            name: name.into(),
            process,
            priority: 0,
            period,
            first_start: 0,
            next_start: 0,
            enabled: true,
            models: Vec::new(),
            stats: TaskStats::default(),
        }
    }

    /// Sets the task priority within its process (higher runs first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Delays the first firing.
    pub fn with_first_start(mut self, first_start: SimTime) -> Self {
        self.first_start = first_start;
        self.next_start = first_start;
        self
    }

    pub fn period(&self) -> SimTime {
        self.period
    }

    pub fn first_start(&self) -> SimTime {
        self.first_start
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    /// Bound models in execution order.
    pub fn models(&self) -> &[TaskModel] {
        &self.models
    }

    /// Binds a model, keeping insertion order among equal priorities.
    pub fn add_model(&mut self, handle: ModelHandle, priority: i32) {
        insert_by_priority(&mut self.models, TaskModel { handle, priority }, |m| m.priority);
    }

    /// Next firing time, or `None` when disabled.
    pub fn next_start(&self) -> Option<SimTime> {
        self.enabled.then_some(self.next_start)
    }

    /// Returns true if the task fires at `time`.
    pub fn is_due(&self, time: SimTime) -> bool {
        self.enabled && self.next_start == time
    }

    /// Advances the schedule after firing.
    pub(crate) fn mark_fired(&mut self) {
        self.next_start = self.next_start.saturating_add(self.period);
        self.stats.firings += 1;
        self.stats.model_updates += self.models.len() as u64;
    }

    /// Rewinds the schedule to the first start.
    pub(crate) fn reset_schedule(&mut self) {
        self.next_start = self.first_start;
    }

    /// Moves the next firing to the first slot strictly after `after`
    /// (or at/after the first start if `after` is `None`).
    pub(crate) fn resync(&mut self, after: Option<SimTime>) {
        let Some(after) = after else {
            self.next_start = self.first_start;
            return;
        };
        if after < self.first_start {
            self.next_start = self.first_start;
            return;
        }
        let elapsed = after - self.first_start;
        self.next_start = self.first_start + (elapsed / self.period + 1) * self.period;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool, last_tick: Option<SimTime>) {
        if enabled && !self.enabled {
            self.resync(last_tick);
        }
        self.enabled = enabled;
    }

    /// Changes the period; the next firing is recomputed after `last_tick`.
    pub(crate) fn set_period(&mut self, period: SimTime, last_tick: Option<SimTime>) {
        self.period = period;
        self.resync(last_tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_order_priority_then_insertion() {
        let mut task = Task::new("fsw", 0, 100);
        task.add_model(ModelHandle(0), 0);
        task.add_model(ModelHandle(1), 10);
        task.add_model(ModelHandle(2), 0);
        task.add_model(ModelHandle(3), 10);

        let order: Vec<usize> = task.models().iter().map(|m| m.handle.0).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_schedule_and_first_start() {
        let mut task = Task::new("t", 0, 100).with_first_start(50);
        assert!(task.is_due(50));
        task.mark_fired();
        assert_eq!(task.next_start(), Some(150));
        assert_eq!(task.stats().firings, 1);
    }

    #[test]
    fn test_reenable_resyncs_to_grid() {
        let mut task = Task::new("t", 0, 100);
        task.set_enabled(false, Some(0));
        assert_eq!(task.next_start(), None);
        task.set_enabled(true, Some(350));
        assert_eq!(task.next_start(), Some(400));
    }

    #[test]
    fn test_period_change() {
        let mut task = Task::new("t", 0, 100);
        task.set_period(30, Some(100));
        assert_eq!(task.next_start(), Some(120));
    }
}
