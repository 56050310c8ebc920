//! Processes: groups of tasks sharing one message bus.

use crate::messaging::MessageBus;
use crate::scheduler::insert_by_priority;
use crate::types::TaskId;

/// A named container of tasks.
///
/// Each process owns its message bus. Messages cross process boundaries only
/// through interface bridges.
#[derive(Debug)]
pub struct Process {
    pub name: String,
    pub priority: i32,
    enabled: bool,
    tasks: Vec<(TaskId, i32)>,
    pub(crate) bus: MessageBus,
}

impl Process {
    /// Creates an empty process.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            enabled: true,
            tasks: Vec::new(),
            bus: MessageBus::new(),
        }
    }

    /// Adds a task, keeping insertion order among equal priorities.
    pub fn add_task(&mut self, task: TaskId, priority: i32) {
        insert_by_priority(&mut self.tasks, (task, priority), |t| t.1);
    }

    /// Task ids in execution order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|t| t.0)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The process message bus.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_order() {
        let mut process = Process::new("dynamics", 0);
        process.add_task(0, 5);
        process.add_task(1, 20);
        process.add_task(2, 5);
        assert_eq!(process.task_ids().collect::<Vec<_>>(), vec![1, 0, 2]);
        assert_eq!(process.task_count(), 3);
    }
}
