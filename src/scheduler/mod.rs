//! Multi-rate task scheduling primitives.
//!
//! Processes run in descending priority, tasks within a process in descending
//! priority, models within a task in descending priority. Ties always keep
//! insertion order, so a scenario built the same way twice executes the same
//! way twice.
//!
//! The clock itself is advanced by
//! [`SimulationContext`](crate::engine::SimulationContext).

pub mod process;
pub mod task;

pub use process::Process;
pub use task::{Task, TaskModel, TaskStats};

use crate::types::{gcd, SimTime};

/// Inserts `item` after every element whose priority is at least its own.
pub(crate) fn insert_by_priority<T, F>(items: &mut Vec<T>, item: T, priority: F)
where
    F: Fn(&T) -> i32,
{
    let p = priority(&item);
    let pos = items
        .iter()
        .position(|existing| priority(existing) < p)
        .unwrap_or(items.len());
    items.insert(pos, item);
}

/// Greatest common divisor of a set of task periods.
///
/// This is the finest granularity at which any task can fire. Returns 0 for
/// an empty set.
pub fn tick_granularity(periods: impl IntoIterator<Item = SimTime>) -> SimTime {
    periods.into_iter().fold(0, gcd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_granularity() {
        assert_eq!(tick_granularity([100, 250, 1000]), 50);
        assert_eq!(tick_granularity([]), 0);
        assert_eq!(tick_granularity([10]), 10);
    }

    #[test]
    fn test_insert_by_priority_is_stable() {
        let mut items = Vec::new();
        for (name, p) in [("a", 1), ("b", 3), ("c", 1), ("d", 3), ("e", 2)] {
            insert_by_priority(&mut items, (name, p), |i| i.1);
        }
        let names: Vec<&str> = items.iter().map(|i| i.0).collect();
        assert_eq!(names, vec!["b", "d", "e", "a", "c"]);
    }
}
