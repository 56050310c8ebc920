//! Statistics collection and export.
//!
//! A [`SimulationStats`] snapshot is produced by
//! [`SimulationContext::collect_stats`](crate::engine::SimulationContext::collect_stats)
//! and can be exported as JSON or CSV for run bookkeeping.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::types::SimTime;

/// Aggregate statistics for a simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    pub metadata: SimulationMetadata,
    pub engine: EngineStats,
    pub processes: Vec<ProcessStats>,
    pub models: Vec<ModelStats>,
    pub timing: TimingStats,
}

/// Metadata about the run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationMetadata {
    pub name: String,
    pub version: String,
    /// Seed of the run, if stochastic models were seeded from it
    pub seed: Option<u64>,
}

/// Engine-level counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Clock at the last executed tick
    pub final_time: SimTime,
    /// Ticks executed
    pub ticks_executed: u64,
    /// Task firings over all processes
    pub task_firings: u64,
    /// Model updates over all tasks
    pub model_updates: u64,
    /// Writes mirrored by interface bridges
    pub messages_routed: u64,
    /// Numerical warnings raised by models
    pub warnings: u64,
    /// Lifecycle state at collection time
    pub state: String,
}

/// Per-process summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProcessStats {
    pub name: String,
    pub priority: i32,
    pub message_count: usize,
    pub tasks: Vec<TaskSummary>,
}

/// Per-task summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskSummary {
    pub name: String,
    pub period: SimTime,
    pub firings: u64,
    pub model_updates: u64,
}

/// Per-model summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelStats {
    pub tag: String,
    pub kind: String,
    pub task: String,
    pub updates: u64,
    pub resets: u64,
}

/// Wall-clock performance figures.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingStats {
    pub total_wall_time_ms: f64,
    /// Simulated seconds per wall-clock second
    pub realtime_factor: f64,
    pub ticks_per_second: f64,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Fills timing figures from a measured wall time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;
        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.timing.realtime_factor = crate::types::nano2sec(self.engine.final_time) / seconds;
            self.timing.ticks_per_second = self.engine.ticks_executed as f64 / seconds;
        }
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports per-model statistics to CSV.
    pub fn models_to_csv(&self) -> String {
        let mut csv = String::from("tag,kind,task,updates,resets\n");
        for m in &self.models {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                m.tag, m.kind, m.task, m.updates, m.resets
            ));
        }
        csv
    }

    /// Exports per-model statistics to a CSV file.
    pub fn models_to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.models_to_csv())
    }

    /// Writes a human-readable summary.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Statistics ===")?;
        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        if let Some(seed) = self.metadata.seed {
            writeln!(w, "Seed: {seed}")?;
        }
        writeln!(w, "State: {}", self.engine.state)?;
        writeln!(w, "Final time: {} ns", self.engine.final_time)?;
        writeln!(w, "Ticks: {}", self.engine.ticks_executed)?;
        writeln!(w, "Model updates: {}", self.engine.model_updates)?;
        writeln!(w, "Warnings: {}", self.engine.warnings)?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;

        for p in &self.processes {
            writeln!(w, "Process {} (priority {}):", p.name, p.priority)?;
            for t in &p.tasks {
                writeln!(
                    w,
                    "  {} every {} ns: {} firings",
                    t.name, t.period, t.firings
                )?;
            }
        }
        Ok(())
    }

    /// Returns the summary as a string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple wall-clock timer.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
