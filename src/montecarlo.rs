//! Monte Carlo campaigns over isolated simulation contexts.
//!
//! Every trial builds its own [`SimulationContext`] from a user closure, so
//! trials share nothing but the builder. Trial `i` receives the seed
//! `derive_seed(base_seed, i)`; re-running a campaign with the same base seed
//! reproduces every trial bit for bit, whatever the execution order.
//!
//! # Feature Flag
//!
//! Trials run in parallel on the rayon pool with the `parallel` feature and
//! sequentially otherwise:
//! ```toml
//! [dependencies]
//! orrery = { version = "0.1", features = ["parallel"] }
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

use crate::config::SimConfig;
use crate::engine::{SimState, SimulationContext};
use crate::error::{SimError, SimResult};
use crate::model::SimWarning;
use crate::registry::ModelRegistry;
use crate::types::{derive_seed, SimTime};

/// Identity of one trial, handed to the builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialSpec {
    pub index: usize,
    pub seed: u64,
}

impl TrialSpec {
    /// Random stream for drawing dispersions, independent of model noise.
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(derive_seed(self.seed, u64::MAX))
    }
}

/// Result of one trial.
#[derive(Debug)]
pub struct TrialOutcome {
    pub spec: TrialSpec,
    /// Clock at the end of the trial
    pub final_time: SimTime,
    /// Rows of every logged message, keyed by message name
    pub logs: HashMap<String, Vec<Vec<f64>>>,
    pub warnings: Vec<SimWarning>,
    /// Build or runtime error; logs hold the data recorded up to it
    pub failure: Option<SimError>,
}

impl TrialOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Last logged row of a message.
    pub fn last_row(&self, name: &str) -> Option<&[f64]> {
        self.logs.get(name)?.last().map(Vec::as_slice)
    }
}

/// Outcomes of a campaign, ordered by trial index.
#[derive(Debug, Default)]
pub struct MonteCarloResults {
    pub outcomes: Vec<TrialOutcome>,
}

impl MonteCarloResults {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TrialOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TrialOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn outcome(&self, index: usize) -> Option<&TrialOutcome> {
        self.outcomes.iter().find(|o| o.spec.index == index)
    }
}

/// A campaign of `runs` trials.
#[derive(Clone, Debug)]
pub struct MonteCarlo {
    runs: usize,
    base_seed: u64,
    num_threads: usize,
}

impl MonteCarlo {
    pub fn new(runs: usize, base_seed: u64) -> Self {
        Self {
            runs,
            base_seed,
            num_threads: 0,
        }
    }

    /// Limits the worker count (0 uses the global pool).
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Specs of every trial in index order.
    pub fn trials(&self) -> Vec<TrialSpec> {
        (0..self.runs)
            .map(|index| TrialSpec {
                index,
                seed: derive_seed(self.base_seed, index as u64),
            })
            .collect()
    }

    /// Runs every trial built by `builder` to its configured stop time.
    ///
    /// A context returned uninitialized is initialized first.
    pub fn run<F>(&self, builder: F) -> MonteCarloResults
    where
        F: Fn(&TrialSpec) -> SimResult<SimulationContext> + Sync,
    {
        tracing::info!(
            runs = self.runs,
            base_seed = self.base_seed,
            parallel = cfg!(feature = "parallel"),
            "starting Monte Carlo campaign"
        );
        let collected = Mutex::new(Vec::with_capacity(self.runs));
        self.dispatch(&builder, &collected);

        let mut outcomes = collected.into_inner();
        outcomes.sort_by_key(|o: &TrialOutcome| o.spec.index);
        let failures = outcomes.iter().filter(|o| !o.succeeded()).count();
        tracing::info!(runs = outcomes.len(), failures, "Monte Carlo campaign finished");
        MonteCarloResults { outcomes }
    }

    /// Runs trials of a scenario file.
    ///
    /// Each trial clones `config`, sets its seed to the trial seed and lets
    /// `disperse` perturb it before building.
    pub fn run_config<D>(
        &self,
        config: &SimConfig,
        registry: &ModelRegistry,
        disperse: D,
    ) -> MonteCarloResults
    where
        D: Fn(&TrialSpec, &mut SimConfig) + Sync,
    {
        self.run(|spec| {
            let mut trial = config.clone();
            trial.simulation.seed = spec.seed;
            disperse(spec, &mut trial);
            trial.build(registry)
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch<F>(&self, builder: &F, collected: &Mutex<Vec<TrialOutcome>>)
    where
        F: Fn(&TrialSpec) -> SimResult<SimulationContext> + Sync,
    {
        for spec in self.trials() {
            let outcome = run_trial(builder, spec);
            collected.lock().push(outcome);
        }
    }

    #[cfg(feature = "parallel")]
    fn dispatch<F>(&self, builder: &F, collected: &Mutex<Vec<TrialOutcome>>)
    where
        F: Fn(&TrialSpec) -> SimResult<SimulationContext> + Sync,
    {
        let trials = self.trials();
        let work = || {
            trials.par_iter().for_each(|spec| {
                let outcome = run_trial(builder, *spec);
                collected.lock().push(outcome);
            })
        };
        if self.num_threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.num_threads)
                .build()
            {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    tracing::warn!(error = %e, "falling back to the global rayon pool");
                    work()
                }
            }
        } else {
            work()
        }
    }
}

fn run_trial<F>(builder: &F, spec: TrialSpec) -> TrialOutcome
where
    F: Fn(&TrialSpec) -> SimResult<SimulationContext>,
{
    let mut ctx = match builder(&spec) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(run = spec.index, error = %e, "trial failed to build");
            return TrialOutcome {
                spec,
                final_time: 0,
                logs: HashMap::new(),
                warnings: Vec::new(),
                failure: Some(e),
            };
        }
    };

    let result = if ctx.state() == SimState::Uninitialized {
        ctx.initialize().and_then(|_| ctx.execute())
    } else {
        ctx.execute()
    };
    let failure = result.err();
    if let Some(e) = &failure {
        tracing::warn!(run = spec.index, error = %e, "trial failed");
    } else {
        tracing::debug!(run = spec.index, time_ns = ctx.clock(), "trial finished");
    }

    let logger = ctx.logger();
    let logs = logger
        .names()
        .filter_map(|name| Some((name.to_string(), logger.pull(name, None)?)))
        .collect();

    TrialOutcome {
        spec,
        final_time: ctx.clock(),
        logs,
        warnings: ctx.warnings().to_vec(),
        failure,
    }
}
