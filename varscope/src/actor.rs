//! Actors and the thread group that runs them.
//!
//! Each actor runs on its own thread and owns its own [`VariableScopeStack`].
//! The only data actors share is the [`TestPlan`], which is read-only while
//! they execute. Nothing is looked up through thread-local state: the actor's
//! store is handed to the plan explicitly on every iteration.

use crate::control::{Observation, TestPlan};
use crate::error::ScopeError;
use crate::variables::{VariableFrame, VariableScopeStack};
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::thread::{self, ScopedJoinHandle};
use tracing::{error, info, warn};

/// Execution state of one actor.
#[derive(Debug)]
pub struct ActorContext {
    name: String,
    vars: VariableScopeStack,
    observations: Vec<Observation>,
    errors: Vec<String>,
}

impl ActorContext {
    /// Creates an actor whose base frame is preloaded from `properties`.
    pub fn new(name: impl Into<String>, properties: &HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            vars: VariableScopeStack::with_preload(properties),
            observations: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &VariableScopeStack {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VariableScopeStack {
        &mut self.vars
    }

    /// Runs one pass of `plan`.
    ///
    /// The iteration counter advances whether or not the pass succeeded. A
    /// pass that leaves frames behind is reported as a [`ScopeError`].
    pub fn run_iteration(&mut self, plan: &TestPlan) -> Result<()> {
        let result = plan.run_iteration(&mut self.vars, &mut self.observations);
        self.vars.advance_iteration();
        result?;

        let found = self.vars.depth();
        if found != 1 {
            return Err(ScopeError::DepthMismatch { expected: 1, found }.into());
        }
        Ok(())
    }

    /// Runs `iterations` passes of `plan`.
    ///
    /// An iteration that fails with an ordinary error is recorded and the
    /// actor moves on to its next iteration. A [`ScopeError`] stops the actor.
    pub fn run(mut self, plan: &TestPlan, iterations: u64) -> Result<ActorReport> {
        info!("Starting actor {}", self.name);

        for _ in 0..iterations {
            if let Err(err) = self.run_iteration(plan) {
                if err.downcast_ref::<ScopeError>().is_some() {
                    error!("Actor {} stopped: {:#}", self.name, err);
                    return Err(err.context(format!("actor '{}' aborted", self.name)));
                }
                warn!(
                    "Actor {} iteration {} aborted: {:#}",
                    self.name,
                    self.vars.current_iteration(),
                    err
                );
                self.errors.push(format!("{err:#}"));
            }
        }

        info!(
            "Actor {} finished after {} iterations",
            self.name,
            self.vars.current_iteration()
        );
        Ok(self.into_report())
    }

    fn into_report(self) -> ActorReport {
        ActorReport {
            iterations: self.vars.current_iteration(),
            variables: self.vars.flatten(),
            name: self.name,
            observations: self.observations,
            errors: self.errors,
        }
    }
}

/// Outcome of one actor's run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorReport {
    pub name: String,
    /// Completed iterations
    pub iterations: u64,
    pub observations: Vec<Observation>,
    /// Messages of the iterations that were aborted
    pub errors: Vec<String>,
    /// Flattened variables at the end of the run
    pub variables: VariableFrame,
}

/// A set of actors running the same plan concurrently.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    pub name: String,
    pub actors: usize,
    pub iterations: u64,
    /// Properties each actor preloads into its base frame
    pub properties: HashMap<String, String>,
}

impl ThreadGroup {
    pub fn new(name: impl Into<String>, actors: usize, iterations: u64) -> Self {
        Self {
            name: name.into(),
            actors,
            iterations,
            properties: HashMap::new(),
        }
    }

    /// Name of the `n`-th actor, starting at 1.
    pub fn actor_name(&self, n: usize) -> String {
        format!("{} 1-{}", self.name, n)
    }

    /// Runs every actor on its own thread and waits for all of them.
    ///
    /// # Returns
    /// * `Ok(Vec<ActorReport>)` - One report per actor, in actor order
    /// * `Err(anyhow::Error)` - An actor hit a structural error or panicked
    pub fn run(&self, plan: &TestPlan) -> Result<Vec<ActorReport>> {
        info!(
            "Starting thread group '{}' with {} actors x {} iterations",
            self.name, self.actors, self.iterations
        );

        let iterations = self.iterations;
        let reports = thread::scope(|scope| -> Result<Vec<ActorReport>> {
            let handles = (1..=self.actors)
                .map(|n| {
                    let name = self.actor_name(n);
                    let actor = ActorContext::new(name.clone(), &self.properties);
                    thread::Builder::new()
                        .name(name.clone())
                        .spawn_scoped(scope, move || actor.run(plan, iterations))
                        .with_context(|| format!("failed to spawn actor '{}'", name))
                })
                .collect::<Result<Vec<_>>>()?;

            join_actors(handles)
        })?;

        info!("Thread group '{}' finished", self.name);
        Ok(reports)
    }
}

/// Joins every actor thread before looking at any outcome.
///
/// A scoped thread that panicked and was never joined makes
/// [`thread::scope`] panic, so no handle may be skipped once one failed.
fn join_actors<T>(handles: Vec<ScopedJoinHandle<'_, Result<T>>>) -> Result<Vec<T>> {
    let joined: Vec<_> = handles
        .into_iter()
        .map(|handle| {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
            (name, handle.join())
        })
        .collect();

    joined
        .into_iter()
        .map(|(name, outcome)| -> Result<T> {
            outcome.map_err(|_| anyhow!("actor thread '{}' panicked", name))?
        })
        .collect()
}
