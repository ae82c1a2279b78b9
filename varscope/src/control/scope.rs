//! Scope controller and its frame lifecycle.
//!
//! Every frame a scope pushes is popped exactly once. [`ScopeLifecycle`]
//! exposes the two transitions as events for traversals that report
//! "iteration start" and "iteration exhausted" themselves. [`ScopeGuard`]
//! ties the pop to the guard's lifetime so that an iteration aborted by an
//! error or a panic still releases its frame.

use crate::error::{ConfigError, ScopeError};
use crate::policy::ScopePolicy;
use crate::variables::VariableScopeStack;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::thread;
use tracing::{debug, error};

/// Property key under which a scope controller persists its policy.
pub const SCOPED_VARIABLE_POLICY: &str = "VariablesScopeController.SCOPED_VARIABLE_POLICY";

/// Control element that scopes the variables touched by its children.
///
/// The policy is static configuration: it is set before execution and only
/// read while actors run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeController {
    name: String,
    policy: ScopePolicy,
}

impl ScopeController {
    /// Creates a controller with the default policy ([`ScopePolicy::Merge`]).
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_policy(name, ScopePolicy::default())
    }

    pub fn with_policy(name: impl Into<String>, policy: ScopePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    /// Restores a controller from its persisted properties.
    ///
    /// # Returns
    /// * `Err(ConfigError::MissingProperty)` - No policy entry was persisted
    /// * `Err(ConfigError::UnknownPolicy)` - The persisted name is not a policy
    pub fn from_properties(
        name: impl Into<String>,
        properties: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let policy = properties
            .get(SCOPED_VARIABLE_POLICY)
            .ok_or_else(|| ConfigError::MissingProperty(SCOPED_VARIABLE_POLICY.to_string()))?
            .parse::<ScopePolicy>()?;
        Ok(Self::with_policy(name, policy))
    }

    /// Properties to persist for this controller.
    pub fn to_properties(&self) -> HashMap<String, String> {
        HashMap::from([(
            SCOPED_VARIABLE_POLICY.to_string(),
            self.policy.to_string(),
        )])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scoped_variable_policy(&self) -> ScopePolicy {
        self.policy
    }

    pub fn set_scoped_variable_policy(&mut self, policy: ScopePolicy) {
        self.policy = policy;
    }

    /// Starts an iteration of this scope, pushing a frame.
    ///
    /// The frame is popped and the policy applied when the guard exits or is
    /// dropped.
    pub fn enter<'a>(&self, vars: &'a mut VariableScopeStack) -> ScopeGuard<'a> {
        debug!("Entering scope '{}' ({})", self.name, self.policy);
        ScopeGuard::new(vars, ScopeLifecycle::new(self.policy))
    }

    /// Runs `func` inside one iteration of this scope.
    ///
    /// The frame is released even when `func` unwinds. The value returned by
    /// `func` is handed back only once the frame was released cleanly.
    pub fn with_scope<F, R>(&self, vars: &mut VariableScopeStack, func: F) -> Result<R, ScopeError>
    where
        F: FnOnce(&mut VariableScopeStack) -> R,
    {
        let mut guard = self.enter(vars);
        let result = func(&mut *guard);
        guard.exit()?;
        Ok(result)
    }
}

/// Frame lifecycle of one executing scope.
///
/// Counts the frames it pushed so that an exhaustion event without a
/// matching start is reported instead of popping a frame owned by someone
/// else.
#[derive(Debug)]
pub struct ScopeLifecycle {
    policy: ScopePolicy,
    open_frames: usize,
}

impl ScopeLifecycle {
    pub fn new(policy: ScopePolicy) -> Self {
        Self {
            policy,
            open_frames: 0,
        }
    }

    pub fn policy(&self) -> ScopePolicy {
        self.policy
    }

    /// Frames pushed by this lifecycle that were not popped yet.
    pub fn open_frames(&self) -> usize {
        self.open_frames
    }

    /// Pushes a new frame for the iteration that is starting.
    pub fn on_iteration_start(&mut self, vars: &mut VariableScopeStack) {
        vars.push_frame();
        self.open_frames += 1;
    }

    /// Pops the iteration's frame and applies the policy to it.
    pub fn on_iteration_exhausted(&mut self, vars: &mut VariableScopeStack) -> Result<(), ScopeError> {
        if self.open_frames == 0 {
            return Err(ScopeError::UnbalancedExit);
        }
        let frame = vars.pop_frame()?;
        self.open_frames -= 1;

        match self.policy {
            ScopePolicy::Merge => vars.merge_into_current(frame),
            ScopePolicy::Discard => {
                debug!("Discarding frame from depth {}", frame.depth());
            }
        }
        Ok(())
    }
}

/// An open scope iteration over an actor's variables.
///
/// Dereferences to the underlying [`VariableScopeStack`], so code running
/// inside the scope reads and writes variables through the guard.
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    vars: &'a mut VariableScopeStack,
    lifecycle: ScopeLifecycle,
    /// Stack depth right after this scope's push
    depth: usize,
    released: bool,
}

impl<'a> ScopeGuard<'a> {
    fn new(vars: &'a mut VariableScopeStack, mut lifecycle: ScopeLifecycle) -> Self {
        lifecycle.on_iteration_start(vars);
        let depth = vars.depth();
        Self {
            vars,
            lifecycle,
            depth,
            released: false,
        }
    }

    /// Ends the iteration normally, popping the frame and applying the policy.
    pub fn exit(mut self) -> Result<(), ScopeError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ScopeError> {
        self.released = true;
        let found = self.vars.depth();
        if found != self.depth {
            return Err(ScopeError::DepthMismatch {
                expected: self.depth,
                found,
            });
        }
        self.lifecycle.on_iteration_exhausted(self.vars)
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = VariableScopeStack;

    fn deref(&self) -> &Self::Target {
        &*self.vars
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.vars
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.release() {
            // A second panic while unwinding would abort the process.
            if thread::panicking() {
                error!("Failed to release variable scope while unwinding: {}", err);
            } else {
                panic!("Failed to release variable scope: {err}");
            }
        }
    }
}
