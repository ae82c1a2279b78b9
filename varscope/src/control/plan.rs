//! Test plan tree and its traversal.
//!
//! The traversal walks the tree once per actor iteration. It never keeps
//! state between iterations: everything an iteration leaves behind lives in
//! the actor's [`VariableScopeStack`].

use super::scope::ScopeController;
use crate::value::Value;
use crate::variables::VariableScopeStack;
use anyhow::{Result, anyhow, bail};
use tracing::debug;

/// Unit of work executed by an actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Creates or updates a variable in the current scope
    Set { name: String, value: Value },
    /// Removes a variable from the current scope
    Remove { name: String },
    /// Adds `by` to the visible value and writes the result in the current
    /// scope. Absent and null values count as zero.
    Increment { name: String, by: i64 },
    /// Records the visible value of a variable
    Record { name: String },
    /// Aborts the current iteration
    Fail { message: String },
}

impl Action {
    pub fn set(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Action::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Action::Remove { name: name.into() }
    }

    pub fn increment(name: impl Into<String>, by: i64) -> Self {
        Action::Increment {
            name: name.into(),
            by,
        }
    }

    pub fn record(name: impl Into<String>) -> Self {
        Action::Record { name: name.into() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Action::Fail {
            message: message.into(),
        }
    }

    fn execute(
        &self,
        vars: &mut VariableScopeStack,
        observations: &mut Vec<Observation>,
    ) -> Result<()> {
        debug!("Executing action: {:?}", self);

        match self {
            Action::Set { name, value } => vars.put(name.as_str(), value.clone()),
            Action::Remove { name } => {
                vars.remove(name);
            }
            Action::Increment { name, by } => {
                let current = match vars.get(name) {
                    None | Some(Value::Null) => 0,
                    Some(value) => match value.as_i64() {
                        Some(i) => i,
                        None => bail!("Variable '{}' is not an integer: {}", name, value),
                    },
                };
                let next = current
                    .checked_add(*by)
                    .ok_or_else(|| anyhow!("Integer overflow incrementing '{}'", name))?;
                vars.put(name.as_str(), next);
            }
            Action::Record { name } => observations.push(Observation {
                iteration: vars.current_iteration(),
                name: name.clone(),
                value: vars.get(name).cloned(),
            }),
            Action::Fail { message } => bail!("{}", message),
        }
        Ok(())
    }
}

/// A value seen by a [`Action::Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Actor iteration the value was seen in
    pub iteration: u64,
    pub name: String,
    /// `None` if the variable was absent
    pub value: Option<Value>,
}

/// Node of the test plan tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Action(Action),
    /// Runs its children `count` times
    Loop { count: u32, children: Vec<PlanNode> },
    /// Runs its children once inside a variable scope
    Scope {
        controller: ScopeController,
        children: Vec<PlanNode>,
    },
}

impl PlanNode {
    pub fn repeat(count: u32, children: Vec<PlanNode>) -> Self {
        PlanNode::Loop { count, children }
    }

    pub fn scope(controller: ScopeController, children: Vec<PlanNode>) -> Self {
        PlanNode::Scope {
            controller,
            children,
        }
    }

    /// Executes this node and its subtree.
    ///
    /// Scope frames opened by this node are released before returning,
    /// whether the subtree succeeded or not.
    pub fn run(
        &self,
        vars: &mut VariableScopeStack,
        observations: &mut Vec<Observation>,
    ) -> Result<()> {
        match self {
            PlanNode::Action(action) => action.execute(vars, observations),
            PlanNode::Loop { count, children } => {
                for _ in 0..*count {
                    run_children(children, vars, observations)?;
                }
                Ok(())
            }
            PlanNode::Scope {
                controller,
                children,
            } => controller.with_scope(vars, |vars| run_children(children, vars, observations))?,
        }
    }
}

impl From<Action> for PlanNode {
    fn from(action: Action) -> Self {
        PlanNode::Action(action)
    }
}

fn run_children(
    children: &[PlanNode],
    vars: &mut VariableScopeStack,
    observations: &mut Vec<Observation>,
) -> Result<()> {
    for child in children {
        child.run(vars, observations)?;
    }
    Ok(())
}

/// Immutable tree of control elements shared by every actor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestPlan {
    pub name: String,
    pub nodes: Vec<PlanNode>,
}

impl TestPlan {
    pub fn new(name: impl Into<String>, nodes: Vec<PlanNode>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    /// Runs one full pass of the plan for an actor.
    pub fn run_iteration(
        &self,
        vars: &mut VariableScopeStack,
        observations: &mut Vec<Observation>,
    ) -> Result<()> {
        run_children(&self.nodes, vars, observations)
    }
}
