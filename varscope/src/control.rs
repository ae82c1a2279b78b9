//! Control elements that drive an actor's variable scopes.
//!
//! A test plan is a tree of control elements. Scope controllers push a
//! variable frame when their iteration starts and pop it, discarding or
//! merging its variables, when the iteration is exhausted.

pub mod plan;
pub mod scope;

pub use plan::{Action, Observation, PlanNode, TestPlan};
pub use scope::{SCOPED_VARIABLE_POLICY, ScopeController, ScopeGuard, ScopeLifecycle};
