//! VarScope Library
//!
//! Nested variable scopes for test plans executed by many concurrent actors.
//!
//! Every actor owns a [`VariableScopeStack`]: a stack of variable frames where
//! writes go to the innermost frame and reads scan from the innermost frame
//! outwards. A [`ScopeController`] pushes a frame when its iteration starts and
//! pops it when the iteration is exhausted, either discarding the frame or
//! merging it into the enclosing one according to its [`ScopePolicy`].
//!
//! # Examples
//! ```
//! use varscope::{ScopeController, ScopePolicy, Value, VariableScopeStack};
//!
//! let mut vars = VariableScopeStack::new();
//! vars.put("x", 1);
//!
//! let scope = ScopeController::with_policy("scope", ScopePolicy::Discard);
//! scope.with_scope(&mut vars, |vars| {
//!     vars.put("x", 2);
//!     assert_eq!(vars.get("x"), Some(&Value::Int(2)));
//! })?;
//!
//! assert_eq!(vars.get("x"), Some(&Value::Int(1)));
//! # Ok::<(), varscope::ScopeError>(())
//! ```

pub mod actor;
pub mod control;
pub mod error;
pub mod policy;
pub mod value;
pub mod variables;

pub use actor::{ActorContext, ActorReport, ThreadGroup};
pub use control::{Action, Observation, PlanNode, ScopeController, ScopeGuard, ScopeLifecycle, TestPlan};
pub use error::{ConfigError, ScopeError};
pub use policy::ScopePolicy;
pub use value::Value;
pub use variables::{VariableFrame, VariableScopeStack};

/// Builds the plan run by the `varscope` binary.
///
/// A counter is set to zero, then a loop runs `loops` times around a scope
/// controller that increments the counter and records it. The counter is
/// recorded once more after the loop, showing whether the scope's changes
/// survived.
pub fn scoped_counter_plan(loops: u32, policy: ScopePolicy) -> TestPlan {
    TestPlan::new(
        "scoped counter",
        vec![
            Action::set("counter", 0).into(),
            PlanNode::repeat(
                loops,
                vec![PlanNode::scope(
                    ScopeController::with_policy("Scope Controller", policy),
                    vec![
                        Action::increment("counter", 1).into(),
                        Action::set("last_scope_value", Value::Null).into(),
                        Action::record("counter").into(),
                    ],
                )],
            ),
            Action::record("counter").into(),
            Action::record("last_scope_value").into(),
        ],
    )
}
