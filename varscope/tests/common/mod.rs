//! Common test utilities and macros

use std::collections::HashMap;
use varscope::{ActorContext, ScopeController, ScopePolicy, TestPlan, Value};

#[derive(Debug)]
pub enum TestResult {
    /// Values recorded by the plan, in order
    Observed(Vec<Option<Value>>),
    Error(String),
    ErrorRegex(String),
}

impl PartialEq for TestResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TestResult::Observed(a), TestResult::Observed(b)) => a == b,
            (TestResult::Error(a), TestResult::Error(b)) => a == b,
            (TestResult::ErrorRegex(pattern), TestResult::Error(msg)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            (TestResult::Error(msg), TestResult::ErrorRegex(pattern)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            _ => false,
        }
    }
}

/// Runs `plan` on a single actor and collects what it recorded.
///
/// Aborted iterations are not errors for the actor, so the first recorded
/// iteration error is reported instead of the observations.
pub fn run_plan_test(actor: ActorContext, plan: &TestPlan, iterations: u64) -> TestResult {
    match actor.run(plan, iterations) {
        Ok(report) => match report.errors.first() {
            Some(msg) => TestResult::Error(msg.clone()),
            None => TestResult::Observed(
                report.observations.into_iter().map(|o| o.value).collect(),
            ),
        },
        Err(e) => TestResult::Error(format!("{e:#}")),
    }
}

pub fn new_actor() -> ActorContext {
    ActorContext::new("test actor", &HashMap::new())
}

pub fn discard(name: &str) -> ScopeController {
    ScopeController::with_policy(name, ScopePolicy::Discard)
}

pub fn merge(name: &str) -> ScopeController {
    ScopeController::with_policy(name, ScopePolicy::Merge)
}

pub fn int(i: i64) -> Option<Value> {
    Some(Value::Int(i))
}

#[macro_export]
macro_rules! check_plan {
    ($test_name:ident, plan=$plan:expr, iterations=$iterations:expr, result=$expected:expr) => {
        #[test]
        fn $test_name() {
            let plan = $plan;
            let result = crate::common::run_plan_test(crate::common::new_actor(), &plan, $iterations);
            assert_eq!(result, $expected);
        }
    };
}
