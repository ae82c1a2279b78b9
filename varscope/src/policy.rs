use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// What a scope does with its variables when it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScopePolicy {
    /// Variables altered inside the scope vanish when it ends
    Discard,
    /// Variables altered inside the scope overwrite the enclosing ones when it ends
    #[default]
    Merge,
}

impl ScopePolicy {
    /// Every policy, in the order an editor should offer them.
    pub const ALL: [ScopePolicy; 2] = [ScopePolicy::Discard, ScopePolicy::Merge];

    /// Name used when persisting the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopePolicy::Discard => "CLEAR_AFTER_SCOPE",
            ScopePolicy::Merge => "MERGE_AFTER_SCOPE",
        }
    }
}

impl fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScopePolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownPolicy(s.to_string()))
    }
}
