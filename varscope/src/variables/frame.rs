//! A single scope level of variables.

use super::SCOPE_DEPTH_KEY;
use crate::value::Value;
use std::collections::BTreeMap;

/// Flat mapping of variable names to values for one scope level.
///
/// Absence of a key and presence of a key holding [`Value::Null`] are
/// different states: [`get`](Self::get) returns `None` for the former and
/// `Some(&Value::Null)` for the latter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableFrame {
    /// Depth of the stack before this frame was pushed
    depth: usize,
    variables: BTreeMap<String, Value>,
}

impl VariableFrame {
    /// Creates a frame for the given depth and records it under the reserved
    /// depth key.
    pub fn new(depth: usize) -> Self {
        let mut variables = BTreeMap::new();
        variables.insert(SCOPE_DEPTH_KEY.to_string(), Value::Str(depth.to_string()));
        Self { depth, variables }
    }

    /// Depth this frame was pushed at. The base frame has depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the raw stored value, or `None` if the key has no entry here.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Whether the key has an entry in this frame, regardless of its value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Creates or updates a variable. Last write wins.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Removes a variable, returning its previous value if it had an entry.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    /// Read-only view of the entries, ordered by name.
    ///
    /// The iterator borrows the frame, so the frame cannot change while the
    /// view is alive.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Updates this frame with every entry of `entries`.
    pub fn put_all<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.variables
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Number of variables, not counting the reserved depth entry.
    pub fn len(&self) -> usize {
        self.variables.len() - usize::from(self.variables.contains_key(SCOPE_DEPTH_KEY))
    }

    /// Whether the frame holds no variables besides the reserved depth entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the frame, yielding its entries.
    pub(crate) fn into_entries(self) -> impl Iterator<Item = (String, Value)> {
        self.variables.into_iter()
    }
}
