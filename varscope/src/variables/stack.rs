//! Layered variable store implementation.
//!
//! The store keeps a base frame that can never be popped, plus a stack of
//! scope frames pushed by scope controllers. Writes always land in the
//! innermost frame. Reads scan from the innermost frame outwards and stop at
//! the first frame that has an entry for the key, even when that entry is a
//! stored null. This is what lets an inner scope shadow an outer value with
//! null instead of falling through to it.

use super::{PRELOAD_PROPERTIES, VariableFrame};
use crate::error::ScopeError;
use crate::value::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::iter;
use tracing::debug;

/// Ordered stack of variable frames owned by one actor.
#[derive(Debug, Clone)]
pub struct VariableScopeStack {
    /// Outermost frame, alive for the whole actor lifetime
    base: VariableFrame,
    /// Scope frames, innermost last. Nesting is usually shallow.
    scopes: SmallVec<[VariableFrame; 4]>,
    /// Completed iterations of the owning actor
    iteration: u64,
}

impl Default for VariableScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableScopeStack {
    /// Creates a store holding only the base frame.
    pub fn new() -> Self {
        Self {
            base: VariableFrame::new(0),
            scopes: SmallVec::new_const(),
            iteration: 0,
        }
    }

    /// Creates a store whose base frame is preloaded with the start-time
    /// properties found in `properties`. Missing properties are skipped.
    pub fn with_preload(properties: &HashMap<String, String>) -> Self {
        let mut stack = Self::new();
        for name in PRELOAD_PROPERTIES {
            if let Some(value) = properties.get(name) {
                stack.base.put(name, value.as_str());
            }
        }
        stack
    }

    /// Pushes a new frame and makes it current.
    ///
    /// The frame records the depth of the stack before the push.
    pub fn push_frame(&mut self) -> &mut VariableFrame {
        let depth = self.depth();
        debug!("Pushing variable frame at depth {}", depth);
        self.scopes.push(VariableFrame::new(depth));
        self.current_mut()
    }

    /// Removes and returns the innermost frame.
    ///
    /// # Returns
    /// * `Ok(VariableFrame)` - The popped frame, now owned by the caller
    /// * `Err(ScopeError::ScopeUnderflow)` - Only the base frame is left
    pub fn pop_frame(&mut self) -> Result<VariableFrame, ScopeError> {
        let frame = self.scopes.pop().ok_or(ScopeError::ScopeUnderflow)?;
        debug!(
            "Popped variable frame at depth {} ({} entries)",
            frame.depth(),
            frame.len()
        );
        Ok(frame)
    }

    /// Number of frames, including the base frame.
    pub fn depth(&self) -> usize {
        self.scopes.len() + 1
    }

    /// The innermost frame.
    pub fn current(&self) -> &VariableFrame {
        self.scopes.last().unwrap_or(&self.base)
    }

    fn current_mut(&mut self) -> &mut VariableFrame {
        self.scopes.last_mut().unwrap_or(&mut self.base)
    }

    /// Frame pushed at `depth`, where 0 is the base frame.
    pub fn frame(&self, depth: usize) -> Option<&VariableFrame> {
        match depth {
            0 => Some(&self.base),
            n => self.scopes.get(n - 1),
        }
    }

    /// Frames from innermost to outermost.
    fn frames_inner_first(&self) -> impl Iterator<Item = &VariableFrame> {
        self.scopes.iter().rev().chain(iter::once(&self.base))
    }

    /// Looks up the visible value of a variable.
    ///
    /// Returns the value of the innermost frame that has an entry for `key`,
    /// including a stored [`Value::Null`]. Returns `None` only when no frame
    /// has an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if self.scopes.is_empty() {
            return self.base.get(key);
        }
        self.frames_inner_first().find_map(|frame| frame.get(key))
    }

    /// String view of [`get`](Self::get).
    ///
    /// Both absent keys and stored nulls yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|value| !value.is_null())
            .map(ToString::to_string)
    }

    /// Creates or updates a variable in the current frame.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.current_mut().put(key, value);
    }

    /// Updates the current frame with every entry of `entries`.
    pub fn put_all<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.current_mut().put_all(entries);
    }

    /// Removes a variable from the current frame only.
    ///
    /// An outer value for the same key becomes visible again.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.current_mut().remove(key)
    }

    /// Writes every entry of a popped frame into the current frame,
    /// overwriting same-named keys.
    ///
    /// The reserved depth entry is frame metadata and is not copied.
    pub fn merge_into_current(&mut self, frame: VariableFrame) {
        let current = self.current_mut();
        debug!(
            "Merging frame from depth {} into depth {}",
            frame.depth(),
            current.depth()
        );
        current.put_all(
            frame
                .into_entries()
                .filter(|(key, _)| key != super::SCOPE_DEPTH_KEY),
        );
    }

    /// Builds an independent single frame holding the visible state of the
    /// stack.
    ///
    /// Frames are layered outermost first so that inner entries overwrite
    /// outer ones, matching what [`get`](Self::get) returns for every key.
    /// The snapshot carries the depth of the innermost frame.
    pub fn flatten(&self) -> VariableFrame {
        let mut out = VariableFrame::new(self.current().depth());
        for frame in iter::once(&self.base).chain(self.scopes.iter()) {
            out.put_all(frame.entries().map(|(k, v)| (k, v.clone())));
        }
        out
    }

    /// Enumerates the flattened view, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (String, Value)> {
        self.flatten().into_entries()
    }

    /// Completed iterations of the owning actor.
    pub fn current_iteration(&self) -> u64 {
        self.iteration
    }

    /// Marks one more completed iteration.
    pub fn advance_iteration(&mut self) {
        self.iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::SCOPE_DEPTH_KEY;

    #[test]
    fn test_new_stack_has_base_frame() {
        let stack = VariableScopeStack::new();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current().depth(), 0);
        assert_eq!(stack.current_iteration(), 0);
    }

    #[test]
    fn test_push_records_previous_depth() {
        let mut stack = VariableScopeStack::new();
        assert_eq!(stack.push_frame().depth(), 1);
        assert_eq!(stack.push_frame().depth(), 2);
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.get(SCOPE_DEPTH_KEY), Some(&Value::from("2")));
        assert_eq!(stack.frame(1).map(VariableFrame::depth), Some(1));
        assert!(stack.frame(3).is_none());
    }

    #[test]
    fn test_pop_base_frame_underflows() {
        let mut stack = VariableScopeStack::new();
        assert_eq!(stack.pop_frame(), Err(ScopeError::ScopeUnderflow));

        stack.push_frame();
        assert!(stack.pop_frame().is_ok());
        assert_eq!(stack.pop_frame(), Err(ScopeError::ScopeUnderflow));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_put_get_same_frame() {
        let mut stack = VariableScopeStack::new();
        stack.push_frame();
        stack.put("k", 5);
        assert_eq!(stack.get("k"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_inner_shadows_outer() {
        let mut stack = VariableScopeStack::new();
        stack.put("k", "outer");
        stack.push_frame();
        stack.put("k", "inner");
        assert_eq!(stack.get("k"), Some(&Value::from("inner")));

        stack.pop_frame().unwrap();
        assert_eq!(stack.get("k"), Some(&Value::from("outer")));
    }

    #[test]
    fn test_null_shadows_outer_value() {
        let mut stack = VariableScopeStack::new();
        stack.put("k", "outer");
        stack.push_frame();
        stack.put("k", Value::Null);

        assert_eq!(stack.get("k"), Some(&Value::Null));
        assert_eq!(stack.get_str("k"), None);
        assert_eq!(stack.get("unset"), None);
    }

    #[test]
    fn test_absent_key_falls_through() {
        let mut stack = VariableScopeStack::new();
        stack.put("k", 1);
        stack.push_frame();
        stack.push_frame();
        assert_eq!(stack.get("k"), Some(&Value::Int(1)));
        assert_eq!(stack.get_str("k"), Some("1".to_string()));
    }

    #[test]
    fn test_writes_only_touch_current_frame() {
        let mut stack = VariableScopeStack::new();
        stack.put("k", 1);
        stack.push_frame();
        stack.put("k", 2);
        assert_eq!(stack.remove("k"), Some(Value::Int(2)));

        // Outer value becomes visible again
        assert_eq!(stack.get("k"), Some(&Value::Int(1)));
        assert_eq!(stack.remove("k"), None);
        assert_eq!(stack.frame(0).and_then(|f| f.get("k")), Some(&Value::Int(1)));
    }

    #[test]
    fn test_merge_overwrites_and_adds() {
        let mut stack = VariableScopeStack::new();
        stack.put("x", 1);
        stack.push_frame();
        stack.put("x", 2);
        stack.put("y", 5);

        let frame = stack.pop_frame().unwrap();
        stack.merge_into_current(frame);

        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.get("x"), Some(&Value::Int(2)));
        assert_eq!(stack.get("y"), Some(&Value::Int(5)));
        assert_eq!(stack.get(SCOPE_DEPTH_KEY), Some(&Value::from("0")));
    }

    #[test]
    fn test_merge_disjoint_equals_direct_put() {
        let mut merged = VariableScopeStack::new();
        merged.put("a", 1);
        merged.push_frame();
        merged.put("b", 2);
        let frame = merged.pop_frame().unwrap();
        merged.merge_into_current(frame);

        let mut direct = VariableScopeStack::new();
        direct.put("a", 1);
        direct.put("b", 2);

        assert_eq!(merged.flatten(), direct.flatten());
    }

    #[test]
    fn test_flatten_matches_get() {
        let mut stack = VariableScopeStack::new();
        stack.put_all([("a", 1), ("b", 1), ("c", 1)]);
        stack.push_frame();
        stack.put("b", 2);
        stack.put("d", Value::Null);
        stack.push_frame();
        stack.put("c", 3);
        stack.put("a", Value::Null);

        let flat = stack.flatten();
        for (key, value) in flat.entries() {
            assert_eq!(stack.get(key), Some(value), "key {key}");
        }
        for key in ["a", "b", "c", "d"] {
            assert_eq!(flat.get(key), stack.get(key), "key {key}");
        }
    }

    #[test]
    fn test_flatten_takes_innermost_depth() {
        let mut stack = VariableScopeStack::new();
        assert_eq!(stack.flatten().depth(), 0);

        stack.push_frame();
        stack.push_frame();
        let flat = stack.flatten();
        assert_eq!(flat.depth(), 2);
        assert_eq!(flat.get(SCOPE_DEPTH_KEY), Some(&Value::from("2")));
        assert_eq!(flat, *stack.current());
    }

    #[test]
    fn test_flatten_is_independent() {
        let mut stack = VariableScopeStack::new();
        stack.put("a", 1);
        let flat = stack.flatten();
        stack.put("a", 2);
        assert_eq!(flat.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_preload_copies_known_properties() {
        let properties = HashMap::from([
            ("START.MS".to_string(), "1700000000000".to_string()),
            ("unrelated".to_string(), "x".to_string()),
        ]);
        let stack = VariableScopeStack::with_preload(&properties);
        assert_eq!(stack.get("START.MS"), Some(&Value::from("1700000000000")));
        assert_eq!(stack.get("START.YMD"), None);
        assert_eq!(stack.get("unrelated"), None);
    }

    #[test]
    fn test_iteration_counter_is_independent_of_depth() {
        let mut stack = VariableScopeStack::new();
        stack.push_frame();
        stack.advance_iteration();
        stack.advance_iteration();
        stack.pop_frame().unwrap();
        assert_eq!(stack.current_iteration(), 2);
    }
}
