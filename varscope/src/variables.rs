//! Per-actor variable storage.
//!
//! Variables live in a stack of [`VariableFrame`]s owned by a single actor.
//! A frame records what changed at one scope level, not what is visible
//! there. Visibility is computed by [`VariableScopeStack`], which layers the
//! frames from the innermost scope outwards.

pub mod frame;
pub mod stack;

pub use frame::VariableFrame;
pub use stack::VariableScopeStack;

/// Reserved entry recording the depth at which a frame was pushed.
pub const SCOPE_DEPTH_KEY: &str = "__varscope_depth";

/// Property names copied into the base frame when an actor starts.
pub const PRELOAD_PROPERTIES: [&str; 4] = ["START.MS", "START.YMD", "START.HMS", "TESTSTART.MS"];
