//! Mutable variable store threaded through a whole run.
//!
//! One [`Environment`] is created per invocation, seeded from
//! command-line `key=value` arguments, extended by each case's
//! globals, and mutated by `setenv` extraction rules. It persists
//! across all steps of a case and across case files.

use serde_json::Value;
use std::collections::HashMap;

/// Reserved counter: number of executed steps, incremented once
/// per step regardless of repetitions.
pub const STEP_COUNTER: &str = "$step";
/// Reserved counter: the current step's declared repeat count.
pub const REPEAT_COUNTER: &str = "$repeat";
/// Reserved counter: the current repetition index, `0..repeat`.
pub const ITERATION_COUNTER: &str = "$count";

/// Key→value mapping used for template resolution and cross-step
/// data passing. There is no removal operation.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Add every entry of `defaults` whose key is not already
    /// present. Existing keys are never overwritten, so values
    /// seeded earlier (e.g. from the command line) win over a
    /// case's declared globals.
    pub fn merge(&mut self, defaults: &HashMap<String, Value>) {
        for (key, value) in defaults {
            self.vars
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn vars(&self) -> &HashMap<String, Value> {
        &self.vars
    }
}
