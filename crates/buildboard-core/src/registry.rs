//! Registry of live executions.
//!
//! The registry is the only owner of execution state. It is mutated by the
//! stream controller, one frame at a time, and wiped whenever a connection is
//! (re)established.

use indexmap::IndexMap;

use crate::model::Execution;
use crate::protocol::SlotRecord;

#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    /// Executions in creation order.
    executions: IndexMap<String, Execution>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an execution unless one with the same id already exists.
    ///
    /// Returns true if a new execution was created.
    pub fn create(&mut self, id: &str, title: &str) -> bool {
        if self.executions.contains_key(id) {
            return false;
        }
        self.executions
            .insert(id.to_string(), Execution::new(id, title));
        true
    }

    /// Removes an execution. Unknown ids are a no-op.
    pub fn destroy(&mut self, id: &str) -> bool {
        self.executions.shift_remove(id).is_some()
    }

    /// Appends a log line. Returns false if the execution is unknown.
    pub fn push_log(&mut self, id: &str, level: char, message: &str) -> bool {
        match self.executions.get_mut(id) {
            Some(execution) => {
                execution.push_log(level, message);
                true
            }
            None => false,
        }
    }

    /// Applies decoded slot records. Returns false if the execution is unknown.
    pub fn apply_update(&mut self, id: &str, records: Vec<SlotRecord>) -> bool {
        match self.executions.get_mut(id) {
            Some(execution) => {
                execution.apply_update(records);
                true
            }
            None => false,
        }
    }

    /// Drops every execution, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.executions.len();
        self.executions.clear();
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.executions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Execution> {
        self.executions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Execution> {
        self.executions.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.executions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}
