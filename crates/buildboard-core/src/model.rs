//! Execution and slot state held by the registry.

use chrono::{DateTime, Local};
use indexmap::IndexMap;

use crate::protocol::{Operation, SlotRecord, Tag};

/// Log lines kept per execution; older lines are dropped first.
pub const MAX_LOG_LINES: usize = 500;

/// A tracked build/job run.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub title: String,
    /// Slots in order of first appearance.
    slots: IndexMap<String, Slot>,
    logs: Vec<LogEntry>,
}

impl Execution {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            slots: IndexMap::new(),
            logs: Vec::new(),
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn push_log(&mut self, level: char, message: impl Into<String>) {
        self.logs.push(LogEntry {
            level: LogLevel::from_char(level),
            message: message.into(),
            received_at: Local::now(),
        });
        if self.logs.len() > MAX_LOG_LINES {
            let excess = self.logs.len() - MAX_LOG_LINES;
            self.logs.drain(..excess);
        }
    }

    /// Applies one decoded `execution_update` payload.
    ///
    /// A slot seen for the first time is created with the title and
    /// classification from its first record; those stay fixed afterwards.
    /// The operation is always overwritten.
    pub fn apply_update(&mut self, records: Vec<SlotRecord>) {
        for record in records {
            let SlotRecord {
                id,
                title,
                mode,
                status,
                run_state,
                operation,
            } = record;
            let slot = self
                .slots
                .entry(id.0)
                .or_insert_with_key(|key| Slot {
                    id: key.clone(),
                    title: title.0,
                    mode,
                    status,
                    run_state,
                    operation: None,
                });
            slot.operation = operation;
        }
    }
}

/// Per-slot cell holding the latest operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: String,
    pub title: String,
    pub mode: Tag,
    pub status: Tag,
    pub run_state: Tag,
    pub operation: Option<Operation>,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub received_at: DateTime<Local>,
}

/// Severity of an execution log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    /// Unrecognized level character, kept verbatim.
    Other(char),
}

impl LogLevel {
    pub fn from_char(level: char) -> Self {
        match level.to_ascii_uppercase() {
            'D' => LogLevel::Debug,
            'I' => LogLevel::Info,
            'W' => LogLevel::Warning,
            'E' => LogLevel::Error,
            _ => LogLevel::Other(level),
        }
    }

    /// Single-character marker shown in front of the message.
    pub fn marker(self) -> char {
        match self {
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warning => 'W',
            LogLevel::Error => 'E',
            LogLevel::Other(c) => c,
        }
    }
}
