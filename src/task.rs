use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type TaskId = i64;

pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub done: bool,
    pub priority: Priority,
    pub due_date: Option<String>,
}

impl Task {
    /// True when the task is open and its due date parses and lies before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.done {
            return false;
        }
        self.due_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, DUE_DATE_FORMAT).ok())
            .is_some_and(|due| due < today)
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid priority '{0}' (expected low, medium or high)")]
pub struct InvalidPriority(pub String);

impl FromStr for Priority {
    type Err = InvalidPriority;

    /// Exact, case-sensitive match: stored payloads only ever carry the lowercase names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(InvalidPriority(other.to_string())),
        }
    }
}

/// Input for `TaskStore::add`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    pub text: String,
    pub priority: Priority,
    pub due_date: Option<String>,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due_date(mut self, due_date: Option<String>) -> Self {
        self.due_date = normalize_due_date(due_date);
        self
    }
}

impl From<&str> for NewTask {
    fn from(text: &str) -> Self {
        NewTask::new(text)
    }
}

impl From<String> for NewTask {
    fn from(text: String) -> Self {
        NewTask::new(text)
    }
}

/// Empty due dates mean "unset".
pub fn normalize_due_date(due_date: Option<String>) -> Option<String> {
    due_date.filter(|d| !d.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Active,
    Done,
}

impl Filter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.done,
            Filter::Done => task.done,
        }
    }
}
