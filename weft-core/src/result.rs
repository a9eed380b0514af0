//! Per-package execution records and their batch aggregate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one command run against one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
    /// Never started because an earlier failure stopped scheduling.
    Skipped,
    /// Never started because the run was cancelled from outside.
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one command run against one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub package: String,
    /// Position of the package in the sequence handed to the engine.
    pub index: usize,
    pub status: ExecutionStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub error: Option<String>,
    pub command: String,
}

impl ExecutionResult {
    pub(crate) fn not_started(
        package: impl Into<String>,
        index: usize,
        command: impl Into<String>,
        status: ExecutionStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            index,
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            error: Some(reason.into()),
            command: command.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        self.status == ExecutionStatus::Failure
    }
}

/// Results of one engine run, in completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<ExecutionResult>,
    pub duration: Duration,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, result: ExecutionResult) {
        self.results.push(result);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `true` when every result succeeded or was skipped.
    pub fn all_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.status, ExecutionStatus::Success | ExecutionStatus::Skipped))
    }

    pub fn any_failure(&self) -> bool {
        self.results.iter().any(ExecutionResult::is_failure)
    }

    fn count(&self, status: ExecutionStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(ExecutionStatus::Success)
    }

    pub fn failure_count(&self) -> usize {
        self.count(ExecutionStatus::Failure)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(ExecutionStatus::Skipped)
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(ExecutionStatus::Cancelled)
    }

    fn names(&self, status: ExecutionStatus) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.package.clone())
            .collect()
    }

    pub fn failed_packages(&self) -> Vec<String> {
        self.names(ExecutionStatus::Failure)
    }

    pub fn successful_packages(&self) -> Vec<String> {
        self.names(ExecutionStatus::Success)
    }

    pub fn skipped_packages(&self) -> Vec<String> {
        self.names(ExecutionStatus::Skipped)
    }

    /// Looks up the result recorded for a package.
    pub fn get(&self, package: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.package == package)
    }

    /// Results in submission order.
    pub fn sorted_by_index(&self) -> Vec<&ExecutionResult> {
        let mut sorted: Vec<&ExecutionResult> = self.results.iter().collect();
        sorted.sort_by_key(|r| r.index);
        sorted
    }

    /// Process exit status for this batch: 0 on overall success, else 1.
    pub fn exit_code(&self) -> i32 {
        if self.all_success() {
            0
        } else {
            1
        }
    }
}
