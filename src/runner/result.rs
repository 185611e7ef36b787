use std::fmt;

use serde::{Deserialize, Serialize};

/// The outcome the engine reports for a finished node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Successful,
    /// An assumption did not hold; the node neither passed nor failed.
    Aborted,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Successful => write!(f, "successful"),
            Self::Aborted => write!(f, "aborted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What made a node fail or abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub message: String,
    /// Stack trace or other diagnostic text, if the engine captured any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FailureCause {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_owned());
        self
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Result of executing one node of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExecutionResult {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,
}

impl TestExecutionResult {
    pub fn successful() -> Self {
        Self {
            status: ExecutionStatus::Successful,
            cause: None,
        }
    }

    pub fn aborted(cause: FailureCause) -> Self {
        Self {
            status: ExecutionStatus::Aborted,
            cause: Some(cause),
        }
    }

    pub fn failed(cause: FailureCause) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            cause: Some(cause),
        }
    }
}
