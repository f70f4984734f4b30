//! Error types for plan execution.

use thiserror::Error;

use crate::plan::PlanParseError;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The plan failed structural validation.
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanParseError),

    /// Some steps can never become ready: a cycle, or a dependency on a
    /// step id the plan does not contain.
    #[error("circular or unsatisfied dependencies among steps: {}", remaining.join(", "))]
    CircularOrUnsatisfiedDependency { remaining: Vec<String> },

    /// A step names a tool that is not registered.
    #[error("step '{step_id}' uses unknown tool '{tool}'")]
    UnknownTool { step_id: String, tool: String },

    /// A tool returned an error.
    #[error("step '{step_id}' failed in tool '{tool}': {source:#}")]
    ToolExecution {
        step_id: String,
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    /// The cancellation token fired between ready sets.
    #[error("run cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Step the failure is attributed to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::UnknownTool { step_id, .. } | Self::ToolExecution { step_id, .. } => {
                Some(step_id)
            }
            _ => None,
        }
    }

    /// Tool the failure is attributed to, if any.
    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::UnknownTool { tool, .. } | Self::ToolExecution { tool, .. } => Some(tool),
            _ => None,
        }
    }
}
