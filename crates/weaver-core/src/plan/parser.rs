//! Plan JSON parser with validation.
//!
//! Validates that:
//! - step ids are non-empty and unique;
//! - every step's `inputs` is a JSON object.
//!
//! Dependencies on unknown ids and cycles are left to the executor, which
//! reports them as unsatisfied before running any affected step.

use std::collections::HashSet;

use thiserror::Error;

use super::types::Plan;

/// Errors that can occur during plan parsing and validation.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("plan JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("step #{index} has an empty id")]
    EmptyStepId { index: usize },

    #[error("duplicate step id: {0:?}")]
    DuplicateStepId(String),

    #[error("inputs of step {step:?} must be a JSON object")]
    InputsNotObject { step: String },
}

/// Parse and validate a plan document.
pub fn parse_plan_json(content: &str) -> Result<Plan, PlanParseError> {
    let plan: Plan = serde_json::from_str(content)?;
    validate(&plan)?;
    Ok(plan)
}

/// Check the structural rules of an already-decoded plan.
pub fn validate(plan: &Plan) -> Result<(), PlanParseError> {
    let mut seen = HashSet::new();
    for (index, step) in plan.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            return Err(PlanParseError::EmptyStepId { index });
        }
        if !seen.insert(step.id.as_str()) {
            return Err(PlanParseError::DuplicateStepId(step.id.clone()));
        }
        if !step.inputs.is_object() {
            return Err(PlanParseError::InputsNotObject {
                step: step.id.clone(),
            });
        }
    }
    Ok(())
}
