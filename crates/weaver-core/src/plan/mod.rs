//! Plan model, parser and input resolver.

pub mod parser;
pub mod reference;
pub mod types;

pub use parser::{PlanParseError, parse_plan_json};
pub use reference::{Reference, referenced_steps, resolve_inputs};
pub use types::{Plan, PlanStep};
