//! Raw SQL query functions, one module per table.

pub mod nodes;
pub mod projects;
