//! PostgreSQL persistence for weaver: schema migrations, connection
//! configuration, row models, and raw query functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
