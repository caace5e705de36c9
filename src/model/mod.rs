//! Domain models
//!
//! Event and series structs are consolidated in models.rs.

mod models;

pub use models::*;
