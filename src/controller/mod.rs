//! API Controller modules
//!
//! Controllers organized by data source.

pub mod history;
pub mod markets;
pub mod positions;
