pub mod aggregation;
pub mod event_parsing;
