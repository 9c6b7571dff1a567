pub mod api;
pub mod cli;
pub mod core;
pub mod dataset;
pub mod error;
pub mod policy;
pub mod report;
pub mod simulation;
pub mod sweep;
pub mod telemetry;
