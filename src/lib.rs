pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod portfolio;
pub mod records;
pub mod scoring;
pub mod simulation;
pub mod stats;
pub mod types;
