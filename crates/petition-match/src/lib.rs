//! Explainable matching of applicant profiles against immigration petition definitions.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
