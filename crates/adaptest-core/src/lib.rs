//! adaptest-core: adaptive placement-testing engine.
//!
//! Estimates per-topic ability under a four-parameter logistic model,
//! selects the next item with content balancing, and decides when a
//! placement test has measured enough. Catalog parsing, reports and
//! Monte Carlo simulation build on the same session loop.

pub mod config;
pub mod error;
pub mod estimator;
pub mod irt;
pub mod mastery;
pub mod model;
pub mod optimize;
pub mod parser;
pub mod pathway;
pub mod report;
pub mod selector;
pub mod session;
pub mod simulation;
pub mod termination;
