#![recursion_limit = "256"]

//! Iteration-indexed training harness on burn: a perpetual batch
//! source, a generic trainer with `step` / `after_validation`,
//! best-metric checkpointing and plateau learning-rate decay.

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
