//! Deterministic tray weighing and box matching.
//!
//! Trays receive reproducible pseudo-random weights; solving groups them into
//! a bounded number of non-overlapping boxes whose totals land within a
//! tolerance of a target weight.
//!
//! - `settings`: resolution of raw input into canonical `Settings`
//! - `generator`: seeded xorshift32 weight generation
//! - `model`: trays, membership masks, candidates and boxes
//! - `optimizer`: subset enumeration, ranking and greedy selection
//! - `config` and `api`: environment configuration and the HTTP surface

pub mod api;
pub mod config;
pub mod generator;
pub mod model;
pub mod optimizer;
pub mod settings;
