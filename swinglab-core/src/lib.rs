//! SwingLab Core: price series, smoothing, and the position state machine.
//!
//! This crate contains the strategy engine shared by every execution context:
//! - Domain types (price samples and series, parameters, positions)
//! - Causal EMA smoothing with gap handling
//! - Entry screening on the first smoothed price
//! - Exit triggers in fixed priority order and the OPEN -> CLOSED transition
//! - Batch replay of one archived series
//! - Parsing of archived series documents and live feed lines

pub mod data;
pub mod domain;
pub mod smoothing;
pub mod strategy;
