//! Order-book state and per-tick trading-cost estimation for a single
//! instrument.
//!
//! Nothing in this crate performs I/O: the store is fed already-framed
//! update records and the cost model is a pure function of a snapshot and
//! the previous smoothed state.

pub mod cost;
pub mod error;
pub mod latency_window;
pub mod store;
pub mod types;
pub mod wire;
