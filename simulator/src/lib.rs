pub mod config;
pub mod consumer;
pub mod counters;
pub mod feed;
pub mod pipeline;
pub mod reporter;
pub mod sink;
pub mod types;

pub mod error;
