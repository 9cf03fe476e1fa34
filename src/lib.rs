pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod seed;
pub mod server;
pub mod storage;

// Application use cases and the adapters behind their ports
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub mod observability;
