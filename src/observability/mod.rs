// Observability: metrics exported for Prometheus scraping

pub mod metrics;

pub use metrics::{init, render};
