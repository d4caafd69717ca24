//! # Métricas
//! src/metrics/mod.rs
//!
//! Contadores de la sesión actual: requests por código de estado,
//! conexiones fallidas y latencias (p50, p95, p99).

pub mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};
