//! Metrics export for finished checks.
//!
//! # Submodules
//!
//! - `prom` - Prometheus Push Gateway integration

pub mod prom;
