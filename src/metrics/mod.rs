//! Metrics collection for the session layer.
//!
//! This module provides centralized metrics recording

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
