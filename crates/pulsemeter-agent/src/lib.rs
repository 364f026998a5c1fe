//! pulsemeter agent library entry.
//!
//! This crate wires the metric registry from `pulsemeter-core` to the system
//! samplers, the anomaly simulator, the request and business hooks, and the
//! operational HTTP surface. It is consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod samplers;
pub mod simulator;
