//! Top-level facade crate for pulsemeter.
//!
//! Re-exports the metric core and the agent library so users can depend on a single crate.

pub mod core {
    pub use pulsemeter_core::*;
}

pub mod agent {
    pub use pulsemeter_agent::*;
}
