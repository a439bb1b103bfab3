//! Gatecrash - web session hijack and authorization bypass probing
//!
//! The engine imports or establishes a session artifact, probes
//! candidate privileged endpoints through it with soft-404 aware
//! classification, and replays forged tokens or performs a privileged
//! action against whatever it reached.

pub mod app;
pub mod attack;
pub mod combinators;
pub mod engine;
pub mod error;
pub mod forge;
pub mod http;
pub mod hunter;
pub mod prober;
pub mod reporting;
pub mod session;
pub mod target;

pub use engine::Engine;
pub use error::*;
