//! Application configuration

mod config;

pub use config::{AttackConfig, Config, ForgeConfig, MarkersConfig, ProberConfig, SessionConfig};
