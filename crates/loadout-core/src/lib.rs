//! Loadout decision engine: scheduler, scoring, candidate search, anti-thrash
//! registries and the per-agent decision loop.

pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod locator;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod scoring;

pub use config::{default_config_toml, EngineConfig};
pub use engine::{Engine, EngineStats};
pub use error::{ConfigError, EngineError};
pub use host::{HostCapabilities, HostError, HostWorld};
pub use model::{
    Activity, AgentTrait, AgentView, ArchetypeStats, ContainerKind, Duty, ItemView, Position, Quality, Skills,
};
pub use orchestrator::{Decision, SkipReason};
pub use scheduler::{EventKind, TickScheduler};
pub use scoring::{Score, Scorer};
