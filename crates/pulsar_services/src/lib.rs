//! # Pulsar Host Services
//!
//! This crate defines the shared vocabulary of the Pulsar game server: the
//! identifier types used across all plugins, and the narrow service
//! interfaces through which plugins consume host functionality (item
//! inventories, per-client settings delivery, arena configuration, prize
//! granting, and the game directory).
//!
//! Plugins receive these services as `Arc<dyn _>` handles at construction
//! time and never reach around them. Keeping the interfaces this small is
//! deliberate: a plugin that only sees `ItemStore` and `SettingsClient`
//! cannot grow accidental dependencies on host internals, and every service
//! can be swapped for an in-memory double in tests.
//!
//! ## Module Organization
//!
//! - [`types`] - Identifier and value types (players, arenas, ships, prizes)
//! - [`services`] - The host service traits plugins program against
//! - [`items`] - An in-memory [`ItemStore`] for tests and host-less runs
//! - [`config`] - A TOML-backed [`ArenaConfig`] implementation
//! - [`error`] - Error types shared by service implementations

pub mod config;
pub mod error;
pub mod items;
pub mod services;
pub mod types;

pub use config::TomlArenaConfig;
pub use error::{DeliveryError, ServiceError};
pub use items::{EquippedItem, ItemDef, ItemProperty, MemoryItemStore};
pub use services::{
    ArenaConfig, EnforcerVerdict, GameService, ItemStore, PrizeDistributor, SettingKey,
    SettingsClient, ShipChangeEnforcer,
};
pub use types::{
    ArenaId, ArenaScope, Freq, HullId, PlayerId, PrizeCode, ShipClass, ShipMask,
    LOADOUT_SET_COUNT, MAX_FREQ, PRIZE_COUNT,
};

// Re-exported so dependent crates use the same async-trait version for
// service implementations.
pub use async_trait::async_trait;
