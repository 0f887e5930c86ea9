//! # Host Service Interfaces
//!
//! The narrow traits through which plugins consume host functionality.
//! Every trait here is object-safe and `Send + Sync`; plugins hold them as
//! `Arc<dyn _>` handles received at construction time.
//!
//! ## Design Principles
//!
//! - **Minimal Interface**: each trait exposes only what consuming plugins
//!   actually need, not the host module's full surface
//! - **Type Safety**: identifiers are wrapper types, never raw integers
//! - **Async Where It Matters**: only genuinely asynchronous operations
//!   (settings delivery) are async; directory lookups stay synchronous
//!
//! ## Thread Safety
//!
//! Implementations must tolerate concurrent calls from network, timer, and
//! command-processing threads with no external serialization.

use crate::error::DeliveryError;
use crate::types::{ArenaId, Freq, HullId, PlayerId, PrizeCode, ShipClass};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque key identifying one overridable client setting.
///
/// Keys are assigned by the settings channel; a setting that the channel
/// cannot override has no key. Keys are stable for the lifetime of the
/// process and hashable, so they double as registry lookup keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettingKey(pub u32);

/// Access to player inventories: equipped items, hulls, and loadout sets.
///
/// The store owns all item data and persistence; consumers only read
/// aggregate property values and loadout structure through this interface.
pub trait ItemStore: Send + Sync {
    /// Whether the player's ship data has finished loading. Most other
    /// queries return empty defaults until this is true.
    fn ships_loaded(&self, player: PlayerId) -> bool;

    /// Sums the named property across every item equipped on `hull`,
    /// starting from `default`. An item property marked absolute replaces
    /// the running total (including the default) outright; with several
    /// absolute contributions the last equipped wins.
    fn property_sum(&self, player: PlayerId, hull: HullId, property: &str, default: i32) -> i32;

    /// The hull backing the player's current ship, if they are in a ship
    /// they own on their active loadout set.
    fn current_hull(&self, player: PlayerId) -> Option<HullId>;

    /// The hull for `ship` on the given loadout set, if owned.
    fn hull(&self, player: PlayerId, ship: ShipClass, loadout: usize) -> Option<HullId>;

    /// The player's active loadout set index.
    fn active_loadout(&self, player: PlayerId) -> usize;

    /// Switches the player's active loadout set, returning the previous
    /// index, or `None` if the player or index is unknown.
    fn set_active_loadout(&self, player: PlayerId, loadout: usize) -> Option<usize>;
}

/// The per-client settings channel.
///
/// Overrides applied here live on the connection, not in the arena config:
/// they affect a single client and vanish when cleared. Applying overrides
/// does nothing visible until [`SettingsClient::deliver`] ships the full
/// configuration packet; delivery completes asynchronously when the client
/// acknowledges it.
#[async_trait]
pub trait SettingsClient: Send + Sync {
    /// Resolves a `(section, setting)` pair to its override key, or `None`
    /// when the setting cannot be overridden per-client.
    fn override_key(&self, section: &str, setting: &str) -> Option<SettingKey>;

    /// Stages an override value for the player's next settings packet.
    fn apply_override(&self, player: PlayerId, key: SettingKey, value: i32);

    /// Removes a staged override, restoring the arena default.
    fn clear_override(&self, player: PlayerId, key: SettingKey);

    /// Reads back the currently staged override value, if any.
    fn applied_override(&self, player: PlayerId, key: SettingKey) -> Option<i32>;

    /// Delivers the configuration packet to the client. Resolves `Ok` once
    /// the client acknowledges receipt, or `Err` if delivery failed and
    /// should be retried by the caller.
    async fn deliver(&self, player: PlayerId) -> Result<(), DeliveryError>;
}

/// Read access to arena configuration.
pub trait ArenaConfig: Send + Sync {
    /// Fetches an integer setting, falling back to `default` when the
    /// section or setting is absent.
    fn get_int(&self, arena: ArenaId, section: &str, setting: &str, default: i32) -> i32;
}

/// Grants spawn consumables ("prizes") to connected players.
pub trait PrizeDistributor: Send + Sync {
    /// Gives the player `count` of the specified prize.
    fn grant(&self, player: PlayerId, prize: PrizeCode, count: u8);
}

/// Player directory and ship/frequency assignment.
///
/// Collapses the host's player-data, game, and frequency-manager modules
/// into the handful of operations settings-managing plugins need.
pub trait GameService: Send + Sync {
    /// The arena the player is currently in, if connected to one.
    fn arena(&self, player: PlayerId) -> Option<ArenaId>;

    /// The players currently in an arena.
    fn players_in(&self, arena: ArenaId) -> Vec<PlayerId>;

    /// The player's current ship, or `None` when spectating.
    fn ship(&self, player: PlayerId) -> Option<ShipClass>;

    /// The player's current team frequency.
    fn freq(&self, player: PlayerId) -> Freq;

    /// The arena's spectator frequency.
    fn spec_freq(&self, arena: ArenaId) -> Freq;

    /// Finds a joinable entry frequency for a player leaving spectator
    /// mode, or `None` when no team has room.
    fn find_entry_freq(&self, player: PlayerId) -> Option<Freq>;

    /// Places the player in the given ship on the given frequency.
    fn set_ship_and_freq(&self, player: PlayerId, ship: ShipClass, freq: Freq);
}

/// Verdict from a [`ShipChangeEnforcer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcerVerdict {
    /// The enforcer has no objection.
    Allow,
    /// The change is blocked, with a player-facing reason.
    Deny(String),
}

impl EnforcerVerdict {
    /// True for [`EnforcerVerdict::Allow`].
    pub fn is_allow(&self) -> bool {
        matches!(self, EnforcerVerdict::Allow)
    }
}

/// Admission policy for ship and frequency changes.
///
/// Plugins implementing game modes register enforcers with whatever module
/// arbitrates changes; all registered enforcers must allow a change before
/// it is committed. `committing` distinguishes a real change from a "could
/// I?" probe — enforcers must not produce side effects on probes.
pub trait ShipChangeEnforcer: Send + Sync {
    /// Whether the player may change into the requested ship.
    fn can_change_to_ship(
        &self,
        _player: PlayerId,
        _ship: ShipClass,
        _committing: bool,
    ) -> EnforcerVerdict {
        EnforcerVerdict::Allow
    }

    /// Whether the player may change onto the requested frequency.
    fn can_change_to_freq(
        &self,
        _player: PlayerId,
        _freq: Freq,
        _committing: bool,
    ) -> EnforcerVerdict {
        EnforcerVerdict::Allow
    }
}
