//! # Spawner Plugin for the Pulsar Game Server
//!
//! This crate derives each player's effective ship configuration from their
//! equipped items and plugin-contributed rules, delivers it to the client
//! asynchronously, and gates ship/frequency changes on that delivery being
//! acknowledged.
//!
//! ## Overview
//!
//! For every managed player the spawner maintains:
//! - **Setting overrides**: per-client values layered over the arena
//!   defaults, resolved from item properties and registered callbacks
//! - **Spawn prizes**: consumable counts granted on every respawn
//! - **A delivery state machine**: at most one settings packet in flight
//!   per player, with newer requests chained behind it
//! - **A pending loadout switch**: applied atomically the moment a
//!   ship/frequency change is finally granted
//!
//! ## The deny-now, apply-later gate
//!
//! Ship and frequency changes are intercepted rather than allowed: an
//! admissible committing request enqueues a compilation, and the change
//! itself is performed only after the client acknowledges the matching
//! settings packet. The client therefore never plays a ship whose
//! configuration it has not received, at the cost of the visible change
//! lagging one round trip.
//!
//! ## Thread Safety
//!
//! Host callbacks arrive from network, timer, and command threads with no
//! serialization. Per-player state lives in a `DashMap` with short critical
//! sections; callback registries are snapshotted before execution so
//! resolvers can re-enter the spawner freely.
//!
//! ## Module Organization
//!
//! - [`registry`] - The catalogue of overridable settings
//! - [`callbacks`] - Override/prize resolver chains
//! - [`compile`] - Compilation queue and acknowledgment state machine
//! - [`gate`] - Ship/frequency admission control
//! - [`loadout`] - Pending loadout-set switches
//! - [`events`] - Overrides-requested/received notifications
//! - [`state`] - Per-player spawn state

use dashmap::DashMap;
use pulsar_services::{
    ArenaConfig, ArenaId, ArenaScope, GameService, HullId, ItemStore, PlayerId, PrizeCode,
    PrizeDistributor, SettingsClient, ShipChangeEnforcer,
};
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info};

pub mod callbacks;
pub mod compile;
pub mod error;
pub mod events;
pub mod gate;
pub mod loadout;
pub mod registry;
pub mod state;

mod resolve;
#[cfg(test)]
mod tests;

pub use callbacks::{OverrideContext, OverrideResolver, PrizeContext, PrizeResolver};
pub use error::SpawnerError;
pub use events::{OverridesReceivedEvent, OverridesRequestedEvent, SpawnListener};
pub use gate::{DenyReason, ShipChangeVerdict};
pub use loadout::LoadoutSwitchOutcome;
pub use registry::{OverrideRegistry, SettingDescriptor};
pub use state::{CompileRequest, DeliveryPhase};

use callbacks::{read_lock, write_lock, CallbackRegistry};
use pulsar_services::{ItemDef, PRIZE_COUNT};
use state::PlayerSpawnState;

/// Bucket count for the override-callback table; sized at roughly
/// three-quarters of the number of overridden settings.
const OVERRIDE_CALLBACK_BUCKETS: usize = 75;

/// The host services the spawner consumes.
///
/// Bundled into one struct so construction sites read as a manifest of the
/// spawner's external dependencies.
#[derive(Clone)]
pub struct HostServices {
    pub items: Arc<dyn ItemStore>,
    pub client: Arc<dyn SettingsClient>,
    pub config: Arc<dyn ArenaConfig>,
    pub game: Arc<dyn GameService>,
    pub prizes: Arc<dyn PrizeDistributor>,
}

/// The spawner subsystem instance.
///
/// Created once at plugin load and shared as an `Arc`; all state is
/// instance-owned and torn down with it. See the crate docs for the overall
/// data flow.
pub struct Spawner {
    registry: OverrideRegistry,
    override_callbacks: CallbackRegistry<dyn OverrideResolver>,
    prize_callbacks: CallbackRegistry<dyn PrizeResolver>,
    players: DashMap<PlayerId, PlayerSpawnState>,
    listeners: RwLock<Vec<(ArenaScope, Arc<dyn SpawnListener>)>>,
    enforcers: RwLock<Vec<Arc<dyn ShipChangeEnforcer>>>,
    items: Arc<dyn ItemStore>,
    client: Arc<dyn SettingsClient>,
    config: Arc<dyn ArenaConfig>,
    game: Arc<dyn GameService>,
    distributor: Arc<dyn PrizeDistributor>,
    handle: Handle,
}

impl Spawner {
    /// Builds a spawner over the given host services.
    ///
    /// Resolves the override registry against the settings channel
    /// immediately; settings that cannot be overridden are logged and
    /// skipped. `handle` is the runtime used for delivery tasks.
    pub fn new(services: HostServices, handle: Handle) -> Arc<Self> {
        let registry = OverrideRegistry::build(services.client.as_ref());
        info!(settings = registry.len(), "spawner initialized");

        Arc::new(Self {
            registry,
            override_callbacks: CallbackRegistry::new(OVERRIDE_CALLBACK_BUCKETS),
            prize_callbacks: CallbackRegistry::new(PRIZE_COUNT),
            players: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            enforcers: RwLock::new(Vec::new()),
            items: services.items,
            client: services.client,
            config: services.config,
            game: services.game,
            distributor: services.prizes,
            handle,
        })
    }

    /// The registered override catalogue.
    pub fn registry(&self) -> &OverrideRegistry {
        &self.registry
    }

    // ========================================================================
    // Exposed interface
    // ========================================================================

    /// Whether the player's settings are currently managed by this spawner.
    pub fn is_managed(&self, player: PlayerId) -> bool {
        self.players.get(&player).map(|state| state.managed).unwrap_or(false)
    }

    /// The player's current position in the delivery state machine.
    pub fn delivery_phase(&self, player: PlayerId) -> Option<DeliveryPhase> {
        self.players.get(&player).map(|state| state.phase)
    }

    /// Recompiles and resends settings for a managed, in-ship player.
    /// Returns false (and does nothing) for spectators and unmanaged
    /// players.
    pub fn recompile_and_resend(self: &Arc<Self>, player: PlayerId) -> bool {
        if !self.is_managed(player) {
            return false;
        }
        let Some(ship) = self.game.ship(player) else {
            return false;
        };

        let hull = self.items.current_hull(player);
        let baseline = self.players.get(&player).map(|state| state.prizes);
        match CompileRequest::new(hull, self.game.freq(player), ship, baseline) {
            Ok(request) => self.enqueue_compile(player, request),
            Err(_) => false,
        }
    }

    /// The player's current effective value for a setting: the applied
    /// override when one exists, otherwise the arena configuration value.
    /// Unmanaged players always resolve to `default`.
    pub fn get_effective_value(
        &self,
        player: PlayerId,
        section: &str,
        setting: &str,
        default: i32,
    ) -> i32 {
        let Some(key) = self.client.override_key(section, setting) else {
            return default;
        };
        if !self.is_managed(player) {
            return default;
        }
        if let Some(value) = self.client.applied_override(player, key) {
            return value;
        }
        match self.game.arena(player) {
            Some(arena) => self.config.get_int(arena, section, setting, default),
            None => default,
        }
    }

    // ========================================================================
    // Callback registration
    // ========================================================================

    /// Registers a setting-override resolver for one setting. Fails when
    /// the setting has no override key.
    pub fn register_override_callback(
        &self,
        callback: Arc<dyn OverrideResolver>,
        scope: ArenaScope,
        section: &str,
        setting: &str,
    ) -> Result<(), SpawnerError> {
        let key = self.client.override_key(section, setting).ok_or_else(|| {
            SpawnerError::UnknownSetting { section: section.into(), setting: setting.into() }
        })?;
        self.override_callbacks.register(key.0, scope, callback);
        Ok(())
    }

    /// Deregisters a previously registered override resolver, returning
    /// the number of registrations removed.
    pub fn deregister_override_callback(
        &self,
        callback: &Arc<dyn OverrideResolver>,
        scope: ArenaScope,
        section: &str,
        setting: &str,
    ) -> usize {
        match self.client.override_key(section, setting) {
            Some(key) => self.override_callbacks.deregister(key.0, scope, callback),
            None => 0,
        }
    }

    /// Registers a prize-count resolver for one prize.
    pub fn register_prize_callback(
        &self,
        callback: Arc<dyn PrizeResolver>,
        scope: ArenaScope,
        prize: PrizeCode,
    ) {
        self.prize_callbacks.register(prize.code() as u32, scope, callback);
    }

    /// Deregisters a previously registered prize resolver, returning the
    /// number of registrations removed.
    pub fn deregister_prize_callback(
        &self,
        callback: &Arc<dyn PrizeResolver>,
        scope: ArenaScope,
        prize: PrizeCode,
    ) -> usize {
        self.prize_callbacks.deregister(prize.code() as u32, scope, callback)
    }

    // ========================================================================
    // Listeners & enforcers
    // ========================================================================

    /// Registers an overrides lifecycle listener.
    pub fn register_listener(&self, scope: ArenaScope, listener: Arc<dyn SpawnListener>) {
        write_lock(&self.listeners).push((scope, listener));
    }

    /// Deregisters a listener, returning the number of registrations
    /// removed.
    pub fn deregister_listener(&self, scope: ArenaScope, listener: &Arc<dyn SpawnListener>) -> usize {
        let mut listeners = write_lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(entry_scope, entry)| {
            !(*entry_scope == scope && Arc::ptr_eq(entry, listener))
        });
        before - listeners.len()
    }

    /// Registers an additional admission-control enforcer consulted before
    /// this spawner commits a ship or frequency change.
    pub fn register_enforcer(&self, enforcer: Arc<dyn ShipChangeEnforcer>) {
        write_lock(&self.enforcers).push(enforcer);
    }

    /// Deregisters an enforcer, returning the number of registrations
    /// removed.
    pub fn deregister_enforcer(&self, enforcer: &Arc<dyn ShipChangeEnforcer>) -> usize {
        let mut enforcers = write_lock(&self.enforcers);
        let before = enforcers.len();
        enforcers.retain(|entry| !Arc::ptr_eq(entry, enforcer));
        before - enforcers.len()
    }

    pub(crate) fn notify_requested(&self, arena: ArenaId, event: &OverridesRequestedEvent) {
        let listeners: Vec<_> = read_lock(&self.listeners)
            .iter()
            .filter(|(scope, _)| scope.applies_to(arena))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.overrides_requested(event);
        }
    }

    pub(crate) fn notify_received(&self, arena: ArenaId, event: &OverridesReceivedEvent) {
        let listeners: Vec<_> = read_lock(&self.listeners)
            .iter()
            .filter(|(scope, _)| scope.applies_to(arena))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.overrides_received(event);
        }
    }

    // ========================================================================
    // Host event entry points
    // ========================================================================

    /// Begins managing every player already in `arena` and compiles
    /// settings for those currently in ships.
    pub fn attach(self: &Arc<Self>, arena: ArenaId) {
        info!(%arena, "spawner attaching to arena");

        for player in self.game.players_in(arena) {
            self.players.insert(player, PlayerSpawnState::new());
            self.compile_current_ship(player, None);
        }
    }

    /// Stops managing every player in `arena`, reverting their overrides
    /// and discarding all queued work.
    pub fn detach(&self, arena: ArenaId) {
        info!(%arena, "spawner detaching from arena");

        for player in self.game.players_in(arena) {
            self.unmanage(player);
        }
    }

    /// A player entered a managed arena. Overrides are compiled once they
    /// enter a ship; until then only the state shell exists.
    pub fn on_player_enter(&self, player: PlayerId) {
        debug!(%player, "managing player");
        self.players.insert(player, PlayerSpawnState::new());
    }

    /// A player left a managed arena: revert everything.
    pub fn on_player_leave(&self, player: PlayerId) {
        debug!(%player, "unmanaging player");
        self.unmanage(player);
    }

    /// A managed player spawned (initial entry, respawn, or ship reset):
    /// replay the last-resolved prize snapshot.
    pub fn on_player_spawn(&self, player: PlayerId) {
        self.grant_spawn_prizes(player);
    }

    /// An item count changed on one of the player's hulls. Recompiles when
    /// the change affects the hull they are flying and the item requires a
    /// settings resend.
    pub fn on_item_count_changed(
        self: &Arc<Self>,
        player: PlayerId,
        hull: HullId,
        item: &ItemDef,
        new_count: u32,
        old_count: u32,
    ) {
        if new_count == old_count || !item.resend_sets {
            return;
        }
        if self.items.current_hull(player) != Some(hull) {
            return;
        }
        let Some(ship) = self.game.ship(player) else {
            return;
        };

        debug!(%player, item = %item.name, new_count, old_count, "item change triggers recompile");

        let baseline = self.players.get(&player).map(|state| state.prizes);
        if let Ok(request) = CompileRequest::new(Some(hull), self.game.freq(player), ship, baseline)
        {
            self.enqueue_compile(player, request);
        }
    }

    /// The item database was reloaded: recompile every managed in-ship
    /// player against the new definitions.
    pub fn on_items_reloaded(self: &Arc<Self>) {
        let managed: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|entry| entry.value().managed)
            .map(|entry| *entry.key())
            .collect();

        info!(players = managed.len(), "items reloaded; recompiling managed players");

        for player in managed {
            let baseline = self.players.get(&player).map(|state| state.prizes);
            self.compile_current_ship(player, baseline);
        }
    }

    /// Compiles for the player's current ship and hull, if they are in a
    /// ship they own. Used by attach and item-reload handling.
    fn compile_current_ship(
        self: &Arc<Self>,
        player: PlayerId,
        baseline: Option<[u8; PRIZE_COUNT]>,
    ) {
        let Some(ship) = self.game.ship(player) else {
            return;
        };
        let Some(hull) = self.items.current_hull(player) else {
            return;
        };
        if let Ok(request) = CompileRequest::new(Some(hull), self.game.freq(player), ship, baseline)
        {
            self.enqueue_compile(player, request);
        }
    }

    fn unmanage(&self, player: PlayerId) {
        if let Some(mut state) = self.players.get_mut(&player) {
            state.managed = false;
        }
        self.revert_player(player);
        self.players.remove(&player);
    }
}
