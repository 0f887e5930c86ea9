//! # In-Memory Item Store
//!
//! A thread-safe [`ItemStore`] implementation backed by process memory.
//! Used by tests and host-less deployments; production servers implement
//! [`ItemStore`] over their persistent inventory database instead.
//!
//! The model mirrors the store interface's vocabulary: each player owns
//! [`LOADOUT_SET_COUNT`] alternate loadout sets, each set holds at most one
//! hull per ship class, and each hull carries an ordered list of equipped
//! items with typed properties.

use crate::services::ItemStore;
use crate::types::{HullId, PlayerId, ShipClass, LOADOUT_SET_COUNT};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One typed property contributed by an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProperty {
    /// Property name, matched case-sensitively by consumers.
    pub name: String,
    /// Contribution value.
    pub value: i32,
    /// When set, this property replaces the running total instead of
    /// adding to it; the last equipped absolute property wins.
    pub absolute: bool,
    /// When set, the property contributes `value` once regardless of how
    /// many copies of the item are equipped.
    pub ignore_count: bool,
}

impl ItemProperty {
    /// An additive, count-scaled property.
    pub fn additive(name: impl Into<String>, value: i32) -> Self {
        Self { name: name.into(), value, absolute: false, ignore_count: false }
    }

    /// An absolute property; replaces the running total outright.
    pub fn absolute(name: impl Into<String>, value: i32) -> Self {
        Self { name: name.into(), value, absolute: true, ignore_count: false }
    }
}

/// An item definition: a named bundle of properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    pub properties: Vec<ItemProperty>,
    /// Whether count changes for this item require the owner's client
    /// settings to be recompiled and resent.
    pub resend_sets: bool,
}

impl ItemDef {
    pub fn new(name: impl Into<String>, properties: Vec<ItemProperty>) -> Self {
        Self { name: name.into(), properties, resend_sets: true }
    }
}

/// One equipped stack of an item on a hull.
#[derive(Debug, Clone)]
pub struct EquippedItem {
    pub item: Arc<ItemDef>,
    pub count: u32,
}

#[derive(Debug, Clone)]
struct Hull {
    id: HullId,
    // Equip order is meaningful: the last absolute property wins.
    items: Vec<EquippedItem>,
}

#[derive(Debug, Clone, Default)]
struct LoadoutSet {
    hulls: [Option<Hull>; ShipClass::COUNT],
}

#[derive(Debug)]
struct PlayerItems {
    loaded: bool,
    active: usize,
    current_ship: Option<ShipClass>,
    loadouts: [LoadoutSet; LOADOUT_SET_COUNT],
}

impl PlayerItems {
    fn new(loaded: bool) -> Self {
        Self {
            loaded,
            active: 0,
            current_ship: None,
            loadouts: Default::default(),
        }
    }

    fn find_hull(&self, hull: HullId) -> Option<&Hull> {
        self.loadouts
            .iter()
            .flat_map(|set| set.hulls.iter().flatten())
            .find(|candidate| candidate.id == hull)
    }
}

/// Thread-safe in-memory [`ItemStore`].
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    players: DashMap<PlayerId, PlayerItems>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self { players: DashMap::new() }
    }

    /// Registers a player with fully loaded (empty) ship data.
    pub fn add_player(&self, player: PlayerId) {
        self.players.insert(player, PlayerItems::new(true));
    }

    /// Registers a player whose ship data has not loaded yet.
    pub fn add_player_unloaded(&self, player: PlayerId) {
        self.players.insert(player, PlayerItems::new(false));
    }

    /// Marks a previously registered player's ship data as loaded.
    pub fn mark_loaded(&self, player: PlayerId) {
        if let Some(mut items) = self.players.get_mut(&player) {
            items.loaded = true;
        }
    }

    /// Removes a player and all their loadout data.
    pub fn remove_player(&self, player: PlayerId) {
        self.players.remove(&player);
    }

    /// Grants the player an (empty) hull for `ship` on the given loadout
    /// set, returning its ID. Granting twice replaces the hull.
    pub fn grant_hull(&self, player: PlayerId, ship: ShipClass, loadout: usize) -> Option<HullId> {
        let mut items = self.players.get_mut(&player)?;
        let set = items.loadouts.get_mut(loadout)?;
        let id = HullId::new();
        set.hulls[ship.index()] = Some(Hull { id, items: Vec::new() });
        Some(id)
    }

    /// Equips `count` copies of an item on the identified hull. Returns
    /// false when the hull is unknown.
    pub fn equip(&self, player: PlayerId, hull: HullId, item: Arc<ItemDef>, count: u32) -> bool {
        let Some(mut items) = self.players.get_mut(&player) else {
            return false;
        };
        for set in items.loadouts.iter_mut() {
            for slot in set.hulls.iter_mut().flatten() {
                if slot.id == hull {
                    slot.items.push(EquippedItem { item, count });
                    return true;
                }
            }
        }
        false
    }

    /// Records which ship the player currently flies, which backs
    /// [`ItemStore::current_hull`]. Host glue calls this on ship changes.
    pub fn set_current_ship(&self, player: PlayerId, ship: Option<ShipClass>) {
        if let Some(mut items) = self.players.get_mut(&player) {
            items.current_ship = ship;
        }
    }
}

impl ItemStore for MemoryItemStore {
    fn ships_loaded(&self, player: PlayerId) -> bool {
        self.players.get(&player).map(|items| items.loaded).unwrap_or(false)
    }

    fn property_sum(&self, player: PlayerId, hull: HullId, property: &str, default: i32) -> i32 {
        let Some(items) = self.players.get(&player) else {
            return default;
        };
        let Some(hull) = items.find_hull(hull) else {
            return default;
        };

        let mut sum = 0i32;
        let mut absolute = None;

        for equipped in &hull.items {
            for prop in &equipped.item.properties {
                if prop.name != property {
                    continue;
                }
                if prop.absolute {
                    absolute = Some(prop.value);
                } else if prop.ignore_count {
                    sum = sum.saturating_add(prop.value);
                } else {
                    sum = sum.saturating_add(prop.value.saturating_mul(equipped.count as i32));
                }
            }
        }

        match absolute {
            Some(value) => value,
            None => default.saturating_add(sum),
        }
    }

    fn current_hull(&self, player: PlayerId) -> Option<HullId> {
        let items = self.players.get(&player)?;
        let ship = items.current_ship?;
        let active = items.active;
        items.loadouts.get(active)?.hulls[ship.index()].as_ref().map(|hull| hull.id)
    }

    fn hull(&self, player: PlayerId, ship: ShipClass, loadout: usize) -> Option<HullId> {
        let items = self.players.get(&player)?;
        items.loadouts.get(loadout)?.hulls[ship.index()].as_ref().map(|hull| hull.id)
    }

    fn active_loadout(&self, player: PlayerId) -> usize {
        self.players.get(&player).map(|items| items.active).unwrap_or(0)
    }

    fn set_active_loadout(&self, player: PlayerId, loadout: usize) -> Option<usize> {
        if loadout >= LOADOUT_SET_COUNT {
            return None;
        }
        let mut items = self.players.get_mut(&player)?;
        let previous = items.active;
        items.active = loadout;
        Some(previous)
    }
}
