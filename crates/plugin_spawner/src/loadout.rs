//! The pending loadout-set tracker.
//!
//! A player flying a ship cannot switch loadout sets immediately — their
//! client holds settings compiled from the old set's hull. The switch is
//! instead recorded as pending and applied atomically at the moment a
//! ship/frequency change is granted by the admission gate. Spectators have
//! no settings to desynchronize, so their switches apply on the spot.

use crate::Spawner;
use pulsar_services::{PlayerId, LOADOUT_SET_COUNT};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of a loadout-switch request. The `Display` text is the
/// player-facing message; set numbers are 1-based for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadoutSwitchOutcome {
    /// The switch took effect immediately (player was spectating).
    Applied { set: usize },
    /// The switch is stored and takes effect on the next granted ship or
    /// frequency change.
    Deferred { set: usize },
    /// The player re-selected their active set, cancelling a pending
    /// switch.
    Cancelled { set: usize },
    /// The requested set is already active and nothing was pending.
    AlreadyActive { set: usize },
    /// The item store rejected the switch.
    Failed { set: usize },
    /// Ship data has not loaded yet.
    DataNotLoaded,
    /// The requested index is out of range.
    InvalidIndex { max: usize },
}

impl std::fmt::Display for LoadoutSwitchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadoutSwitchOutcome::Applied { set } | LoadoutSwitchOutcome::Cancelled { set } => {
                write!(f, "You are now using loadout set {set}.")
            }
            LoadoutSwitchOutcome::Deferred { .. } => write!(
                f,
                "Your loadout change will take effect on your next freq or ship change."
            ),
            LoadoutSwitchOutcome::AlreadyActive { set } => {
                write!(f, "You are already using loadout set {set}.")
            }
            LoadoutSwitchOutcome::Failed { set } => {
                write!(f, "Error: Unable to change to loadout set {set}.")
            }
            LoadoutSwitchOutcome::DataNotLoaded => write!(
                f,
                "Your ship data has not yet loaded. Try again in a moment, or re-enter \
                 the arena if this issue persists."
            ),
            LoadoutSwitchOutcome::InvalidIndex { max } => write!(
                f,
                "Invalid loadout set number. The set must be between 1 and {max}, inclusive."
            ),
        }
    }
}

impl Spawner {
    /// Requests a switch to loadout set `index` (zero-based).
    ///
    /// Applied immediately for spectators; deferred until the next granted
    /// ship/frequency change for players in a ship. Requesting the active
    /// set cancels any pending switch.
    pub fn request_loadout_switch(&self, player: PlayerId, index: usize) -> LoadoutSwitchOutcome {
        if !self.items.ships_loaded(player) {
            return LoadoutSwitchOutcome::DataNotLoaded;
        }
        if index >= LOADOUT_SET_COUNT {
            return LoadoutSwitchOutcome::InvalidIndex { max: LOADOUT_SET_COUNT };
        }

        let active = self.items.active_loadout(player);
        if index == active {
            let had_pending = self
                .players
                .get_mut(&player)
                .map(|mut state| state.pending_loadout.take().is_some())
                .unwrap_or(false);
            return if had_pending {
                LoadoutSwitchOutcome::Cancelled { set: index + 1 }
            } else {
                LoadoutSwitchOutcome::AlreadyActive { set: index + 1 }
            };
        }

        if self.game.ship(player).is_some() {
            if let Some(mut state) = self.players.get_mut(&player) {
                state.pending_loadout = Some(index);
                return LoadoutSwitchOutcome::Deferred { set: index + 1 };
            }
            return LoadoutSwitchOutcome::Failed { set: index + 1 };
        }

        match self.items.set_active_loadout(player, index) {
            Some(previous) => {
                info!(%player, old = previous + 1, new = index + 1, "loadout set changed");
                LoadoutSwitchOutcome::Applied { set: index + 1 }
            }
            None => LoadoutSwitchOutcome::Failed { set: index + 1 },
        }
    }

    /// Whether the player has a loadout switch queued behind their next
    /// ship/frequency change.
    pub fn has_pending_loadout_switch(&self, player: PlayerId) -> bool {
        self.players
            .get(&player)
            .map(|state| state.managed && state.pending_loadout.is_some())
            .unwrap_or(false)
    }

    /// The player's pending loadout set index, if a switch is queued.
    pub fn pending_loadout_index(&self, player: PlayerId) -> Option<usize> {
        self.players
            .get(&player)
            .filter(|state| state.managed)
            .and_then(|state| state.pending_loadout)
    }

    /// Applies a queued loadout switch, if any. Called at the single point
    /// where the admission gate commits a ship/frequency change. Returns
    /// true when a pending switch completed.
    pub(crate) fn complete_loadout_switch(&self, player: PlayerId) -> bool {
        let Some(pending) = self.pending_loadout_index(player) else {
            return false;
        };

        match self.items.set_active_loadout(player, pending) {
            Some(previous) => {
                if let Some(mut state) = self.players.get_mut(&player) {
                    state.pending_loadout = None;
                }
                info!(
                    %player,
                    old = previous + 1,
                    new = pending + 1,
                    "completed queued loadout change"
                );
                true
            }
            None => false,
        }
    }
}
