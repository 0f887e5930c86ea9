//! The ship/frequency admission control gate.
//!
//! The gate never lets an admissible committing change through directly.
//! Instead it applies any pending loadout switch, enqueues a compilation
//! for the resulting hull/frequency/ship, and answers [`Deferred`]: the
//! acknowledgment state machine performs the real change once the client
//! has the matching settings. The client is therefore never placed in a
//! ship or on a frequency it lacks the configuration for.
//!
//! [`Deferred`]: ShipChangeVerdict::Deferred

use crate::state::CompileRequest;
use crate::Spawner;
use pulsar_services::{EnforcerVerdict, Freq, PlayerId, ShipClass, ShipMask};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::callbacks::read_lock;

/// Why an admission check denied a change.
///
/// The `Display` text is the player-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error(
        "Your ship data is not loaded in this arena. If you just entered, \
         please wait a moment and try again."
    )]
    DataNotLoaded,

    #[error(
        "You do not own a {ship} hull on loadout set {set}. Please use \
         \"?buy ships\" to examine the ship hulls for sale."
    )]
    HullNotOwned { ship: ShipClass, set: usize },

    #[error(
        "You do not own any hulls on loadout set {set}. Please use \
         \"?buy ships\" to examine the ship hulls for sale."
    )]
    NoOwnedHulls { set: usize },

    #[error(
        "Unable to find an available frequency to place you on. Please try \
         again in a moment."
    )]
    NoEntryFreq,

    #[error("{0}")]
    Blocked(String),
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipChangeVerdict {
    /// The change may proceed as requested.
    Allow,
    /// The change is rejected, with a player-facing reason.
    Deny(DenyReason),
    /// The change was admissible and intercepted: settings are being
    /// compiled, and the actual assignment happens once the client
    /// acknowledges them. Callers must treat this as "not yet".
    Deferred,
}

impl ShipChangeVerdict {
    /// True when the change may proceed right now.
    pub fn is_allow(&self) -> bool {
        matches!(self, ShipChangeVerdict::Allow)
    }

    /// The denial reason, if this verdict is a denial.
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            ShipChangeVerdict::Deny(reason) => Some(reason),
            _ => None,
        }
    }
}

impl Spawner {
    /// The mask of ships the player may currently fly: ships whose hull
    /// they own on the effective (pending-aware) loadout set, plus ships
    /// with no acquisition cost configured.
    pub fn allowable_ships(&self, player: PlayerId) -> ShipMask {
        let mut mask = ShipMask::EMPTY;

        if !self.items.ships_loaded(player) {
            return mask;
        }
        let Some(arena) = self.game.arena(player) else {
            return mask;
        };

        let loadout = self.effective_loadout(player);
        for ship in ShipClass::ALL {
            if self.items.hull(player, ship, loadout).is_some()
                || self.config.get_int(arena, ship.name(), "BuyPrice", 0) == 0
            {
                mask.insert(ship);
            }
        }
        mask
    }

    /// The loadout set admission decisions are made against: the pending
    /// switch when one is queued, otherwise the active set.
    pub(crate) fn effective_loadout(&self, player: PlayerId) -> usize {
        self.pending_loadout_index(player)
            .unwrap_or_else(|| self.items.active_loadout(player))
    }

    /// Checks whether the player may change into `requested`. `None`
    /// requests (to spectator) are always allowed.
    ///
    /// With `committing` set, an admissible request is intercepted: the
    /// pending loadout switch is applied, a compilation is enqueued for
    /// the resulting hull, and the verdict is [`ShipChangeVerdict::Deferred`].
    pub fn can_change_to_ship(
        self: &Arc<Self>,
        player: PlayerId,
        requested: Option<ShipClass>,
        committing: bool,
    ) -> ShipChangeVerdict {
        let Some(ship) = requested else {
            return ShipChangeVerdict::Allow;
        };
        if !self.is_managed(player) {
            return ShipChangeVerdict::Allow;
        }
        if !self.items.ships_loaded(player) {
            return ShipChangeVerdict::Deny(DenyReason::DataNotLoaded);
        }

        let mask = self.allowable_ships(player);
        if !mask.contains(ship) {
            return ShipChangeVerdict::Deny(DenyReason::HullNotOwned {
                ship,
                set: self.effective_loadout(player) + 1,
            });
        }
        if !committing {
            return ShipChangeVerdict::Allow;
        }

        if let Some(reason) = self.consult_enforcers(|enforcer| {
            enforcer.can_change_to_ship(player, ship, committing)
        }) {
            return ShipChangeVerdict::Deny(DenyReason::Blocked(reason));
        }

        self.complete_loadout_switch(player);

        // A spectator on the spectator frequency needs a real team first.
        let mut freq = self.game.freq(player);
        if self.game.ship(player).is_none() {
            if let Some(arena) = self.game.arena(player) {
                if freq == self.game.spec_freq(arena) {
                    match self.game.find_entry_freq(player) {
                        Some(entry) => freq = entry,
                        None => return ShipChangeVerdict::Deny(DenyReason::NoEntryFreq),
                    }
                }
            }
        }

        let hull = self.items.hull(player, ship, self.items.active_loadout(player));
        match CompileRequest::new(hull, freq, ship, None) {
            Ok(request) => {
                debug!(%player, %ship, freq, "ship change intercepted pending settings");
                self.enqueue_compile(player, request);
                ShipChangeVerdict::Deferred
            }
            Err(error) => ShipChangeVerdict::Deny(DenyReason::Blocked(error.to_string())),
        }
    }

    /// Frequency analogue of [`Spawner::can_change_to_ship`]. Spectators
    /// move between frequencies freely; in-ship players are re-shipped
    /// onto the requested frequency once new settings land.
    pub fn can_change_to_freq(
        self: &Arc<Self>,
        player: PlayerId,
        requested: Freq,
        committing: bool,
    ) -> ShipChangeVerdict {
        if self.game.ship(player).is_none() {
            return ShipChangeVerdict::Allow;
        }
        if !self.is_managed(player) {
            return ShipChangeVerdict::Allow;
        }
        if !self.items.ships_loaded(player) {
            return ShipChangeVerdict::Deny(DenyReason::DataNotLoaded);
        }

        let mask = self.allowable_ships(player);
        let Some(fallback) = mask.first() else {
            return ShipChangeVerdict::Deny(DenyReason::NoOwnedHulls {
                set: self.effective_loadout(player) + 1,
            });
        };
        if !committing {
            return ShipChangeVerdict::Allow;
        }

        if let Some(reason) = self.consult_enforcers(|enforcer| {
            enforcer.can_change_to_freq(player, requested, committing)
        }) {
            return ShipChangeVerdict::Deny(DenyReason::Blocked(reason));
        }

        self.complete_loadout_switch(player);

        // Keep the current ship when the new loadout still allows it;
        // otherwise fall back to the first allowed ship.
        let ship = match self.game.ship(player) {
            Some(current) if mask.contains(current) => current,
            _ => fallback,
        };

        let hull = self.items.hull(player, ship, self.items.active_loadout(player));
        match CompileRequest::new(hull, requested, ship, None) {
            Ok(request) => {
                debug!(%player, %ship, freq = requested, "freq change intercepted pending settings");
                self.enqueue_compile(player, request);
                ShipChangeVerdict::Deferred
            }
            Err(error) => ShipChangeVerdict::Deny(DenyReason::Blocked(error.to_string())),
        }
    }

    /// Runs every registered enforcer, returning the first denial reason.
    fn consult_enforcers(
        &self,
        check: impl Fn(&Arc<dyn pulsar_services::ShipChangeEnforcer>) -> EnforcerVerdict,
    ) -> Option<String> {
        let enforcers: Vec<_> = read_lock(&self.enforcers).iter().map(Arc::clone).collect();
        for enforcer in &enforcers {
            if let EnforcerVerdict::Deny(reason) = check(enforcer) {
                return Some(reason);
            }
        }
        None
    }
}
