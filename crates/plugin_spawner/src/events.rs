//! Notifications emitted around settings compilation.
//!
//! Collaborating plugins (game modes, shops, HUD modules) often need to
//! know when a player's effective settings are about to change and when
//! they have actually taken hold on the client. Two notifications cover
//! this: one fired before each compile pass begins, and one fired after a
//! deferred ship/frequency change has finally been applied.

use pulsar_services::{Freq, HullId, PlayerId, ShipClass};
use serde::{Deserialize, Serialize};

/// Fired immediately before a compile pass runs for a player.
///
/// The player will be assigned to the carried frequency and ship once the
/// settings are acknowledged, not before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridesRequestedEvent {
    pub player: PlayerId,
    pub hull: Option<HullId>,
    pub freq: Freq,
    pub ship: ShipClass,
}

/// Fired after a player's settings were acknowledged and any deferred
/// ship/frequency assignment has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridesReceivedEvent {
    pub player: PlayerId,
    pub hull: Option<HullId>,
    pub freq: Freq,
    pub ship: ShipClass,
}

/// Capability interface for override lifecycle notifications.
///
/// Both methods default to no-ops so implementors subscribe to only the
/// edge they care about. Listeners run in registration order, outside any
/// spawner lock; they may call back into the spawner freely.
pub trait SpawnListener: Send + Sync {
    /// A compile pass is about to run for `event.player`.
    fn overrides_requested(&self, _event: &OverridesRequestedEvent) {}

    /// Settings landed and the deferred change (if any) was applied.
    fn overrides_received(&self, _event: &OverridesReceivedEvent) {}
}
