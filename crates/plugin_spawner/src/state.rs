//! Per-player spawn state and the delivery state machine.

use crate::error::SpawnerError;
use pulsar_services::{Freq, HullId, ShipClass, MAX_FREQ, PRIZE_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where a player sits in the compile-and-deliver cycle.
///
/// The phase is recorded explicitly so that collaborators (and log lines)
/// can see a named state instead of inferring one from queue lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryPhase {
    /// No compilation in progress.
    Idle,
    /// Resolution pipelines are running for the head request.
    Compiling,
    /// A settings packet is on the wire, waiting for the client ack.
    AwaitingAck,
    /// A packet is on the wire and at least one newer request is queued
    /// behind it.
    Chained,
}

/// One unit of "deliver settings for this hull/frequency/ship" work.
///
/// The hull is absent for ships the player flies without owning a hull
/// (freely available ship classes); item contributions are skipped there
/// and every setting resolves from the arena default and callbacks alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub hull: Option<HullId>,
    pub freq: Freq,
    pub ship: ShipClass,
    /// Prize counts the player spawned with before this request, carried
    /// for collaborators that reconcile consumables on ack. The pipelines
    /// never read it; counts are always recomputed per compile pass.
    pub baseline: Option<[u8; PRIZE_COUNT]>,
}

impl CompileRequest {
    /// Builds a request, validating the target frequency.
    pub fn new(
        hull: Option<HullId>,
        freq: Freq,
        ship: ShipClass,
        baseline: Option<[u8; PRIZE_COUNT]>,
    ) -> Result<Self, SpawnerError> {
        if freq > MAX_FREQ {
            return Err(SpawnerError::InvalidFrequency(freq));
        }
        Ok(Self { hull, freq, ship, baseline })
    }
}

/// Mutable spawn state for one managed player.
///
/// Lives exactly as long as the player's membership in a managed arena.
/// All fields are guarded by the owning map's entry lock; code must never
/// run foreign callbacks while holding that lock.
#[derive(Debug)]
pub(crate) struct PlayerSpawnState {
    /// Whether the spawner is currently maintaining this player's settings.
    pub managed: bool,
    pub phase: DeliveryPhase,
    /// The request currently being compiled or awaiting its ack.
    pub current: Option<CompileRequest>,
    /// Requests that arrived while `current` was in flight, oldest first.
    pub queued: VecDeque<CompileRequest>,
    /// A deferred loadout-set switch, applied at the next granted change.
    pub pending_loadout: Option<usize>,
    /// Last-resolved spawn prize counts, replayed on every respawn.
    pub prizes: [u8; PRIZE_COUNT],
}

impl PlayerSpawnState {
    pub fn new() -> Self {
        Self {
            managed: true,
            phase: DeliveryPhase::Idle,
            current: None,
            queued: VecDeque::new(),
            pending_loadout: None,
            prizes: [0; PRIZE_COUNT],
        }
    }

    /// Total prizes pending for the next spawn; feeds the initial resource
    /// pool reduction.
    pub fn pending_prize_total(&self) -> i32 {
        self.prizes.iter().map(|&count| count as i32).sum()
    }
}
