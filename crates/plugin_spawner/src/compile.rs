//! The compilation request queue and acknowledgment state machine.
//!
//! Per player, at most one [`CompileRequest`] is ever in flight. Requests
//! arriving while one is in flight queue behind it; when the in-flight
//! request is acknowledged, everything but the newest queued request is
//! superseded (it describes a state the player has already moved past) and
//! the newest is compiled. A failed acknowledgment recompiles and resends
//! the same request indefinitely — a player stuck without correct settings
//! is unplayable, so the machine never gives up. The only path that
//! abandons in-flight work is leaving the arena.
//!
//! Lock discipline: every transition takes the player's entry lock briefly
//! and decides on a follow-up action; pipelines, listeners, and service
//! calls all run with the lock released.

use crate::events::{OverridesReceivedEvent, OverridesRequestedEvent};
use crate::state::{CompileRequest, DeliveryPhase};
use crate::Spawner;
use pulsar_services::{PlayerId, PrizeCode, PRIZE_COUNT};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Follow-up work decided under the entry lock, executed outside it.
enum AckFollowup {
    /// The chain is drained; apply the deferred ship/freq change.
    Apply(CompileRequest),
    /// A newer (or retried) request became current; run another pass.
    Recompile,
}

impl Spawner {
    /// Queues a compilation for the player. Starts a compile pass
    /// immediately when the player is idle; otherwise the request chains
    /// behind the in-flight one. Returns false for unmanaged players.
    pub(crate) fn enqueue_compile(self: &Arc<Self>, player: PlayerId, request: CompileRequest) -> bool {
        let start_pass = {
            let Some(mut state) = self.players.get_mut(&player) else {
                return false;
            };
            if !state.managed {
                return false;
            }

            match state.phase {
                DeliveryPhase::Idle => {
                    state.current = Some(request);
                    state.phase = DeliveryPhase::Compiling;
                    true
                }
                DeliveryPhase::Compiling => {
                    state.queued.push_back(request);
                    false
                }
                DeliveryPhase::AwaitingAck | DeliveryPhase::Chained => {
                    state.queued.push_back(request);
                    state.phase = DeliveryPhase::Chained;
                    false
                }
            }
        };

        if start_pass {
            self.compile_pass(player);
        }
        true
    }

    /// Runs one compile pass for the player's current request: resolve
    /// prize counts, resolve and apply every setting override, then hand
    /// the packet to the channel and await its acknowledgment.
    fn compile_pass(self: &Arc<Self>, player: PlayerId) {
        let Some(request) = self.players.get(&player).and_then(|state| state.current.clone())
        else {
            return;
        };
        let Some(arena) = self.game.arena(player) else {
            warn!(%player, "compile requested for a player in no arena");
            return;
        };

        trace!(%player, ship = %request.ship, freq = request.freq, "compile pass starting");

        self.notify_requested(
            arena,
            &OverridesRequestedEvent {
                player,
                hull: request.hull,
                freq: request.freq,
                ship: request.ship,
            },
        );

        // Prize counts come first: the initial resource pool is reduced by
        // the total prizes pending for the next spawn. Counts are always
        // recomputed here, never reused from a previous pass.
        let mut counts = [0u8; PRIZE_COUNT];
        for prize in PrizeCode::all() {
            counts[prize.index()] = self.resolve_prize_count(player, arena, &request, prize);
        }
        let pending_total: i32 = counts.iter().map(|&count| count as i32).sum();

        if let Some(mut state) = self.players.get_mut(&player) {
            state.prizes = counts;
        }

        for descriptor in self
            .registry
            .ship_descriptors(request.ship)
            .iter()
            .chain(self.registry.global_descriptors())
        {
            let value =
                self.resolve_setting_value(player, arena, &request, descriptor, pending_total);
            self.client.apply_override(player, descriptor.key, value);
        }

        // Transition before the packet goes out; the ack can race us on
        // another thread otherwise.
        {
            let Some(mut state) = self.players.get_mut(&player) else {
                return;
            };
            if !state.managed || state.current.is_none() {
                // Reverted mid-pass (arena leave); nothing to deliver.
                return;
            }
            state.phase = if state.queued.is_empty() {
                DeliveryPhase::AwaitingAck
            } else {
                DeliveryPhase::Chained
            };
        }

        let spawner = Arc::clone(self);
        let client = Arc::clone(&self.client);
        self.handle.spawn(async move {
            let result = client.deliver(player).await;
            if let Err(ref error) = result {
                warn!(%player, %error, "settings delivery failed; recompiling");
            }
            spawner.on_settings_received(player, result.is_ok());
        });
    }

    /// Acknowledgment entry point, normally invoked by the delivery task.
    ///
    /// On success: promote the newest queued request (superseding older
    /// ones) or, with an empty queue, perform the deferred ship/frequency
    /// change and notify listeners. On failure: recompile and resend the
    /// same request.
    pub fn on_settings_received(self: &Arc<Self>, player: PlayerId, success: bool) {
        let followup = {
            let Some(mut state) = self.players.get_mut(&player) else {
                // Player left while the packet was in flight.
                return;
            };
            let Some(request) = state.current.take() else {
                return;
            };

            if !success {
                state.current = Some(request);
                state.phase = DeliveryPhase::Compiling;
                AckFollowup::Recompile
            } else {
                match state.queued.pop_back() {
                    None => {
                        state.phase = DeliveryPhase::Idle;
                        AckFollowup::Apply(request)
                    }
                    Some(newest) => {
                        let superseded = state.queued.len();
                        state.queued.clear();
                        if superseded > 0 {
                            debug!(%player, superseded, "superseding stale compilation requests");
                        }
                        state.current = Some(newest);
                        state.phase = DeliveryPhase::Compiling;
                        AckFollowup::Recompile
                    }
                }
            }
        };

        match followup {
            AckFollowup::Recompile => self.compile_pass(player),
            AckFollowup::Apply(request) => {
                if self.game.ship(player) != Some(request.ship)
                    || self.game.freq(player) != request.freq
                {
                    self.game.set_ship_and_freq(player, request.ship, request.freq);
                }

                debug!(%player, ship = %request.ship, freq = request.freq, "settings acknowledged");

                if let Some(arena) = self.game.arena(player) {
                    self.notify_received(
                        arena,
                        &OverridesReceivedEvent {
                            player,
                            hull: request.hull,
                            freq: request.freq,
                            ship: request.ship,
                        },
                    );
                }
            }
        }
    }

    /// Reverts every applied override for the player and discards all
    /// queued compilation work. The one unconditional cancellation path.
    pub(crate) fn revert_player(&self, player: PlayerId) {
        for descriptor in self.registry.iter_all() {
            self.client.clear_override(player, descriptor.key);
        }

        if let Some(mut state) = self.players.get_mut(&player) {
            let discarded = usize::from(state.current.is_some()) + state.queued.len();
            if discarded > 0 {
                debug!(%player, discarded, "discarding queued compilation requests");
            }
            state.current = None;
            state.queued.clear();
            state.phase = DeliveryPhase::Idle;
            state.pending_loadout = None;
            state.prizes = [0; PRIZE_COUNT];
        }
    }

    /// Replays the player's last-resolved prize snapshot through the prize
    /// distributor. Called on every spawn; does not recompute counts.
    pub(crate) fn grant_spawn_prizes(&self, player: PlayerId) {
        let counts = match self.players.get(&player) {
            Some(state) if state.managed => state.prizes,
            _ => return,
        };

        for prize in PrizeCode::all() {
            let count = counts[prize.index()];
            if count > 0 {
                self.distributor.grant(player, prize, count);
            }
        }
    }
}
