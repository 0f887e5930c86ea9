//! Tests for the compilation queue and acknowledgment state machine.

use super::support::{wait_for, FixedPrize, Fixture, MockGame};
use crate::state::DeliveryPhase;
use crate::{LoadoutSwitchOutcome, OverridesReceivedEvent, ShipChangeVerdict, SpawnListener};
use pulsar_services::{ArenaScope, ItemDef, ItemProperty, ItemStore, PlayerId, PrizeCode, ShipClass};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingListener {
    received: Mutex<Vec<OverridesReceivedEvent>>,
}

impl SpawnListener for RecordingListener {
    fn overrides_received(&self, event: &OverridesReceivedEvent) {
        self.received.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn deny_then_apply_ship_change() {
    let fixture = Fixture::new();
    fixture.client.set_manual_ack(true);

    let player = fixture.add_spectator();
    fixture.items.grant_hull(player, ShipClass::Warbird, 0).unwrap();

    let listener = Arc::new(RecordingListener::default());
    fixture
        .spawner
        .register_listener(ArenaScope::Global, listener.clone());

    let verdict = fixture
        .spawner
        .can_change_to_ship(player, Some(ShipClass::Warbird), true);
    assert_eq!(verdict, ShipChangeVerdict::Deferred);

    // The change is intercepted: nothing assigned yet, one packet in
    // flight.
    wait_for("delivery to start", || fixture.client.in_flight(player) == 1).await;
    assert!(fixture.game.assignments().is_empty());
    assert_eq!(
        fixture.spawner.delivery_phase(player),
        Some(DeliveryPhase::AwaitingAck)
    );

    fixture.client.ack(player, true);
    wait_for("assignment after ack", || !fixture.game.assignments().is_empty()).await;

    let assignments = fixture.game.assignments();
    assert_eq!(assignments.len(), 1);
    let (assigned_player, ship, freq) = assignments[0];
    assert_eq!(assigned_player, player);
    assert_eq!(ship, ShipClass::Warbird);
    // Spectators on the spec freq get an entry frequency, not the spec
    // freq itself.
    assert_ne!(freq, MockGame::SPEC_FREQ);

    assert_eq!(fixture.spawner.delivery_phase(player), Some(DeliveryPhase::Idle));
    assert_eq!(listener.received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn newer_requests_supersede_queued_ones() {
    let fixture = Fixture::new();
    fixture.client.set_manual_ack(true);

    let (player, _) = fixture.add_ship_player(ShipClass::Spider, 5);
    fixture.items.grant_hull(player, ShipClass::Warbird, 0).unwrap();
    fixture.items.grant_hull(player, ShipClass::Javelin, 0).unwrap();

    // R1: switch to Warbird. Compiles and goes in flight immediately.
    assert_eq!(
        fixture.spawner.can_change_to_ship(player, Some(ShipClass::Warbird), true),
        ShipChangeVerdict::Deferred
    );
    wait_for("first delivery", || fixture.client.in_flight(player) == 1).await;

    // R2 and R3 arrive before R1's ack; they chain, nothing new is sent.
    assert_eq!(
        fixture.spawner.can_change_to_ship(player, Some(ShipClass::Spider), true),
        ShipChangeVerdict::Deferred
    );
    assert_eq!(
        fixture.spawner.can_change_to_ship(player, Some(ShipClass::Javelin), true),
        ShipChangeVerdict::Deferred
    );
    assert_eq!(fixture.spawner.delivery_phase(player), Some(DeliveryPhase::Chained));
    assert_eq!(fixture.client.delivery_count(), 1);
    assert_eq!(fixture.client.in_flight(player), 1);

    // R1 acknowledged: R2 is superseded without ever being delivered; R3
    // compiles and goes out as the second (and only other) delivery.
    fixture.client.ack(player, true);
    wait_for("second delivery", || fixture.client.delivery_count() == 2).await;
    assert_eq!(fixture.client.in_flight(player), 1);
    assert!(fixture.game.assignments().is_empty());

    fixture.client.ack(player, true);
    wait_for("final assignment", || !fixture.game.assignments().is_empty()).await;

    // Only R3's ship was ever assigned; the player never touched Warbird
    // or re-entered Spider via R2.
    let assignments = fixture.game.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].1, ShipClass::Javelin);
    assert_eq!(fixture.client.delivery_count(), 2);
}

#[tokio::test]
async fn failed_deliveries_retry_until_acknowledged() {
    let fixture = Fixture::new();
    // Two failures, then the default auto-ack succeeds.
    fixture.client.script_deliveries(&[false, false]);

    let (player, _) = fixture.add_ship_player(ShipClass::Warbird, 3);
    assert!(fixture.spawner.recompile_and_resend(player));

    wait_for("retries then success", || {
        fixture.client.delivery_count() == 3
            && fixture.spawner.delivery_phase(player) == Some(DeliveryPhase::Idle)
    })
    .await;

    // The retries rebuilt and resent the same request; the player was
    // already in the right ship/freq, so no assignment was needed.
    assert!(fixture.game.assignments().is_empty());
}

#[tokio::test]
async fn leaving_mid_flight_discards_everything() {
    let fixture = Fixture::new();
    fixture.client.set_manual_ack(true);

    let (player, _) = fixture.add_ship_player(ShipClass::Warbird, 2);
    assert!(fixture.spawner.recompile_and_resend(player));

    wait_for("delivery in flight", || fixture.client.in_flight(player) == 1).await;
    assert!(fixture.client.override_count(player) > 0);

    // Chain another request behind the in-flight one, then leave.
    assert!(fixture.spawner.recompile_and_resend(player));
    fixture.spawner.on_player_leave(player);

    assert_eq!(fixture.client.override_count(player), 0);
    assert!(!fixture.spawner.is_managed(player));
    assert_eq!(fixture.spawner.delivery_phase(player), None);

    // A late ack for the abandoned packet is a no-op.
    fixture.client.ack(player, true);
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    assert!(fixture.game.assignments().is_empty());
    assert_eq!(fixture.client.override_count(player), 0);
}

#[tokio::test]
async fn item_changes_trigger_recompiles_only_when_relevant() {
    let fixture = Fixture::new();
    let (player, hull) = fixture.add_ship_player(ShipClass::Warbird, 1);

    wait_for("no initial deliveries", || fixture.client.delivery_count() == 0).await;

    let silent = Arc::new(ItemDef {
        name: "Paint Job".into(),
        properties: vec![],
        resend_sets: false,
    });
    fixture.spawner.on_item_count_changed(player, hull, &silent, 1, 0);
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    assert_eq!(fixture.client.delivery_count(), 0);

    let loud = Arc::new(ItemDef::new(
        "Gun Upgrade",
        vec![ItemProperty::additive("gunlevel", 1)],
    ));
    // Count unchanged: still nothing.
    fixture.spawner.on_item_count_changed(player, hull, &loud, 2, 2);
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    assert_eq!(fixture.client.delivery_count(), 0);

    fixture.spawner.on_item_count_changed(player, hull, &loud, 2, 1);
    wait_for("recompile after item change", || fixture.client.delivery_count() == 1).await;
}

#[tokio::test]
async fn spawn_replays_resolved_prize_counts() {
    let fixture = Fixture::new();
    let (player, _) = fixture.add_ship_player(ShipClass::Terrier, 4);

    fixture.spawner.register_prize_callback(
        Arc::new(FixedPrize(3)),
        ArenaScope::Global,
        PrizeCode::REPEL,
    );
    fixture.spawner.register_prize_callback(
        Arc::new(FixedPrize(2)),
        ArenaScope::Arena(fixture.arena),
        PrizeCode::BURST,
    );

    // Before any compile pass the snapshot is empty; spawning grants
    // nothing.
    fixture.spawner.on_player_spawn(player);
    assert!(fixture.prizes.grants().is_empty());

    assert!(fixture.spawner.recompile_and_resend(player));
    wait_for("compile settles", || {
        fixture.spawner.delivery_phase(player) == Some(DeliveryPhase::Idle)
            && fixture.client.delivery_count() == 1
    })
    .await;

    fixture.spawner.on_player_spawn(player);
    let mut grants = fixture.prizes.grants();
    grants.sort_by_key(|(_, prize, _)| prize.code());
    assert_eq!(
        grants,
        vec![(player, PrizeCode::REPEL, 3), (player, PrizeCode::BURST, 2)]
    );

    // Granting replays the snapshot; it does not recompute or resend.
    assert_eq!(fixture.client.delivery_count(), 1);
}

#[tokio::test]
async fn items_reloaded_recompiles_only_in_ship_players() {
    let fixture = Fixture::new();
    let (flying, _) = fixture.add_ship_player(ShipClass::Warbird, 1);
    let spectating = fixture.add_spectator();

    fixture.spawner.on_items_reloaded();
    wait_for("one recompile", || fixture.client.delivery_count() == 1).await;

    assert_eq!(fixture.client.override_count(spectating), 0);
    assert!(fixture.client.override_count(flying) > 0);
}

#[tokio::test]
async fn attach_manages_and_detach_reverts_the_whole_arena() {
    let fixture = Fixture::new();

    // Two players are already in the arena when the spawner attaches: one
    // flying, one spectating.
    let pilot = PlayerId::new();
    fixture.items.add_player(pilot);
    fixture.items.grant_hull(pilot, ShipClass::Warbird, 0).unwrap();
    fixture.items.set_current_ship(pilot, Some(ShipClass::Warbird));
    fixture.game.add_player(pilot, fixture.arena, Some(ShipClass::Warbird), 1);

    let watcher = PlayerId::new();
    fixture.items.add_player(watcher);
    fixture.game.add_player(watcher, fixture.arena, None, MockGame::SPEC_FREQ);

    fixture.spawner.attach(fixture.arena);
    assert!(fixture.spawner.is_managed(pilot));
    assert!(fixture.spawner.is_managed(watcher));

    // Only the in-ship player gets a compile pass.
    wait_for("attach compile", || fixture.client.delivery_count() == 1).await;
    wait_for("attach compile settles", || {
        fixture.spawner.delivery_phase(pilot) == Some(DeliveryPhase::Idle)
    })
    .await;
    assert!(fixture.client.override_count(pilot) > 0);
    assert_eq!(fixture.client.override_count(watcher), 0);

    fixture.spawner.detach(fixture.arena);
    assert!(!fixture.spawner.is_managed(pilot));
    assert!(!fixture.spawner.is_managed(watcher));
    assert_eq!(fixture.client.override_count(pilot), 0);
}

#[tokio::test]
async fn loadout_switch_defers_in_ship_and_completes_on_commit() {
    let fixture = Fixture::new();
    fixture.client.set_manual_ack(true);

    let (player, _) = fixture.add_ship_player(ShipClass::Warbird, 6);
    fixture.items.grant_hull(player, ShipClass::Javelin, 1).unwrap();

    // In a ship: the switch defers.
    assert_eq!(
        fixture.spawner.request_loadout_switch(player, 1),
        LoadoutSwitchOutcome::Deferred { set: 2 }
    );
    assert!(fixture.spawner.has_pending_loadout_switch(player));
    assert_eq!(fixture.spawner.pending_loadout_index(player), Some(1));
    assert_eq!(fixture.items.active_loadout(player), 0);

    // Admission now evaluates against the pending set: Javelin is owned
    // there (and nowhere on set 0).
    let verdict = fixture
        .spawner
        .can_change_to_ship(player, Some(ShipClass::Javelin), true);
    assert_eq!(verdict, ShipChangeVerdict::Deferred);

    // The switch completed atomically at the commit point.
    assert_eq!(fixture.items.active_loadout(player), 1);
    assert!(!fixture.spawner.has_pending_loadout_switch(player));

    fixture.client.ack(player, true);
    wait_for("javelin assignment", || !fixture.game.assignments().is_empty()).await;
    assert_eq!(fixture.game.assignments()[0].1, ShipClass::Javelin);
}
