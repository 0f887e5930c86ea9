//! Mock host services and a test fixture for driving the spawner.

use crate::{HostServices, OverrideContext, OverrideResolver, PrizeContext, PrizeResolver, Spawner};
use pulsar_services::{
    async_trait, ArenaId, DeliveryError, Freq, GameService, HullId, MemoryItemStore, PlayerId,
    PrizeCode, PrizeDistributor, SettingKey, SettingsClient, ShipClass, TomlArenaConfig,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Settings channel double: auto-assigns override keys, records staged
/// overrides, and supports scripted or manually acknowledged deliveries.
pub struct MockSettingsClient {
    keys: Mutex<HashMap<(String, String), u32>>,
    refused: Mutex<HashSet<(String, String)>>,
    next_key: AtomicU32,
    overrides: Mutex<HashMap<(PlayerId, u32), i32>>,
    scripted: Mutex<VecDeque<bool>>,
    manual: AtomicBool,
    pending: Mutex<HashMap<PlayerId, VecDeque<tokio::sync::oneshot::Sender<bool>>>>,
    deliveries: AtomicUsize,
}

impl MockSettingsClient {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            refused: Mutex::new(HashSet::new()),
            next_key: AtomicU32::new(1),
            overrides: Mutex::new(HashMap::new()),
            scripted: Mutex::new(VecDeque::new()),
            manual: AtomicBool::new(false),
            pending: Mutex::new(HashMap::new()),
            deliveries: AtomicUsize::new(0),
        }
    }

    /// Makes `override_key` return `None` for one setting, mimicking a
    /// setting the channel cannot override.
    pub fn refuse_key(&self, section: &str, setting: &str) {
        self.refused.lock().unwrap().insert((section.into(), setting.into()));
    }

    /// Queues results for upcoming deliveries; `false` acknowledges as a
    /// failure. Once the script is drained, deliveries fall back to the
    /// manual/auto mode.
    pub fn script_deliveries(&self, results: &[bool]) {
        self.scripted.lock().unwrap().extend(results.iter().copied());
    }

    /// Switches deliveries to manual acknowledgment via [`Self::ack`].
    pub fn set_manual_ack(&self, manual: bool) {
        self.manual.store(manual, Ordering::SeqCst);
    }

    /// Completes the oldest outstanding delivery for the player.
    pub fn ack(&self, player: PlayerId, success: bool) {
        let sender = self
            .pending
            .lock()
            .unwrap()
            .get_mut(&player)
            .and_then(|queue| queue.pop_front());
        if let Some(sender) = sender {
            let _ = sender.send(success);
        }
    }

    /// Number of deliveries started so far.
    pub fn delivery_count(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }

    /// Number of deliveries currently awaiting a manual ack.
    pub fn in_flight(&self, player: PlayerId) -> usize {
        self.pending.lock().unwrap().get(&player).map(VecDeque::len).unwrap_or(0)
    }

    /// The staged override value for one setting, if any.
    pub fn override_value(&self, player: PlayerId, section: &str, setting: &str) -> Option<i32> {
        let key = *self.keys.lock().unwrap().get(&(section.into(), setting.into()))?;
        self.overrides.lock().unwrap().get(&(player, key)).copied()
    }

    /// How many overrides are currently staged for the player.
    pub fn override_count(&self, player: PlayerId) -> usize {
        self.overrides.lock().unwrap().keys().filter(|(owner, _)| *owner == player).count()
    }

    /// A snapshot of every staged override for the player, keyed by
    /// override key. Used for idempotency comparisons.
    pub fn override_snapshot(&self, player: PlayerId) -> HashMap<u32, i32> {
        self.overrides
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| *owner == player)
            .map(|((_, key), value)| (*key, *value))
            .collect()
    }
}

#[async_trait]
impl SettingsClient for MockSettingsClient {
    fn override_key(&self, section: &str, setting: &str) -> Option<SettingKey> {
        let entry = (section.to_string(), setting.to_string());
        if self.refused.lock().unwrap().contains(&entry) {
            return None;
        }
        let mut keys = self.keys.lock().unwrap();
        let key = *keys
            .entry(entry)
            .or_insert_with(|| self.next_key.fetch_add(1, Ordering::SeqCst));
        Some(SettingKey(key))
    }

    fn apply_override(&self, player: PlayerId, key: SettingKey, value: i32) {
        self.overrides.lock().unwrap().insert((player, key.0), value);
    }

    fn clear_override(&self, player: PlayerId, key: SettingKey) {
        self.overrides.lock().unwrap().remove(&(player, key.0));
    }

    fn applied_override(&self, player: PlayerId, key: SettingKey) -> Option<i32> {
        self.overrides.lock().unwrap().get(&(player, key.0)).copied()
    }

    async fn deliver(&self, player: PlayerId) -> Result<(), DeliveryError> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);

        if let Some(success) = self.scripted.lock().unwrap().pop_front() {
            return if success {
                Ok(())
            } else {
                Err(DeliveryError::Channel("scripted failure".into()))
            };
        }

        if self.manual.load(Ordering::SeqCst) {
            let (sender, receiver) = tokio::sync::oneshot::channel();
            self.pending.lock().unwrap().entry(player).or_default().push_back(sender);
            return match receiver.await {
                Ok(true) => Ok(()),
                Ok(false) => Err(DeliveryError::Channel("client rejected settings".into())),
                Err(_) => Err(DeliveryError::Disconnected),
            };
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct PlayerLoc {
    arena: ArenaId,
    ship: Option<ShipClass>,
    freq: Freq,
}

/// Game directory double; records every ship/frequency assignment.
pub struct MockGame {
    players: Mutex<HashMap<PlayerId, PlayerLoc>>,
    spec_freq: Freq,
    entry_freq: Mutex<Option<Freq>>,
    assignments: Mutex<Vec<(PlayerId, ShipClass, Freq)>>,
}

impl MockGame {
    pub const SPEC_FREQ: Freq = 8025;

    pub fn new() -> Self {
        Self {
            players: Mutex::new(HashMap::new()),
            spec_freq: Self::SPEC_FREQ,
            entry_freq: Mutex::new(Some(0)),
            assignments: Mutex::new(Vec::new()),
        }
    }

    pub fn add_player(&self, player: PlayerId, arena: ArenaId, ship: Option<ShipClass>, freq: Freq) {
        self.players.lock().unwrap().insert(player, PlayerLoc { arena, ship, freq });
    }

    /// Controls what `find_entry_freq` yields; `None` means no room.
    pub fn set_entry_freq(&self, freq: Option<Freq>) {
        *self.entry_freq.lock().unwrap() = freq;
    }

    pub fn assignments(&self) -> Vec<(PlayerId, ShipClass, Freq)> {
        self.assignments.lock().unwrap().clone()
    }
}

impl GameService for MockGame {
    fn arena(&self, player: PlayerId) -> Option<ArenaId> {
        self.players.lock().unwrap().get(&player).map(|loc| loc.arena)
    }

    fn players_in(&self, arena: ArenaId) -> Vec<PlayerId> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, loc)| loc.arena == arena)
            .map(|(player, _)| *player)
            .collect()
    }

    fn ship(&self, player: PlayerId) -> Option<ShipClass> {
        self.players.lock().unwrap().get(&player).and_then(|loc| loc.ship)
    }

    fn freq(&self, player: PlayerId) -> Freq {
        self.players.lock().unwrap().get(&player).map(|loc| loc.freq).unwrap_or(Self::SPEC_FREQ)
    }

    fn spec_freq(&self, _arena: ArenaId) -> Freq {
        self.spec_freq
    }

    fn find_entry_freq(&self, _player: PlayerId) -> Option<Freq> {
        *self.entry_freq.lock().unwrap()
    }

    fn set_ship_and_freq(&self, player: PlayerId, ship: ShipClass, freq: Freq) {
        self.assignments.lock().unwrap().push((player, ship, freq));
        if let Some(loc) = self.players.lock().unwrap().get_mut(&player) {
            loc.ship = Some(ship);
            loc.freq = freq;
        }
    }
}

/// Prize distributor double recording every grant.
#[derive(Default)]
pub struct RecordingPrizes {
    grants: Mutex<Vec<(PlayerId, PrizeCode, u8)>>,
}

impl RecordingPrizes {
    pub fn grants(&self) -> Vec<(PlayerId, PrizeCode, u8)> {
        self.grants.lock().unwrap().clone()
    }
}

impl PrizeDistributor for RecordingPrizes {
    fn grant(&self, player: PlayerId, prize: PrizeCode, count: u8) {
        self.grants.lock().unwrap().push((player, prize, count));
    }
}

// Simple resolvers used across tests.

/// Adds a fixed amount to the resolved value.
pub struct AddResolver(pub i32);

impl OverrideResolver for AddResolver {
    fn resolve(&self, _ctx: &OverrideContext<'_>, value: i32) -> i32 {
        value + self.0
    }
}

/// Replaces the resolved value outright.
pub struct SetResolver(pub i32);

impl OverrideResolver for SetResolver {
    fn resolve(&self, _ctx: &OverrideContext<'_>, _value: i32) -> i32 {
        self.0
    }
}

/// Resolves a fixed prize count.
pub struct FixedPrize(pub i32);

impl PrizeResolver for FixedPrize {
    fn resolve(&self, _ctx: &PrizeContext, _count: i32) -> i32 {
        self.0
    }
}

/// A fully wired spawner over mock services. Every ship has a nonzero
/// `BuyPrice` by default, so the allowable mask is driven purely by hull
/// ownership unless a test zeroes a price.
pub struct Fixture {
    pub spawner: Arc<Spawner>,
    pub client: Arc<MockSettingsClient>,
    pub items: Arc<MemoryItemStore>,
    pub config: Arc<TomlArenaConfig>,
    pub game: Arc<MockGame>,
    pub prizes: Arc<RecordingPrizes>,
    pub arena: ArenaId,
}

/// Installs a test subscriber once so `RUST_LOG=debug cargo test` shows
/// spawner traces.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl Fixture {
    /// Builds the fixture. Must run inside a tokio runtime.
    pub fn new() -> Self {
        init_tracing();

        let client = Arc::new(MockSettingsClient::new());
        let items = Arc::new(MemoryItemStore::new());
        let config = Arc::new(TomlArenaConfig::new());
        let game = Arc::new(MockGame::new());
        let prizes = Arc::new(RecordingPrizes::default());
        let arena = ArenaId::new();

        for ship in ShipClass::ALL {
            config.set_int(arena, ship.name(), "BuyPrice", 1200);
        }

        let spawner = Spawner::new(
            HostServices {
                items: items.clone(),
                client: client.clone(),
                config: config.clone(),
                game: game.clone(),
                prizes: prizes.clone(),
            },
            tokio::runtime::Handle::current(),
        );

        Self { spawner, client, items, config, game, prizes, arena }
    }

    /// Adds a managed player flying `ship` on `freq`, with an owned hull
    /// on loadout set 0.
    pub fn add_ship_player(&self, ship: ShipClass, freq: Freq) -> (PlayerId, HullId) {
        let player = PlayerId::new();
        self.items.add_player(player);
        let hull = self.items.grant_hull(player, ship, 0).unwrap();
        self.items.set_current_ship(player, Some(ship));
        self.game.add_player(player, self.arena, Some(ship), freq);
        self.spawner.on_player_enter(player);
        (player, hull)
    }

    /// Adds a managed spectator with no hulls.
    pub fn add_spectator(&self) -> PlayerId {
        let player = PlayerId::new();
        self.items.add_player(player);
        self.game.add_player(player, self.arena, None, MockGame::SPEC_FREQ);
        self.spawner.on_player_enter(player);
        player
    }
}

/// Polls until `condition` holds, panicking after ~1s. Used to wait out
/// the spawned delivery tasks.
pub async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}
