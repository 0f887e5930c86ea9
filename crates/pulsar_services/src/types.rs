//! # Core Type Definitions
//!
//! The fundamental types shared by every Pulsar service interface. Wrapper
//! types are used throughout so that a player identifier can never be
//! confused with an arena or hull identifier, and so that ship classes and
//! prize codes are closed sets rather than loose integers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifier Types
// ============================================================================

/// Unique identifier for a player in the game world.
///
/// This is a wrapper around UUID that provides type safety and ensures
/// player IDs cannot be confused with other types of IDs in the system.
///
/// # Examples
///
/// ```rust
/// use pulsar_services::PlayerId;
///
/// let player_id = PlayerId::new();
/// println!("Player ID: {}", player_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a player ID from a string representation.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an arena.
///
/// Arenas are independent game spaces with their own configuration and
/// player population. Plugins attach to arenas individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArenaId(pub Uuid);

impl ArenaId {
    /// Creates a new random arena ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArenaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArenaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one ship hull.
///
/// A hull is the concrete outfitted configuration of one ship class inside
/// one loadout set. Handing out an opaque ID instead of a reference keeps
/// hull ownership inside the item store; consumers resolve properties
/// through [`crate::services::ItemStore::property_sum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HullId(pub Uuid);

impl HullId {
    /// Creates a new random hull ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HullId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HullId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Game Value Types
// ============================================================================

/// Team frequency. Legal values are `0..=MAX_FREQ`.
pub type Freq = u16;

/// The highest assignable team frequency.
pub const MAX_FREQ: Freq = 9999;

/// The number of alternate loadout sets each player owns.
pub const LOADOUT_SET_COUNT: usize = 3;

/// The eight flyable ship classes.
///
/// Spectator mode is intentionally not a variant; everywhere a player's
/// current ship is queried the result is `Option<ShipClass>`, with `None`
/// meaning the player is spectating. This keeps "is actually in a ship"
/// checks explicit at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipClass {
    Warbird,
    Javelin,
    Spider,
    Leviathan,
    Terrier,
    Weasel,
    Lancaster,
    Shark,
}

impl ShipClass {
    /// Number of ship classes.
    pub const COUNT: usize = 8;

    /// All ship classes, in canonical order.
    pub const ALL: [ShipClass; Self::COUNT] = [
        ShipClass::Warbird,
        ShipClass::Javelin,
        ShipClass::Spider,
        ShipClass::Leviathan,
        ShipClass::Terrier,
        ShipClass::Weasel,
        ShipClass::Lancaster,
        ShipClass::Shark,
    ];

    /// Zero-based index of this ship class in canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Looks up a ship class by canonical index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The display name of the ship class, which doubles as its settings
    /// section name in arena configuration.
    pub fn name(self) -> &'static str {
        match self {
            ShipClass::Warbird => "Warbird",
            ShipClass::Javelin => "Javelin",
            ShipClass::Spider => "Spider",
            ShipClass::Leviathan => "Leviathan",
            ShipClass::Terrier => "Terrier",
            ShipClass::Weasel => "Weasel",
            ShipClass::Lancaster => "Lancaster",
            ShipClass::Shark => "Shark",
        }
    }
}

impl std::fmt::Display for ShipClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask over [`ShipClass`], used for allowable-ship computations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipMask(u8);

impl ShipMask {
    /// A mask admitting no ships.
    pub const EMPTY: ShipMask = ShipMask(0);

    /// A mask admitting every ship class.
    pub const ALL: ShipMask = ShipMask(0xFF);

    /// Adds a ship class to the mask.
    pub fn insert(&mut self, ship: ShipClass) {
        self.0 |= 1 << ship.index();
    }

    /// Checks whether a ship class is in the mask.
    pub fn contains(self, ship: ShipClass) -> bool {
        self.0 & (1 << ship.index()) != 0
    }

    /// True when the mask admits no ships at all.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The lowest-indexed ship class in the mask, if any.
    pub fn first(self) -> Option<ShipClass> {
        ShipClass::ALL.into_iter().find(|ship| self.contains(*ship))
    }

    /// Iterates the ship classes in the mask, in canonical order.
    pub fn iter(self) -> impl Iterator<Item = ShipClass> {
        ShipClass::ALL.into_iter().filter(move |ship| self.contains(*ship))
    }
}

// ============================================================================
// Prize Codes
// ============================================================================

/// The number of distinct spawn prize codes.
pub const PRIZE_COUNT: usize = 28;

/// A spawn-consumable ("prize") code.
///
/// Prize codes are one-based on the wire; valid codes are `1..=28`. Use the
/// named constants where possible, and [`PrizeCode::new`] when a code
/// arrives as a raw integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrizeCode(u8);

impl PrizeCode {
    pub const RECHARGE: PrizeCode = PrizeCode(1);
    pub const ENERGY: PrizeCode = PrizeCode(2);
    pub const ROTATION: PrizeCode = PrizeCode(3);
    pub const STEALTH: PrizeCode = PrizeCode(4);
    pub const CLOAK: PrizeCode = PrizeCode(5);
    pub const XRADAR: PrizeCode = PrizeCode(6);
    pub const WARP: PrizeCode = PrizeCode(7);
    pub const GUN: PrizeCode = PrizeCode(8);
    pub const BOMB: PrizeCode = PrizeCode(9);
    pub const BOUNCE: PrizeCode = PrizeCode(10);
    pub const THRUST: PrizeCode = PrizeCode(11);
    pub const SPEED: PrizeCode = PrizeCode(12);
    pub const FULL_CHARGE: PrizeCode = PrizeCode(13);
    pub const SHUTDOWN: PrizeCode = PrizeCode(14);
    pub const MULTIFIRE: PrizeCode = PrizeCode(15);
    pub const PROXIMITY: PrizeCode = PrizeCode(16);
    pub const SUPER: PrizeCode = PrizeCode(17);
    pub const SHIELDS: PrizeCode = PrizeCode(18);
    pub const SHRAPNEL: PrizeCode = PrizeCode(19);
    pub const ANTIWARP: PrizeCode = PrizeCode(20);
    pub const REPEL: PrizeCode = PrizeCode(21);
    pub const BURST: PrizeCode = PrizeCode(22);
    pub const DECOY: PrizeCode = PrizeCode(23);
    pub const THOR: PrizeCode = PrizeCode(24);
    pub const MULTIPRIZE: PrizeCode = PrizeCode(25);
    pub const BRICK: PrizeCode = PrizeCode(26);
    pub const ROCKET: PrizeCode = PrizeCode(27);
    pub const PORTAL: PrizeCode = PrizeCode(28);

    /// Validates and wraps a raw prize code. Returns `None` outside `1..=28`.
    pub fn new(code: u8) -> Option<Self> {
        (1..=PRIZE_COUNT as u8).contains(&code).then_some(Self(code))
    }

    /// The raw one-based prize code.
    pub fn code(self) -> u8 {
        self.0
    }

    /// Zero-based index for use with per-prize arrays.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// Looks up a prize code by zero-based array index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::new(index as u8 + 1)
    }

    /// Iterates every valid prize code in ascending order.
    pub fn all() -> impl Iterator<Item = PrizeCode> {
        (1..=PRIZE_COUNT as u8).map(PrizeCode)
    }
}

impl std::fmt::Display for PrizeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Registration Scoping
// ============================================================================

/// Scope of a callback or listener registration.
///
/// `Global` registrations fire for every arena; `Arena` registrations fire
/// only for players in the named arena. Scopes are matched exactly during
/// deregistration: removing a `Global` registration never touches per-arena
/// ones, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaScope {
    /// Registered for all arenas.
    Global,
    /// Registered for a single arena.
    Arena(ArenaId),
}

impl ArenaScope {
    /// Whether a registration under this scope applies to `arena`.
    pub fn applies_to(self, arena: ArenaId) -> bool {
        match self {
            ArenaScope::Global => true,
            ArenaScope::Arena(scoped) => scoped == arena,
        }
    }
}
