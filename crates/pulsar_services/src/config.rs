//! # TOML Arena Configuration
//!
//! An [`ArenaConfig`] implementation backed by TOML documents, one per
//! arena. Sections map to TOML tables and settings to integer values:
//!
//! ```toml
//! [Warbird]
//! MaxGuns = 1
//! MaximumSpeed = 2800
//!
//! [Bullet]
//! BulletDamageLevel = 200
//! ```
//!
//! Missing sections and settings fall back to the caller-provided default;
//! a present value of the wrong type is logged and treated as missing.

use crate::error::ServiceError;
use crate::services::ArenaConfig;
use crate::types::ArenaId;
use dashmap::DashMap;
use std::path::Path;
use tracing::warn;

/// Thread-safe TOML-backed arena configuration store.
#[derive(Debug, Default)]
pub struct TomlArenaConfig {
    arenas: DashMap<ArenaId, toml::Table>,
}

impl TomlArenaConfig {
    pub fn new() -> Self {
        Self { arenas: DashMap::new() }
    }

    /// Loads (or replaces) an arena's configuration from a TOML string.
    pub fn load_str(&self, arena: ArenaId, source: &str) -> Result<(), ServiceError> {
        let table: toml::Table = source.parse()?;
        self.arenas.insert(arena, table);
        Ok(())
    }

    /// Loads (or replaces) an arena's configuration from a TOML file.
    pub fn load_path(&self, arena: ArenaId, path: &Path) -> Result<(), ServiceError> {
        let source = std::fs::read_to_string(path)?;
        self.load_str(arena, &source)
    }

    /// Sets a single integer value, creating the arena and section as
    /// needed. Intended for host glue and tests.
    pub fn set_int(&self, arena: ArenaId, section: &str, setting: &str, value: i32) {
        let mut table = self.arenas.entry(arena).or_default();
        let section = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let Some(section) = section.as_table_mut() {
            section.insert(setting.to_string(), toml::Value::Integer(value as i64));
        }
    }
}

impl ArenaConfig for TomlArenaConfig {
    fn get_int(&self, arena: ArenaId, section: &str, setting: &str, default: i32) -> i32 {
        let Some(table) = self.arenas.get(&arena) else {
            return default;
        };
        let Some(value) = table
            .get(section)
            .and_then(|section| section.as_table())
            .and_then(|section| section.get(setting))
        else {
            return default;
        };

        match value.as_integer() {
            Some(value) => value as i32,
            None => {
                warn!(%arena, section, setting, "config value is not an integer; using default");
                default
            }
        }
    }
}
