//! Error types for the spawner plugin.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpawnerError {
    #[error("setting {section}.{setting} has no override key")]
    UnknownSetting { section: String, setting: String },

    #[error("frequency {0} is outside the legal range")]
    InvalidFrequency(u16),
}
