//! # Configuration
//!
//! Session tunables with validation and TOML loading.
//!
//! Everything here has a sensible default; a host can run `SessionConfig
//! ::default()` unchanged. `validate()` returns every problem it finds so a
//! misconfigured lobby reports all of its issues at once.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::colour::PALETTE;
use crate::error::{ProtocolError, Result};

/// Default cap on simultaneous players.
pub const DEFAULT_MAX_PLAYERS: usize = 8;

/// How many turns ahead of the current one a command packet may be recorded
/// directly. Beyond this it is buffered.
pub const DEFAULT_TURN_WINDOW: u32 = 2;

/// How many distinct turns may sit in the ahead-of-window buffer before the
/// session is declared desynchronized.
pub const DEFAULT_PENDING_TURN_LIMIT: usize = 32;

/// Session-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Name of the map reported to joining peers.
    pub map_name: String,

    /// Maximum number of simultaneous players.
    pub max_players: usize,

    /// Turns ahead of `current_turn` accepted directly into collection state.
    pub turn_window: u32,

    /// Buffered-turn count that triggers a fatal desynchronization abort.
    pub pending_turn_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            map_name: String::from("default"),
            max_players: DEFAULT_MAX_PLAYERS,
            turn_window: DEFAULT_TURN_WINDOW,
            pending_turn_limit: DEFAULT_PENDING_TURN_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to open config file: {e}")))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Validate for common misconfigurations. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.map_name.is_empty() {
            errors.push("map name cannot be empty".to_string());
        }

        if self.max_players < 2 {
            errors.push("max players must be at least 2".to_string());
        } else if self.max_players > PALETTE.len() {
            errors.push(format!(
                "max players {} exceeds the {} available colours",
                self.max_players,
                PALETTE.len()
            ));
        }

        if self.turn_window == 0 {
            errors.push("turn window must be at least 1".to_string());
        }

        if self.pending_turn_limit == 0 {
            errors.push("pending turn limit must be greater than 0".to_string());
        } else if self.pending_turn_limit < self.turn_window as usize {
            errors.push("pending turn limit must not be smaller than the turn window".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}
