//! Game configuration.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Per-game settings. The defaults are a standard two-player game.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct GameConfig {
    /// One entry per player, in turn order.
    pub player_names: Vec<String>,
    pub starting_life: i32,
    /// Poison counters at which a player loses.
    pub poison_limit: u32,
    pub land_plays_per_turn: u32,
    /// Upper bound on state-based action passes in one check before the
    /// engine gives up.
    pub max_sba_passes: u32,
    /// The player who goes first skips the draw of their first turn.
    pub skip_first_draw: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_names: vec!["Alice".to_string(), "Bob".to_string()],
            starting_life: 20,
            poison_limit: 10,
            land_plays_per_turn: 1,
            max_sba_passes: 64,
            skip_first_draw: true,
        }
    }
}

impl GameConfig {
    pub fn with_players<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            player_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player_names.len() < 2 {
            return Err(ConfigError::TooFewPlayers(self.player_names.len()));
        }
        if self.player_names.len() > u8::MAX as usize {
            return Err(ConfigError::TooManyPlayers(self.player_names.len()));
        }
        if self.max_sba_passes == 0 {
            return Err(ConfigError::NoSbaPasses);
        }
        Ok(())
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    #[cfg(feature = "serialization")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a game needs at least two players, got {0}")]
    TooFewPlayers(usize),

    #[error("too many players: {0}")]
    TooManyPlayers(usize),

    #[error("max_sba_passes must be at least 1")]
    NoSbaPasses,

    #[cfg(feature = "serialization")]
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.starting_life, 20);
        assert_eq!(config.poison_limit, 10);
        assert_eq!(config.land_plays_per_turn, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_single_player() {
        let config = GameConfig::with_players(["Solo"]);
        assert!(matches!(config.validate(), Err(ConfigError::TooFewPlayers(1))));
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            GameConfig::from_json(r#"{"player_names": ["A", "B", "C"], "starting_life": 30}"#)
                .unwrap();
        assert_eq!(config.player_names.len(), 3);
        assert_eq!(config.starting_life, 30);
        assert_eq!(config.poison_limit, 10);

        assert!(GameConfig::from_json("{not json").is_err());
    }
}
