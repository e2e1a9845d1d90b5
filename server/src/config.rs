//! Tunables for a game session and its connections

use shared::{
    default_word_list, DEFAULT_MAX_ROUNDS, DEFAULT_ROUND_END_PAUSE_SECONDS, DEFAULT_ROUND_SECONDS,
    DEFAULT_SEND_QUEUE_CAPACITY,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Rounds played before the game ends
    pub max_rounds: u32,
    /// How long the drawer has before the round times out
    pub round_duration: Duration,
    /// How long `roundEnd` is shown before the next round starts
    pub round_end_pause: Duration,
    /// Pool the secret word is drawn from
    pub word_list: Vec<String>,
    /// Outbound frames buffered per connection before it counts as a slow consumer
    pub send_queue_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_duration: Duration::from_secs(DEFAULT_ROUND_SECONDS),
            round_end_pause: Duration::from_secs(DEFAULT_ROUND_END_PAUSE_SECONDS),
            word_list: default_word_list(),
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_rounds == 0 {
            return Err("max rounds must be at least 1".to_string());
        }
        if self.round_duration.is_zero() {
            return Err("round duration must be greater than zero".to_string());
        }
        if self.send_queue_capacity == 0 {
            return Err("send queue capacity must be at least 1".to_string());
        }
        if self.word_list.is_empty() {
            return Err("word list must contain at least one word".to_string());
        }
        if self.word_list.iter().any(|word| word.trim().is_empty()) {
            return Err("word list must not contain blank words".to_string());
        }
        Ok(())
    }

    /// Parses a comma separated word list, dropping empty entries.
    pub fn parse_word_list(words: &str) -> Vec<String> {
        words
            .split(',')
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.round_duration, Duration::from_secs(60));
        assert_eq!(config.round_end_pause, Duration::from_secs(5));
        assert_eq!(config.send_queue_capacity, 256);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = GameConfig {
            word_list: vec![" ".to_string()],
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            max_rounds: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            round_duration: Duration::ZERO,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            send_queue_capacity: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_word_list() {
        assert_eq!(
            GameConfig::parse_word_list("Jett, Sage,,  Kay O "),
            vec!["Jett", "Sage", "Kay O"]
        );
        assert!(GameConfig::parse_word_list(" , ").is_empty());
    }
}
