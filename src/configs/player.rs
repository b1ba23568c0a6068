use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Voice connect attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Fixed delay between voice connect attempts.
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,
    /// Period of the idle-channel sweep.
    #[serde(default = "default_idle_sweep_secs")]
    pub idle_sweep_secs: u64,
    /// How long a channel must stay empty before the bot leaves.
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
            idle_sweep_secs: default_idle_sweep_secs(),
            idle_threshold_secs: default_idle_threshold_secs(),
        }
    }
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_connect_backoff_ms() -> u64 {
    500
}

fn default_idle_sweep_secs() -> u64 {
    5
}

fn default_idle_threshold_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: PlayerConfig = toml::from_str("").unwrap();
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.connect_backoff_ms, 500);
        assert_eq!(config.idle_sweep_secs, 5);
        assert_eq!(config.idle_threshold_secs, 10);
    }
}
