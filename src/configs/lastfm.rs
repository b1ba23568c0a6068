use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LastFmConfig {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_accounts_path")]
    pub accounts_path: String,
}

fn default_accounts_path() -> String {
    "lastfm_accounts.toml".to_string()
}
