use std::collections::HashMap;

use serde::Deserialize;
use tracing::info;

use crate::common::types::{AnyResult, UserId};

/// A Discord user's linked Last.fm account.
///
/// Session keys come from Last.fm's web auth flow, which runs outside this
/// process; this store only reads the result.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedAccount {
    pub username: String,
    pub session_key: String,
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    account: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    user_id: u64,
    username: String,
    session_key: String,
}

/// Read-only registry of linked accounts, loaded once at startup.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: HashMap<UserId, LinkedAccount>,
}

impl AccountStore {
    pub fn load(path: &str) -> AnyResult<Self> {
        if !std::path::Path::new(path).exists() {
            info!("No Last.fm accounts file at {}; scrobbling disabled for everyone", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let store = Self::from_str(&contents)?;
        info!("Loaded {} linked Last.fm account(s)", store.len());
        Ok(store)
    }

    pub fn from_str(contents: &str) -> AnyResult<Self> {
        let file: AccountsFile = toml::from_str(contents)?;
        let accounts = file
            .account
            .into_iter()
            .map(|entry| {
                (
                    UserId(entry.user_id),
                    LinkedAccount {
                        username: entry.username,
                        session_key: entry.session_key,
                    },
                )
            })
            .collect();
        Ok(Self { accounts })
    }

    pub fn get(&self, user_id: UserId) -> Option<&LinkedAccount> {
        self.accounts.get(&user_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
