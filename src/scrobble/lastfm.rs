use std::collections::BTreeMap;

use async_trait::async_trait;
use md5::{Digest, Md5};
use tracing::debug;

use crate::{
    common::errors::LastFmError,
    configs::LastFmConfig,
    scrobble::{Listen, ProfileService},
};

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";

/// Client for the Last.fm web service, using per-user session keys.
pub struct LastFmClient {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
}

impl LastFmClient {
    pub fn new(client: reqwest::Client, config: &LastFmConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    /// Compute the request signature: md5 of the params concatenated in
    /// alphabetical key order, followed by the shared secret. `format` is
    /// excluded from the signature by API contract.
    fn api_sig(params: &BTreeMap<String, String>, secret: &str) -> String {
        let mut payload = String::new();
        for (key, value) in params {
            payload.push_str(key);
            payload.push_str(value);
        }
        payload.push_str(secret);
        hex::encode(Md5::digest(payload.as_bytes()))
    }

    fn base_params(&self, method: &str, session_key: &str, listen: &Listen) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("method".into(), method.to_string());
        params.insert("api_key".into(), self.api_key.clone());
        params.insert("sk".into(), session_key.to_string());
        params.insert("artist".into(), listen.artist.clone());
        params.insert("track".into(), listen.track.clone());
        if let Some(album) = &listen.album {
            params.insert("album".into(), album.clone());
        }
        if let Some(duration) = listen.duration_secs {
            params.insert("duration".into(), duration.to_string());
        }
        params
    }

    async fn call(&self, mut params: BTreeMap<String, String>) -> Result<(), LastFmError> {
        let sig = Self::api_sig(&params, &self.api_secret);
        params.insert("api_sig".into(), sig);
        params.insert("format".into(), "json".into());

        let response = self.client.post(API_ROOT).form(&params).send().await?;
        let body: serde_json::Value = response.json().await?;

        if let Some(code) = body.get("error").and_then(|v| v.as_i64()) {
            let message = body
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(LastFmError::Api { code, message });
        }

        debug!("lastfm call ok: {}", params["method"]);
        Ok(())
    }
}

#[async_trait]
impl ProfileService for LastFmClient {
    async fn update_now_playing(
        &self,
        session_key: &str,
        listen: &Listen,
    ) -> Result<(), LastFmError> {
        let params = self.base_params("track.updateNowPlaying", session_key, listen);
        self.call(params).await
    }

    async fn scrobble(
        &self,
        session_key: &str,
        listen: &Listen,
        started_at: u64,
    ) -> Result<(), LastFmError> {
        let mut params = self.base_params("track.scrobble", session_key, listen);
        params.insert("timestamp".into(), started_at.to_string());
        self.call(params).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
