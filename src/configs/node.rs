use serde::{Deserialize, Serialize};

/// Connection details for the Lavalink-compatible audio node.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub secure: bool,
}

impl NodeConfig {
    pub fn rest_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/v4/websocket", scheme, self.host, self.port)
    }
}
