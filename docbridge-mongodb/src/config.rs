//! Connection settings for the MongoDB backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Connection settings, typically deserialized from the host application's config.
///
/// ```ignore
/// let config: MongoDbConfig = serde_json::from_str(r#"{
///     "uri": "mongodb://localhost:27017",
///     "database": "accounts"
/// }"#)?;
/// let store = MongoDbStoreBuilder::from_config(config).build().await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDbConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    /// Database holding every collection of the store.
    pub database: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Reported to the server in the connection handshake.
    #[serde(default)]
    pub app_name: Option<String>,
}

impl MongoDbConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            app_name: None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
