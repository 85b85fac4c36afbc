#[cfg(unix)] use xdg::BaseDirectories;
use crate::prelude::*;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Wheel(#[from] wheel::Error),
    #[cfg(unix)]
    #[error("missing config file")]
    Missing,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    pub(crate) challonge: ConfigChallonge,
    /// API key for start.gg, see <https://developer.start.gg/docs/authentication>
    pub(crate) startgg: String,
    pub(crate) secret_key: String,
    #[serde(default)]
    pub(crate) database: Option<ConfigDatabase>,
    #[serde(default = "default_http_timeout_secs")]
    pub(crate) http_timeout_secs: u64,
    /// Tier assigned to newly imported tournaments. Defaults to the tier with the lowest ID.
    #[serde(default)]
    pub(crate) default_tier: Option<i64>,
}

fn default_http_timeout_secs() -> u64 { 10 }

impl Config {
    pub(crate) async fn load() -> Result<Self, Error> {
        #[cfg(unix)] {
            if let Some(config_path) = BaseDirectories::new().find_config_file(if Environment::default().is_dev() { "tourney-tracker-dev.json" } else { "tourney-tracker.json" }) {
                Ok(wheel::fs::read_json(config_path).await?)
            } else {
                Err(Error::Missing)
            }
        }
        #[cfg(windows)] {
            Ok(wheel::fs::read_json("cfg/tourney-tracker.json").await?)
        }
    }

    pub(crate) fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Credentials for the Challonge v1 API, which uses HTTP basic auth.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigChallonge {
    pub(crate) username: String,
    pub(crate) api_key: String,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigDatabase {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let config = serde_json::from_str::<Config>(r#"{
            "challonge": {"username": "ssc", "apiKey": "hunter2"},
            "startgg": "key",
            "secretKey": "c2VjcmV0"
        }"#).unwrap();
        assert_eq!(config.challonge.username, "ssc");
        assert_eq!(config.challonge.api_key, "hunter2");
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert!(config.database.is_none());
        assert!(config.default_tier.is_none());
    }

    #[test]
    fn database_overrides() {
        let config = serde_json::from_str::<Config>(r#"{
            "challonge": {"username": "ssc", "apiKey": "hunter2"},
            "startgg": "key",
            "secretKey": "c2VjcmV0",
            "database": {"host": "db.internal", "port": 5433},
            "httpTimeoutSecs": 30,
            "defaultTier": 2
        }"#).unwrap();
        let database = config.database.as_ref().unwrap();
        assert_eq!(database.host.as_deref(), Some("db.internal"));
        assert_eq!(database.port, Some(5433));
        assert!(database.username.is_none());
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.default_tier, Some(2));
    }
}
