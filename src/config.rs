/// Collector endpoint used when no override is configured.
pub const DEFAULT_COLLECTOR_URL: &str = match option_env!("MISSION_COLLECTOR_URL") {
    Some(url) => url,
    None => "/api/submit-test",
};

pub const DEFAULT_COMPLETION_KEY: &str = "agent7b_mission_completed";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("collector url must not be empty")]
    EmptyCollectorUrl,
    #[error("completion key must not be empty")]
    EmptyCompletionKey,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct MissionConfig {
    pub collector_url: String,
    /// Storage key of the completion flag.
    pub completion_key: String,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            completion_key: DEFAULT_COMPLETION_KEY.to_string(),
        }
    }
}

impl MissionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json_str(&data)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.collector_url.trim().is_empty() {
            return Err(ConfigError::EmptyCollectorUrl);
        }
        if self.completion_key.trim().is_empty() {
            return Err(ConfigError::EmptyCompletionKey);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = MissionConfig::from_json_str(r#"{ "collector_url": "https://collector.test/results" }"#)
            .expect("partial config should parse");

        assert_eq!(config.collector_url, "https://collector.test/results");
        assert_eq!(config.completion_key, DEFAULT_COMPLETION_KEY);
    }

    #[test]
    fn empty_key_is_rejected() {
        let error = MissionConfig::from_json_str(r#"{ "completion_key": " " }"#)
            .expect_err("blank key should be rejected");

        assert!(matches!(error, ConfigError::EmptyCompletionKey));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = MissionConfig::from_json_str("[").expect_err("truncated json");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn reads_config_file() {
        let root = tempfile::tempdir().expect("temporary directory should be created");
        let path = root.path().join("mission.json");
        std::fs::write(&path, r#"{ "completion_key": "k" }"#).expect("config should be written");

        let config = MissionConfig::from_file(&path).expect("config should load");
        assert_eq!(config.completion_key, "k");
        assert_eq!(config.collector_url, DEFAULT_COLLECTOR_URL);
    }
}
