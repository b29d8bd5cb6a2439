use std::path::Path;

use cellar_types::InstanceId;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Environment variable overriding [`ClientConfig::instance_id`].
pub const ENV_INSTANCE_ID: &str = "CELLAR_INSTANCE_ID";
/// Environment variable overriding [`ClientConfig::memory_limit`].
pub const ENV_MEMORY_LIMIT: &str = "CELLAR_MEMORY_LIMIT";
/// Environment variable overriding [`ClientConfig::name_prefix`].
pub const ENV_NAME_PREFIX: &str = "CELLAR_NAME_PREFIX";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub instance_id: InstanceId,
    /// Upper bound on bytes held by blobs, in bytes.
    pub memory_limit: u64,
    /// Namespace prepended to every name on `put_name`/`get_name`/`drop_name`.
    pub name_prefix: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            instance_id: InstanceId(0),
            memory_limit: 256 * 1024 * 1024,
            name_prefix: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> ClientResult<Self> {
        toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by the `CELLAR_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `CELLAR_*` variable names.
    pub fn with_overrides<F>(mut self, lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_INSTANCE_ID) {
            let id = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ClientError::Config(format!("{ENV_INSTANCE_ID}: {e}")))?;
            self.instance_id = InstanceId(id);
        }
        if let Some(raw) = lookup(ENV_MEMORY_LIMIT) {
            self.memory_limit = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ClientError::Config(format!("{ENV_MEMORY_LIMIT}: {e}")))?;
        }
        if let Some(prefix) = lookup(ENV_NAME_PREFIX) {
            self.name_prefix = (!prefix.is_empty()).then_some(prefix);
        }
        Ok(self)
    }

    /// The fully qualified form of a user-supplied name.
    pub fn qualify(&self, name: &str) -> String {
        match &self.name_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config() {
        let c = ClientConfig::default();
        assert_eq!(c.instance_id, InstanceId(0));
        assert_eq!(c.memory_limit, 256 * 1024 * 1024);
        assert!(c.name_prefix.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ClientConfig::from_toml_str("memory_limit = 1024").unwrap();
        assert_eq!(c.memory_limit, 1024);
        assert_eq!(c.instance_id, InstanceId(0));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = ClientConfig::from_toml_str("memory_limit = \"lots\"").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "instance_id = 3\nname_prefix = \"prod/\"").unwrap();
        let c = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(c.instance_id, InstanceId(3));
        assert_eq!(c.name_prefix.as_deref(), Some("prod/"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[test]
    fn overrides_replace_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_INSTANCE_ID, "7"),
            (ENV_MEMORY_LIMIT, " 4096 "),
            (ENV_NAME_PREFIX, "ns/"),
        ]
        .into_iter()
        .collect();
        let c = ClientConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.instance_id, InstanceId(7));
        assert_eq!(c.memory_limit, 4096);
        assert_eq!(c.qualify("x"), "ns/x");
    }

    #[test]
    fn empty_prefix_override_clears_prefix() {
        let c = ClientConfig {
            name_prefix: Some("old/".into()),
            ..ClientConfig::default()
        }
        .with_overrides(|k| (k == ENV_NAME_PREFIX).then(String::new))
        .unwrap();
        assert_eq!(c.qualify("x"), "x");
    }

    #[test]
    fn unparsable_override_is_rejected() {
        let err = ClientConfig::default()
            .with_overrides(|k| (k == ENV_MEMORY_LIMIT).then(|| "big".to_string()))
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.starts_with(ENV_MEMORY_LIMIT)));
    }
}
