use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_channel_size() -> usize {
    256
}

fn default_redis() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "enforce-shared-lb".to_string()
}

fn default_recycle_interval_secs() -> u64 {
    300
}

fn default_cloud_max() -> u32 {
    50
}

/// Top-level configuration, loaded from the JSON file named by `-c`/`--config`
/// (default `config.json`). Every field not present in the file falls back to
/// the default below (mirroring the original process's `default:"..."` tags).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_addr")]
    pub addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_channel_size")]
    pub channel_size: usize,

    #[serde(default = "default_redis")]
    pub redis: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Labels a service must carry (every key/value pair) to be eligible.
    /// Empty means no gate.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub auto_clean: bool,

    #[serde(default = "default_recycle_interval_secs")]
    pub recycle_interval_secs: u64,

    pub cloud: CloudConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            addr: default_addr(),
            port: default_port(),
            channel_size: default_channel_size(),
            redis: default_redis(),
            key_prefix: default_key_prefix(),
            labels: HashMap::new(),
            auto_clean: false,
            recycle_interval_secs: default_recycle_interval_secs(),
            cloud: CloudConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "default_cloud_name")]
    pub name: String,

    #[serde(default = "default_cloud_max")]
    pub max: u32,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub access_key_secret: String,

    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_cloud_name() -> String {
    "fake".to_string()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            name: default_cloud_name(),
            max: default_cloud_max(),
            endpoint: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            config: serde_json::Value::Null,
        }
    }
}

const SUPPORTED_CLOUDS: &[&str] = &["fake", "alibaba", "huawei", "tencent"];

impl Config {
    /// Loads a config from `path`, applies defaults for missing fields, and
    /// validates `cloud.name`. Any failure here is `ConfigFatal`: the process
    /// is not meant to run with a config it cannot trust.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ControllerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::ConfigFatal(format!("reading config file {}: {e}", path.display()))
        })?;
        let mut cfg: Config = serde_json::from_str(&raw).map_err(|e| {
            ControllerError::ConfigFatal(format!("parsing config file {}: {e}", path.display()))
        })?;
        cfg.normalize()?;
        Ok(cfg)
    }

    fn normalize(&mut self) -> Result<(), ControllerError> {
        if let Some(trimmed) = self.key_prefix.strip_suffix(':') {
            self.key_prefix = trimmed.to_string();
        }
        if !SUPPORTED_CLOUDS.contains(&self.cloud.name.as_str()) {
            return Err(ControllerError::ConfigFatal(format!(
                "unsupported cloud.name {:?}, expected one of {SUPPORTED_CLOUDS:?}",
                self.cloud.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_path::TempPath {
        tempfile_path::TempPath::with_contents(contents)
    }

    #[test]
    fn trims_trailing_colon_from_key_prefix() {
        let path = write_temp(
            r#"{"key_prefix": "myapp:", "cloud": {"name": "fake"}}"#,
        );
        let cfg = Config::load(path.as_path()).unwrap();
        assert_eq!(cfg.key_prefix, "myapp");
    }

    #[test]
    fn rejects_unsupported_cloud_name() {
        let path = write_temp(r#"{"cloud": {"name": "nope"}}"#);
        let err = Config::load(path.as_path()).unwrap_err();
        assert!(matches!(err, ControllerError::ConfigFatal(_)));
    }

    #[test]
    fn applies_defaults_for_missing_fields() {
        let path = write_temp(r#"{"cloud": {"name": "fake"}}"#);
        let cfg = Config::load(path.as_path()).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.channel_size, 256);
        assert!(!cfg.auto_clean);
    }

    /// Minimal same-crate helper so config tests don't need an extra
    /// dev-dependency just to write one temp file.
    mod tempfile_path {
        use std::io::Write;
        use std::path::{Path, PathBuf};

        pub struct TempPath(PathBuf);

        impl TempPath {
            pub fn with_contents(contents: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("lb-core-test-{}.json", std::process::id()));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                Self(path)
            }

            pub fn as_path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }
}
