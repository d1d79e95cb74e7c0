use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{ClassifyError, ModelKind};
use crate::data::prediction::TopKRange;

/// Environment variable pointing at a JSON config file.
pub const CONFIG_ENV: &str = "CVDASH_CONFIG";
/// Config file picked up from the working directory when present.
pub const CONFIG_FILE: &str = "cvdash.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("top_k range is invalid: need 1 <= min ({min}) <= initial ({initial}) <= max ({max})")]
    TopK { min: usize, initial: usize, max: usize },
    #[error(transparent)]
    Model(#[from] ClassifyError),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_image_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Dashboard settings. Every field has a default, so the file is optional
/// and may be partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub top_k: TopKRange,
    /// Kept as text so an unknown id is reported as a model error.
    pub default_model: String,
    /// Holds `<model id>.mpk` weight files and `labels.json`.
    pub models_dir: PathBuf,
    /// Replaces the bundled default image when set.
    pub default_image: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            top_k: TopKRange::default(),
            default_model: ModelKind::Xception.id().to_string(),
            models_dir: PathBuf::from("models"),
            default_image: None,
            fetch: FetchConfig::default(),
        }
    }
}

impl DashConfig {
    /// `$CVDASH_CONFIG`, else `./cvdash.json` if it exists, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            return Self::from_file(local);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: DashConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.top_k.is_valid() {
            return Err(ConfigError::TopK {
                min: self.top_k.min,
                initial: self.top_k.initial,
                max: self.top_k.max,
            });
        }
        self.model()?;
        Ok(())
    }

    /// The model selected at start-up.
    pub fn model(&self) -> Result<ModelKind, ClassifyError> {
        self.default_model.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DashConfig::default();
        config.validate().unwrap();
        assert_eq!(config.model().unwrap(), ModelKind::Xception);
        assert_eq!(config.top_k, TopKRange { min: 3, max: 20, initial: 5 });
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = DashConfig::from_json(r#"{ "default_model": "resnet50", "top_k": { "max": 10 } }"#)
            .unwrap();
        assert_eq!(config.model().unwrap(), ModelKind::ResNet50);
        assert_eq!(config.top_k.max, 10);
        assert_eq!(config.top_k.min, 3);
        assert_eq!(config.models_dir, PathBuf::from("models"));
    }

    #[test]
    fn unknown_default_model_is_rejected() {
        let err = DashConfig::from_json(r#"{ "default_model": "alexnet" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Model(ClassifyError::UnknownModel(_))));
    }

    #[test]
    fn inverted_top_k_range_is_rejected() {
        let err = DashConfig::from_json(r#"{ "top_k": { "min": 8, "max": 4, "initial": 5 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::TopK { min: 8, .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            DashConfig::from_json("{ nope"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
