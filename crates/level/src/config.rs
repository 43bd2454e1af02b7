use std::path::Path;

use serde::{Deserialize, Serialize};
use trellis_stream::TreeConfig;

use crate::error::ConfigError;

/// Tunables of the activation subsystem for one level.
///
/// Loaded from YAML or JSON; every field is optional and falls back to the
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Depth of the entity tree leaves.
    pub tree_height: u32,
    pub min_world_width: i32,
    pub min_world_height: i32,
    pub default_world_width: i32,
    pub default_world_height: i32,
    /// Seed for entity ids. Unset means a random seed per level.
    pub id_seed: Option<u64>,
    /// Samples kept by the partition refresh timer.
    pub timer_capacity: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        let tree = TreeConfig::default();
        Self {
            tree_height: tree.height,
            min_world_width: tree.min_world_width,
            min_world_height: tree.min_world_height,
            default_world_width: tree.world_width,
            default_world_height: tree.world_height,
            id_seed: None,
            timer_capacity: 120,
        }
    }
}

impl ActivationConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Leaves must be at least one unit wide at the minimum world size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tree_height == 0 || self.tree_height > 16 {
            return Err(ConfigError::Invalid(format!(
                "tree_height must be in 1..=16, got {}",
                self.tree_height
            )));
        }
        let cells = 1i64 << self.tree_height;
        if i64::from(self.min_world_width) < cells || i64::from(self.min_world_height) < cells {
            return Err(ConfigError::Invalid(format!(
                "minimum world {}x{} is too small for a tree of height {}",
                self.min_world_width, self.min_world_height, self.tree_height
            )));
        }
        if self.timer_capacity == 0 {
            return Err(ConfigError::Invalid("timer_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            height: self.tree_height,
            min_world_width: self.min_world_width,
            min_world_height: self.min_world_height,
            world_width: self.default_world_width,
            world_height: self.default_world_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ActivationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tree_height, 5);
        assert_eq!(config.min_world_width, 8192);
        assert_eq!(config.min_world_height, 4096);
        assert_eq!(config.default_world_width, 32768);
        assert_eq!(config.default_world_height, 16384);
        assert_eq!(config.id_seed, None);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ActivationConfig::from_yaml_str("tree_height: 4\nid_seed: 7\n").unwrap();
        assert_eq!(config.tree_height, 4);
        assert_eq!(config.id_seed, Some(7));
        assert_eq!(config.min_world_width, 8192);
    }

    #[test]
    fn json_is_accepted() {
        let config = ActivationConfig::from_json_str(r#"{"min_world_width": 16384}"#).unwrap();
        assert_eq!(config.min_world_width, 16384);
    }

    #[test]
    fn rejects_zero_height() {
        let err = ActivationConfig::from_yaml_str("tree_height: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_world_smaller_than_leaves() {
        let err =
            ActivationConfig::from_yaml_str("tree_height: 8\nmin_world_width: 100\n").unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activation.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "tree_height: 3").unwrap();
        drop(file);
        assert_eq!(ActivationConfig::load(&path).unwrap().tree_height, 3);

        let bad = dir.path().join("activation.toml");
        std::fs::write(&bad, "tree_height = 3").unwrap();
        assert!(matches!(
            ActivationConfig::load(&bad),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn tree_config_mirrors_fields() {
        let config = ActivationConfig {
            tree_height: 3,
            ..ActivationConfig::default()
        };
        let tree = config.tree_config();
        assert_eq!(tree.height, 3);
        assert_eq!(tree.world_width, 32768);
    }
}
