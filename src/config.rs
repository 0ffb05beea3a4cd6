//! Editor configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config:
//!
//! ```toml
//! rotation_step = 0.01      # radians per key press
//! translation_step = 0.01
//! dimension_step = 0.01
//! min_dimension = 0.001
//! multi_select = false
//!
//! [storage]
//! root = "public/assets"
//! refined_suffix = "_3dbox_refined.json"
//! marker_file = "deleted.json"
//! ```

use crate::{
    error::{AnnotationError, AnnotationResult},
    obb::DEFAULT_MIN_DIMENSION,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub rotation_step: f64,
    pub translation_step: f64,
    pub dimension_step: f64,
    /// Floor applied to every dimension edit.
    pub min_dimension: f64,
    /// Allow more than one box to be selected and edited together.
    pub multi_select: bool,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub refined_suffix: String,
    pub marker_file: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            rotation_step: 0.01,
            translation_step: 0.01,
            dimension_step: 0.01,
            min_dimension: DEFAULT_MIN_DIMENSION,
            multi_select: false,
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("public/assets"),
            refined_suffix: "_3dbox_refined.json".to_string(),
            marker_file: "deleted.json".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> AnnotationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| AnnotationError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_toml(&content).map_err(|err| match err {
            AnnotationError::Config { message, .. } => AnnotationError::Config {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> AnnotationResult<Self> {
        let config: Self = toml::from_str(content).map_err(|err| AnnotationError::Config {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnnotationResult<()> {
        let positive = [
            ("rotation_step", self.rotation_step),
            ("translation_step", self.translation_step),
            ("dimension_step", self.dimension_step),
            ("min_dimension", self.min_dimension),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnnotationError::Config {
                    path: PathBuf::new(),
                    message: format!("{name} must be positive, got {value}"),
                });
            }
        }
        if self.storage.refined_suffix.is_empty() || self.storage.marker_file.is_empty() {
            return Err(AnnotationError::Config {
                path: PathBuf::new(),
                message: "storage file names must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EditorConfig::from_toml("").unwrap(), EditorConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EditorConfig::from_toml(
            "rotation_step = 0.05\nmulti_select = true\n[storage]\nroot = \"/data\"\n",
        )
        .unwrap();
        assert_eq!(config.rotation_step, 0.05);
        assert!(config.multi_select);
        assert_eq!(config.storage.root, PathBuf::from("/data"));
        assert_eq!(config.storage.refined_suffix, "_3dbox_refined.json");
    }

    #[test]
    fn rejects_non_positive_steps() {
        assert!(EditorConfig::from_toml("dimension_step = 0.0").is_err());
        assert!(EditorConfig::from_toml("min_dimension = -1.0").is_err());
    }

    #[test]
    fn missing_file_names_path() {
        let err = EditorConfig::from_file("/nonexistent/editor.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/editor.toml"));
    }
}
