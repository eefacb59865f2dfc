//! Site configuration from refdoc.toml

use crate::loader::RootSource;
use crate::toc::SCROLL_SPY_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default name of the configuration file
pub const CONFIG_FILE: &str = "refdoc.toml";

fn default_title() -> String {
    "Reference".to_string()
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    SCROLL_SPY_THRESHOLD
}

/// Main configuration from refdoc.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Page title
    #[serde(default = "default_title")]
    pub title: String,

    /// Whether description and cell text is auto-formatted unless a root or section says otherwise
    #[serde(default = "default_true")]
    pub auto_format: bool,

    /// Scroll-spy lookahead in pixels
    #[serde(default = "default_threshold")]
    pub scroll_threshold: f64,

    /// Rendering roots, in page order
    #[serde(default)]
    pub roots: Vec<RootConfig>,
}

/// One rendering root
///
/// Paths are relative to the directory holding refdoc.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Id of the root element
    pub id: String,

    /// Section spec document (required)
    pub sections: PathBuf,

    /// Formatting rules document
    pub formatting: Option<PathBuf>,

    /// Table definitions document
    pub tables: Option<PathBuf>,

    /// Overrides the site-wide auto-format default for this root
    pub auto_format: Option<bool>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            auto_format: true,
            scroll_threshold: SCROLL_SPY_THRESHOLD,
            roots: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a refdoc.toml file
    ///
    /// Root paths are resolved against the file's directory, and the result
    /// is validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(ConfigError::IoError)?;

        let mut config: SiteConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        let base = path.as_ref().parent().unwrap_or_else(|| Path::new(""));
        for root in &mut config.roots {
            root.sections = base.join(&root.sections);
            root.formatting = root.formatting.as_ref().map(|p| base.join(p));
            root.tables = root.tables.as_ref().map(|p| base.join(p));
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a refdoc.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        fs::write(&path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// A configuration with one root named `main`
    pub fn single_root(
        sections: PathBuf,
        formatting: Option<PathBuf>,
        tables: Option<PathBuf>,
    ) -> Self {
        Self {
            roots: vec![RootConfig {
                id: "main".to_string(),
                sections,
                formatting,
                tables,
                auto_format: None,
            }],
            ..Self::default()
        }
    }

    /// Check root ids and the threshold
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }

        let mut seen = HashSet::new();
        for root in &self.roots {
            if root.id.trim().is_empty() {
                return Err(ConfigError::EmptyRootId);
            }
            if !seen.insert(root.id.as_str()) {
                return Err(ConfigError::DuplicateRoot(root.id.clone()));
            }
        }

        if !self.scroll_threshold.is_finite() || self.scroll_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.scroll_threshold));
        }

        Ok(())
    }

    /// Loader inputs, one per root
    pub fn root_sources(&self) -> Vec<RootSource> {
        self.roots
            .iter()
            .map(|root| RootSource {
                id: root.id.clone(),
                sections: root.sections.clone(),
                formatting: root.formatting.clone(),
                tables: root.tables.clone(),
            })
            .collect()
    }

    /// Effective auto-format default of a root
    pub fn auto_format_for(&self, root_id: &str) -> bool {
        self.roots
            .iter()
            .find(|root| root.id == root_id)
            .and_then(|root| root.auto_format)
            .unwrap_or(self.auto_format)
    }
}

/// Errors that can occur when loading or saving site configuration
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum ConfigError {
    /// IO error when reading or writing file
    IoError(std::io::Error),

    /// Error parsing TOML
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    SerializeError(toml::ser::Error),

    /// No `[[roots]]` entries
    NoRoots,

    /// A root with a blank id
    EmptyRootId,

    /// Two roots share an id
    DuplicateRoot(String),

    /// Negative or non-finite scroll threshold
    InvalidThreshold(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "TOML serialize error: {}", e),
            ConfigError::NoRoots => write!(f, "no [[roots]] configured"),
            ConfigError::EmptyRootId => write!(f, "a root has an empty id"),
            ConfigError::DuplicateRoot(id) => write!(f, "root id '{}' is used more than once", id),
            ConfigError::InvalidThreshold(value) => {
                write!(f, "scroll_threshold must be a non-negative number, got {}", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_site_config_roundtrip() {
        let mut config = SiteConfig::single_root(
            PathBuf::from("sections.json"),
            Some(PathBuf::from("rules.json")),
            None,
        );
        config.title = "Frame Data".to_string();
        config.roots[0].auto_format = Some(false);

        // Serialize to TOML
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Deserialize back
        let parsed: SiteConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
        assert!(!parsed.auto_format_for("main"));
        assert!(parsed.auto_format_for("other"));
    }

    #[test]
    fn test_root_setting_overrides_site_default() {
        let mut config = SiteConfig::single_root(PathBuf::from("a.json"), None, None);
        config.roots.push(RootConfig {
            id: "opted-in".to_string(),
            auto_format: Some(true),
            ..config.roots[0].clone()
        });
        config.auto_format = false;

        assert!(!config.auto_format_for("main"));
        assert!(config.auto_format_for("opted-in"));
    }

    #[test]
    fn test_defaults_apply() {
        let config: SiteConfig = toml::from_str(
            r#"
            [[roots]]
            id = "moves"
            sections = "moves.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.title, "Reference");
        assert!(config.auto_format);
        assert_eq!(config.scroll_threshold, 80.0);
        assert_eq!(config.roots[0].formatting, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let config = SiteConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoRoots)));

        let mut config = SiteConfig::single_root(PathBuf::from("a.json"), None, None);
        config.roots.push(config.roots[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateRoot(id)) if id == "main"));

        let mut config = SiteConfig::single_root(PathBuf::from("a.json"), None, None);
        config.scroll_threshold = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_save_then_load_resolves_paths_against_config_dir() {
        // Arrange
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let path = dir.join(CONFIG_FILE);
        let mut config = SiteConfig::single_root(
            PathBuf::from("data/a.json"),
            None,
            Some(PathBuf::from("defs.json")),
        );
        config.title = "T".to_string();
        config.save(&path).unwrap();

        // Act
        let loaded = SiteConfig::load(&path).unwrap();

        // Assert
        assert_eq!(loaded.title, "T");
        let sources = loaded.root_sources();
        assert_eq!(sources[0].sections, dir.join("data/a.json"));
        assert_eq!(sources[0].tables, Some(dir.join("defs.json")));
        assert_eq!(sources[0].formatting, None);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "title = \"T\"\nroots = []\n").unwrap();
        assert!(matches!(SiteConfig::load(&path), Err(ConfigError::NoRoots)));
        assert!(matches!(
            SiteConfig::load(temp.path().join("absent.toml")),
            Err(ConfigError::IoError(_))
        ));
    }
}
