//! Site configuration.

use issuefields_core::SiteSettings;
use serde::{Deserialize, Serialize};

/// Site configuration stored in `.issuefields/config.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub site: SiteInfo,

    /// Application options read by the fields.
    #[serde(default)]
    pub settings: SiteSettings,
}

const fn default_version() -> u32 {
    1
}

/// Descriptive site settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            site: SiteInfo::default(),
            settings: SiteSettings::default(),
        }
    }
}

impl SiteConfig {
    /// Create a config with the given site name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            site: SiteInfo { name: Some(name.into()) },
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SiteSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = "settings:\n  time_tracking_legacy_mode: true\n  issue_linking: false\n";
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.site.name, None);
        assert!(config.settings.time_tracking);
        assert!(config.settings.time_tracking_legacy_mode);
        assert!(!config.settings.issue_linking);
    }

    #[test]
    fn test_empty_config() {
        let config: SiteConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn test_named_config_survives_yaml() {
        let config = SiteConfig::new("Acme");
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SiteConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
