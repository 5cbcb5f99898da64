//! Site-wide application options read by fields.

use serde::{Deserialize, Serialize};

use crate::duration::DurationFormatter;

/// Application options. Loaded from the site configuration file; every
/// option has a default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "enabled")]
    pub time_tracking: bool,

    /// Single-estimate time tracking instead of original + remaining.
    #[serde(default)]
    pub time_tracking_legacy_mode: bool,

    #[serde(default)]
    pub working_time: DurationFormatter,

    #[serde(default = "enabled")]
    pub allow_unassigned: bool,

    #[serde(default = "enabled")]
    pub voting: bool,

    #[serde(default = "enabled")]
    pub watching: bool,

    #[serde(default = "enabled")]
    pub subtasks: bool,

    #[serde(default = "enabled")]
    pub issue_linking: bool,

    /// Copy the transition comment into the work log description.
    #[serde(default = "enabled")]
    pub copy_comment_to_work_description: bool,

    #[serde(default = "enabled")]
    pub comment_group_visibility: bool,

    #[serde(default = "enabled")]
    pub comment_role_visibility: bool,

    /// Resolution id preselected on transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_resolution: Option<String>,
}

const fn enabled() -> bool {
    true
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            time_tracking: true,
            time_tracking_legacy_mode: false,
            working_time: DurationFormatter::default(),
            allow_unassigned: true,
            voting: true,
            watching: true,
            subtasks: true,
            issue_linking: true,
            copy_comment_to_work_description: true,
            comment_group_visibility: true,
            comment_role_visibility: true,
            default_resolution: None,
        }
    }
}

impl SiteSettings {
    #[must_use]
    pub const fn with_time_tracking(mut self, enabled: bool) -> Self {
        self.time_tracking = enabled;
        self
    }

    #[must_use]
    pub const fn with_legacy_mode(mut self, legacy: bool) -> Self {
        self.time_tracking_legacy_mode = legacy;
        self
    }

    #[must_use]
    pub const fn with_allow_unassigned(mut self, allow: bool) -> Self {
        self.allow_unassigned = allow;
        self
    }

    #[must_use]
    pub const fn with_subtasks(mut self, enabled: bool) -> Self {
        self.subtasks = enabled;
        self
    }

    #[must_use]
    pub const fn with_issue_linking(mut self, enabled: bool) -> Self {
        self.issue_linking = enabled;
        self
    }

    #[must_use]
    pub const fn with_voting(mut self, enabled: bool) -> Self {
        self.voting = enabled;
        self
    }

    #[must_use]
    pub const fn with_watching(mut self, enabled: bool) -> Self {
        self.watching = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_features() {
        let settings = SiteSettings::default();
        assert!(settings.time_tracking);
        assert!(!settings.time_tracking_legacy_mode);
        assert!(settings.allow_unassigned);
        assert!((settings.working_time.hours_per_day - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: SiteSettings =
            serde_json::from_str(r#"{"time_tracking_legacy_mode": true, "voting": false}"#).unwrap();

        assert!(settings.time_tracking_legacy_mode);
        assert!(!settings.voting);
        assert!(settings.watching);
        assert!(settings.default_resolution.is_none());
    }
}
