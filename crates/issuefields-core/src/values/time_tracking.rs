//! Submitted time tracking values.

use serde::{Deserialize, Serialize};

use super::params::is_blank;

/// Which estimate an edit targets when only one is on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSubField {
    OriginalEstimate,
    RemainingEstimate,
}

impl TargetSubField {
    /// Parse the `timetracking_targetsubfield` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "timetracking_originalestimate" | "originalestimate" => Some(Self::OriginalEstimate),
            "timetracking_remainingestimate" | "remainingestimate" => Some(Self::RemainingEstimate),
            _ => None,
        }
    }
}

/// Time tracking input, in display form and, once converted, milliseconds.
///
/// Legacy mode uses the single `estimate`; modern mode uses the original
/// and remaining pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTrackingValue {
    pub legacy_mode: bool,
    pub create_issue: bool,
    pub log_work_activated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sub_field: Option<TargetSubField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_estimate_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_estimate_display: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_estimate: Option<i64>,
}

impl TimeTrackingValue {
    #[must_use]
    pub fn legacy(estimate_display: Option<String>) -> Self {
        Self {
            legacy_mode: true,
            estimate_display,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn modern(original_display: Option<String>, remaining_display: Option<String>) -> Self {
        Self {
            original_estimate_display: original_display,
            remaining_estimate_display: remaining_display,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_create_issue(mut self, create_issue: bool) -> Self {
        self.create_issue = create_issue;
        self
    }

    #[must_use]
    pub const fn with_log_work_activated(mut self, activated: bool) -> Self {
        self.log_work_activated = activated;
        self
    }

    #[must_use]
    pub const fn with_target_sub_field(mut self, target: Option<TargetSubField>) -> Self {
        self.target_sub_field = target;
        self
    }

    #[must_use]
    pub fn with_original_display(mut self, display: Option<String>) -> Self {
        self.original_estimate_display = display;
        self
    }

    #[must_use]
    pub fn with_remaining_display(mut self, display: Option<String>) -> Self {
        self.remaining_estimate_display = display;
        self
    }

    #[must_use]
    pub const fn with_estimates(
        mut self,
        original: Option<i64>,
        remaining: Option<i64>,
    ) -> Self {
        self.original_estimate = original;
        self.remaining_estimate = remaining;
        self
    }

    #[must_use]
    pub const fn with_estimate(mut self, estimate: Option<i64>) -> Self {
        self.estimate = estimate;
        self
    }

    /// Whether this edit should touch the original estimate.
    #[must_use]
    pub fn targets_original(&self) -> bool {
        self.target_sub_field != Some(TargetSubField::RemainingEstimate)
    }

    /// Whether this edit should touch the remaining estimate.
    #[must_use]
    pub fn targets_remaining(&self) -> bool {
        self.target_sub_field != Some(TargetSubField::OriginalEstimate)
    }

    /// Whether no estimate was submitted at all.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        if self.legacy_mode {
            is_blank(self.estimate_display.as_deref())
        } else {
            is_blank(self.original_estimate_display.as_deref())
                && is_blank(self.remaining_estimate_display.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_sub_field_parse() {
        assert_eq!(
            TargetSubField::parse("timetracking_originalestimate"),
            Some(TargetSubField::OriginalEstimate)
        );
        assert_eq!(TargetSubField::parse("bogus"), None);
    }

    #[test]
    fn test_targets_both_without_sub_field() {
        let value = TimeTrackingValue::modern(Some("1h".into()), None);
        assert!(value.targets_original());
        assert!(value.targets_remaining());

        let value = value.with_target_sub_field(Some(TargetSubField::RemainingEstimate));
        assert!(!value.targets_original());
        assert!(value.targets_remaining());
    }

    #[test]
    fn test_is_blank_by_mode() {
        assert!(TimeTrackingValue::legacy(Some(" ".into())).is_blank());
        assert!(!TimeTrackingValue::legacy(Some("2h".into())).is_blank());
        assert!(TimeTrackingValue::modern(None, Some(String::new())).is_blank());
        assert!(!TimeTrackingValue::modern(None, Some("3d".into())).is_blank());
    }
}
