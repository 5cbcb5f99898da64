//! Submitted work log values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comment::Visibility;
use super::params::is_blank;

/// How logging work changes the remaining estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustEstimate {
    /// Reduce the remaining estimate by the time logged.
    #[default]
    Auto,
    /// Leave the remaining estimate untouched.
    Leave,
    /// Replace the remaining estimate with a new value.
    New,
    /// Reduce the remaining estimate by an explicit amount.
    Manual,
}

impl AdjustEstimate {
    /// Parse `worklog_adjustEstimate`; unknown values fall back to auto.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("leave") => Self::Leave,
            Some("new") => Self::New,
            Some("manual") => Self::Manual,
            _ => Self::Auto,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Leave => "leave",
            Self::New => "new",
            Self::Manual => "manual",
        }
    }
}

/// A work log entry as validated by the work log service, ready to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogResult {
    pub issue_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worklog_id: Option<i64>,
    pub time_spent: i64,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub adjust_estimate: AdjustEstimate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_amount: Option<i64>,
}

/// Work log parameters as held during an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogValue {
    pub activated: bool,
    pub create_issue: bool,
    pub edit_issue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worklog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_logged: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default)]
    pub adjust_estimate: AdjustEstimate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_estimate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Filled by validation when the service accepted the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WorklogResult>,
}

impl WorklogValue {
    /// An inactive value that only remembers the operation kind.
    #[must_use]
    pub fn inactive(create_issue: bool, edit_issue: bool) -> Self {
        Self {
            create_issue,
            edit_issue,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn activated(time_logged: impl Into<String>) -> Self {
        Self {
            activated: true,
            time_logged: Some(time_logged.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    #[must_use]
    pub const fn with_adjust_estimate(mut self, mode: AdjustEstimate) -> Self {
        self.adjust_estimate = mode;
        self
    }

    #[must_use]
    pub fn with_new_estimate(mut self, estimate: impl Into<String>) -> Self {
        self.new_estimate = Some(estimate.into());
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: Option<WorklogResult>) -> Self {
        self.result = result;
        self
    }

    /// Whether the user entered anything worth validating.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !is_blank(self.time_logged.as_deref())
            || !is_blank(self.adjustment_amount.as_deref())
            || !is_blank(self.new_estimate.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_estimate_parse() {
        assert_eq!(AdjustEstimate::parse(Some("NEW")), AdjustEstimate::New);
        assert_eq!(AdjustEstimate::parse(Some("leave")), AdjustEstimate::Leave);
        assert_eq!(AdjustEstimate::parse(Some("bogus")), AdjustEstimate::Auto);
        assert_eq!(AdjustEstimate::parse(None), AdjustEstimate::Auto);
        assert_eq!(AdjustEstimate::Manual.as_str(), "manual");
    }

    #[test]
    fn test_is_set() {
        assert!(!WorklogValue::default().is_set());
        assert!(WorklogValue::activated("1h").is_set());

        let only_estimate = WorklogValue {
            new_estimate: Some("2h".into()),
            ..WorklogValue::default()
        };
        assert!(only_estimate.is_set());
    }

    #[test]
    fn test_inactive_keeps_operation_flags() {
        let value = WorklogValue::inactive(true, false);
        assert!(!value.activated);
        assert!(value.create_issue);
        assert!(!value.edit_issue);
        assert!(value.result.is_none());
    }
}
