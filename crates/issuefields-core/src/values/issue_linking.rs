//! Submitted issue link values.

use serde::{Deserialize, Serialize};

/// A link request that the link service accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLinkValidation {
    pub link_type_id: i64,
    /// Whether the source issue is the outward end for this description.
    pub outward: bool,
    pub link_description: String,
    pub issue_keys: Vec<String>,
}

/// Issue link parameters as held during an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLinkingValue {
    pub create_issue: bool,
    pub linking_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_issues: Vec<String>,
    /// Filled by validation when the links are acceptable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<IssueLinkValidation>,
}

impl IssueLinkingValue {
    #[must_use]
    pub fn new(link_description: impl Into<String>, linked_issues: Vec<String>) -> Self {
        Self {
            linking_enabled: true,
            link_description: Some(link_description.into()),
            linked_issues,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_create_issue(mut self, create_issue: bool) -> Self {
        self.create_issue = create_issue;
        self
    }

    #[must_use]
    pub const fn with_linking_enabled(mut self, enabled: bool) -> Self {
        self.linking_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: Option<IssueLinkValidation>) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn has_links(&self) -> bool {
        !self.linked_issues.is_empty()
    }
}

/// Split `issuelinks-issues` values that may be comma or space separated.
#[must_use]
pub fn split_issue_keys(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split([',', ' ']))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_issue_keys() {
        let keys = split_issue_keys(&["HR-1, HR-2".into(), "HR-3".into(), String::new()]);
        assert_eq!(keys, vec!["HR-1", "HR-2", "HR-3"]);
    }

    #[test]
    fn test_has_links() {
        assert!(!IssueLinkingValue::default().has_links());
        assert!(IssueLinkingValue::new("blocks", vec!["HR-1".into()]).has_links());
    }
}
