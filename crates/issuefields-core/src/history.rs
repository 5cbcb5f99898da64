//! Change history produced by field updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::Comment;

/// Whether a change item belongs to a system or custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Jira,
    Custom,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jira => write!(f, "jira"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// One line of change history.
///
/// `field` uses the historical names (`timeoriginalestimate`, `security`,
/// `Fix Version`, ...) that existing history consumers match on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItemBean {
    pub field_type: FieldType,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_string: Option<String>,
}

impl ChangeItemBean {
    #[must_use]
    pub fn new(field_type: FieldType, field: impl Into<String>) -> Self {
        Self {
            field_type,
            field: field.into(),
            from: None,
            from_string: None,
            to: None,
            to_string: None,
        }
    }

    /// A system field change.
    #[must_use]
    pub fn jira(field: impl Into<String>) -> Self {
        Self::new(FieldType::Jira, field)
    }

    #[must_use]
    pub fn from_value(mut self, id: Option<String>, display: Option<String>) -> Self {
        self.from = id;
        self.from_string = display;
        self
    }

    #[must_use]
    pub fn to_value(mut self, id: Option<String>, display: Option<String>) -> Self {
        self.to = id;
        self.to_string = display;
        self
    }
}

/// Collects the change items, comment and side flags of one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueChangeHolder {
    pub items: Vec<ChangeItemBean>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
    /// Set when sub-tasks were updated as a side effect.
    #[serde(default)]
    pub subtasks_updated: bool,
}

impl IssueChangeHolder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_change_item(&mut self, item: ChangeItemBean) {
        self.items.push(item);
    }

    pub fn set_comment(&mut self, comment: Comment) {
        self.comment = Some(comment);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.comment.is_none()
    }

    /// Items touching `field`.
    pub fn items_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ChangeItemBean> + 'a {
        self.items.iter().filter(move |item| item.field == field)
    }
}

/// A committed set of change items for one issue update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeGroup {
    pub id: String,
    pub issue_key: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub items: Vec<ChangeItemBean>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<i64>,
}

impl ChangeGroup {
    /// Create a change group from the collected changes of an update.
    #[must_use]
    pub fn new(issue_key: impl Into<String>, author: Option<String>, changes: &IssueChangeHolder) -> Self {
        Self {
            id: format!("chg_{}", Uuid::new_v4().as_simple()),
            issue_key: issue_key.into(),
            created: Utc::now(),
            author,
            items: changes.items.clone(),
            comment_id: changes.comment.as_ref().map(|c| c.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_item_builder() {
        let item = ChangeItemBean::jira("timeestimate")
            .from_value(Some("3600000".into()), Some("3600000".into()))
            .to_value(Some("7200000".into()), Some("7200000".into()));

        assert_eq!(item.field_type, FieldType::Jira);
        assert_eq!(item.field, "timeestimate");
        assert_eq!(item.from.as_deref(), Some("3600000"));
        assert_eq!(item.to_string.as_deref(), Some("7200000"));
    }

    #[test]
    fn test_change_group_ids_are_unique() {
        let mut changes = IssueChangeHolder::new();
        assert!(changes.is_empty());
        changes.add_change_item(ChangeItemBean::jira("security"));

        let a = ChangeGroup::new("HR-1", Some("admin".into()), &changes);
        let b = ChangeGroup::new("HR-1", None, &changes);

        assert!(a.id.starts_with("chg_"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.items.len(), 1);
        assert_eq!(changes.items_for("security").count(), 1);
    }

    #[test]
    fn test_serialization_uses_lowercase_field_type() {
        let json = serde_json::to_string(&ChangeItemBean::new(FieldType::Custom, "Severity")).unwrap();
        assert!(json.contains(r#""field_type":"custom""#));
        assert!(!json.contains("from_string"));
    }
}
