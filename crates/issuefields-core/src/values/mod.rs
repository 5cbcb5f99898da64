//! Request-scoped value objects and the field values holder.

pub mod assignee;
pub mod comment;
pub mod issue_linking;
pub mod long_ids;
pub mod params;
pub mod time_tracking;
pub mod worklog;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::custom::CustomFieldParams;

pub use assignee::{AUTOMATIC_ASSIGNEE, AUTOMATIC_ASSIGNEE_STRING, AssigneeSelection, SEPARATOR_ASSIGNEE};
pub use comment::{CommentAction, CommentParameters, CommentProperty, Visibility};
pub use issue_linking::{IssueLinkValidation, IssueLinkingValue};
pub use long_ids::{LongIdsValueHolder, NEW_VALUE_PREFIX};
pub use params::RequestParams;
pub use time_tracking::{TargetSubField, TimeTrackingValue};
pub use worklog::{AdjustEstimate, WorklogResult, WorklogValue};

/// A single field's entry in the [`FieldValuesHolder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Single string input: text fields and id pickers.
    Text(Option<String>),
    Assignee(AssigneeSelection),
    Ids(LongIdsValueHolder),
    TimeTracking(TimeTrackingValue),
    Worklog(WorklogValue),
    IssueLinking(IssueLinkingValue),
    Comment(CommentParameters),
    Custom(CustomFieldParams),
}

impl FieldValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }
}

/// Per-operation map of field id to submitted value.
///
/// Owned by the caller for the duration of one create, edit, move or bulk
/// operation. Each field reads and writes only its own entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValuesHolder(BTreeMap<String, FieldValue>);

impl FieldValuesHolder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field_id: impl Into<String>, value: FieldValue) {
        self.0.insert(field_id.into(), value);
    }

    pub fn remove(&mut self, field_id: &str) -> Option<FieldValue> {
        self.0.remove(field_id)
    }

    #[must_use]
    pub fn get(&self, field_id: &str) -> Option<&FieldValue> {
        self.0.get(field_id)
    }

    #[must_use]
    pub fn contains(&self, field_id: &str) -> bool {
        self.0.contains_key(field_id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Text entry; `None` if absent, not text, or empty.
    #[must_use]
    pub fn text(&self, field_id: &str) -> Option<&str> {
        match self.get(field_id) {
            Some(FieldValue::Text(Some(text))) => Some(text.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn assignee(&self, field_id: &str) -> Option<&AssigneeSelection> {
        match self.get(field_id) {
            Some(FieldValue::Assignee(selection)) => Some(selection),
            _ => None,
        }
    }

    #[must_use]
    pub fn ids(&self, field_id: &str) -> Option<&LongIdsValueHolder> {
        match self.get(field_id) {
            Some(FieldValue::Ids(ids)) => Some(ids),
            _ => None,
        }
    }

    #[must_use]
    pub fn time_tracking(&self, field_id: &str) -> Option<&TimeTrackingValue> {
        match self.get(field_id) {
            Some(FieldValue::TimeTracking(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn worklog(&self, field_id: &str) -> Option<&WorklogValue> {
        match self.get(field_id) {
            Some(FieldValue::Worklog(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn issue_linking(&self, field_id: &str) -> Option<&IssueLinkingValue> {
        match self.get(field_id) {
            Some(FieldValue::IssueLinking(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn comment(&self, field_id: &str) -> Option<&CommentParameters> {
        match self.get(field_id) {
            Some(FieldValue::Comment(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn custom(&self, field_id: &str) -> Option<&CustomFieldParams> {
        match self.get(field_id) {
            Some(FieldValue::Custom(value)) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors_check_variant() {
        let mut holder = FieldValuesHolder::new();
        holder.insert("summary", FieldValue::text("Broken build"));
        holder.insert("components", FieldValue::Ids(LongIdsValueHolder::from_ids([1])));

        assert_eq!(holder.text("summary"), Some("Broken build"));
        assert!(holder.ids("summary").is_none());
        assert_eq!(holder.ids("components").map(|h| h.ids.clone()), Some(vec![1]));
        assert!(holder.contains("components"));
        assert!(!holder.contains("assignee"));
    }

    #[test]
    fn test_empty_text_reads_as_none() {
        let mut holder = FieldValuesHolder::new();
        holder.insert("environment", FieldValue::Text(None));

        assert!(holder.contains("environment"));
        assert_eq!(holder.text("environment"), None);
    }
}
