//! Issue patches: field deltas accumulated during an update.
//!
//! Fields never mutate an [`Issue`] directly. `update_issue` records each
//! change on an [`IssuePatch`]; the runner commits the patch once every
//! field has validated, yielding the new issue and the ordered list of
//! [`ModifiedValue`]s that drive change history.

use serde::{Deserialize, Serialize};

use crate::custom::CustomFieldValue;
use crate::issue::{Issue, IssueConstant, IssueType, Project, ProjectComponent, SecurityLevel, User, Version};
use crate::values::{
    AssigneeSelection, CommentParameters, IssueLinkingValue, TimeTrackingValue, WorklogValue,
};

/// A typed field value as stored on, or destined for, an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IssueValue {
    #[default]
    Empty,
    Text(String),
    Assignee(AssigneeSelection),
    User(User),
    Project(Project),
    Components(Vec<ProjectComponent>),
    Versions(Vec<Version>),
    Resolution(IssueConstant),
    IssueType(IssueType),
    SecurityLevel(SecurityLevel),
    /// Legacy single estimate, milliseconds.
    Estimate(i64),
    TimeTracking(TimeTrackingValue),
    Worklog(WorklogValue),
    IssueLinking(IssueLinkingValue),
    Comment(CommentParameters),
    Custom(CustomFieldValue),
}

impl IssueValue {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn from_text(text: Option<&str>) -> Self {
        text.map_or(Self::Empty, |t| Self::Text(t.to_string()))
    }

    #[must_use]
    pub fn from_user(user: Option<&User>) -> Self {
        user.map_or(Self::Empty, |u| Self::User(u.clone()))
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_components(&self) -> &[ProjectComponent] {
        match self {
            Self::Components(components) => components,
            _ => &[],
        }
    }

    #[must_use]
    pub fn as_versions(&self) -> &[Version] {
        match self {
            Self::Versions(versions) => versions,
            _ => &[],
        }
    }

    #[must_use]
    pub const fn as_estimate(&self) -> Option<i64> {
        match self {
            Self::Estimate(ms) => Some(*ms),
            _ => None,
        }
    }
}

/// The old and new value of a modified field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifiedValue {
    pub old: IssueValue,
    pub new: IssueValue,
}

impl ModifiedValue {
    #[must_use]
    pub const fn new(old: IssueValue, new: IssueValue) -> Self {
        Self { old, new }
    }
}

/// Accumulates per-field deltas against a snapshot of an issue.
#[derive(Debug, Clone)]
pub struct IssuePatch {
    original: Issue,
    issue: Issue,
    modified: Vec<(String, ModifiedValue)>,
}

impl IssuePatch {
    #[must_use]
    pub fn new(issue: Issue) -> Self {
        Self {
            original: issue.clone(),
            issue,
            modified: Vec::new(),
        }
    }

    /// The issue as it was before any delta.
    #[must_use]
    pub const fn original(&self) -> &Issue {
        &self.original
    }

    /// The issue with deltas applied so far.
    #[must_use]
    pub const fn issue(&self) -> &Issue {
        &self.issue
    }

    /// Field ids with recorded deltas, in recording order.
    pub fn modified_field_ids(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub fn modified(&self, field_id: &str) -> Option<&ModifiedValue> {
        self.modified
            .iter()
            .find(|(id, _)| id == field_id)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Record a delta, keeping the first old value if the field changes twice.
    fn record(&mut self, field_id: &str, old: IssueValue, new: IssueValue) {
        if let Some((_, existing)) = self.modified.iter_mut().find(|(id, _)| id == field_id) {
            existing.new = new;
        } else if old != new {
            self.modified.push((field_id.to_string(), ModifiedValue::new(old, new)));
        }
    }

    pub fn set_summary(&mut self, summary: Option<String>) {
        let old = IssueValue::from_text(self.issue.summary.as_deref());
        self.issue.summary = summary;
        let new = IssueValue::from_text(self.issue.summary.as_deref());
        self.record("summary", old, new);
    }

    pub fn set_description(&mut self, description: Option<String>) {
        let old = IssueValue::from_text(self.issue.description.as_deref());
        self.issue.description = description;
        let new = IssueValue::from_text(self.issue.description.as_deref());
        self.record("description", old, new);
    }

    pub fn set_environment(&mut self, environment: Option<String>) {
        let old = IssueValue::from_text(self.issue.environment.as_deref());
        self.issue.environment = environment;
        let new = IssueValue::from_text(self.issue.environment.as_deref());
        self.record("environment", old, new);
    }

    pub fn set_assignee(&mut self, assignee: Option<User>) {
        let old = IssueValue::from_user(self.issue.assignee.as_ref());
        let new = IssueValue::from_user(assignee.as_ref());
        self.issue.assignee = assignee;
        self.record("assignee", old, new);
    }

    pub fn set_project(&mut self, project: Project) {
        let old = IssueValue::Project(self.issue.project.clone());
        let new = IssueValue::Project(project.clone());
        self.issue.project = project;
        self.record("project", old, new);
    }

    pub fn set_components(&mut self, components: Vec<ProjectComponent>) {
        let old = IssueValue::Components(self.issue.components.clone());
        let new = IssueValue::Components(components.clone());
        self.issue.components = components;
        self.record("components", old, new);
    }

    pub fn set_affected_versions(&mut self, versions: Vec<Version>) {
        let old = IssueValue::Versions(self.issue.affected_versions.clone());
        let new = IssueValue::Versions(versions.clone());
        self.issue.affected_versions = versions;
        self.record("versions", old, new);
    }

    pub fn set_fix_versions(&mut self, versions: Vec<Version>) {
        let old = IssueValue::Versions(self.issue.fix_versions.clone());
        let new = IssueValue::Versions(versions.clone());
        self.issue.fix_versions = versions;
        self.record("fixVersions", old, new);
    }

    pub fn set_resolution(&mut self, resolution: Option<IssueConstant>) {
        let old = self.issue.resolution.clone().map_or(IssueValue::Empty, IssueValue::Resolution);
        let new = resolution.clone().map_or(IssueValue::Empty, IssueValue::Resolution);
        self.issue.resolution = resolution;
        self.record("resolution", old, new);
    }

    pub fn set_issue_type(&mut self, issue_type: IssueType) {
        let old = IssueValue::IssueType(self.issue.issue_type.clone());
        let new = IssueValue::IssueType(issue_type.clone());
        self.issue.issue_type = issue_type;
        self.record("issuetype", old, new);
    }

    pub fn set_security_level(&mut self, level: Option<SecurityLevel>) {
        let old = self.issue.security_level.clone().map_or(IssueValue::Empty, IssueValue::SecurityLevel);
        let new = level.clone().map_or(IssueValue::Empty, IssueValue::SecurityLevel);
        self.issue.security_level = level;
        self.record("security", old, new);
    }

    pub fn set_original_estimate(&mut self, millis: Option<i64>) {
        let old = self.issue.original_estimate.map_or(IssueValue::Empty, IssueValue::Estimate);
        let new = millis.map_or(IssueValue::Empty, IssueValue::Estimate);
        self.issue.original_estimate = millis;
        self.record("timeoriginalestimate", old, new);
    }

    pub fn set_estimate(&mut self, millis: Option<i64>) {
        let old = self.issue.estimate.map_or(IssueValue::Empty, IssueValue::Estimate);
        let new = millis.map_or(IssueValue::Empty, IssueValue::Estimate);
        self.issue.estimate = millis;
        self.record("timeestimate", old, new);
    }

    /// Set or clear a custom field value on the issue.
    pub fn set_custom_field_value(&mut self, field_id: &str, value: Option<CustomFieldValue>) {
        let old = self
            .issue
            .custom_field_values
            .get(field_id)
            .cloned()
            .map_or(IssueValue::Empty, IssueValue::Custom);
        let new = value.clone().map_or(IssueValue::Empty, IssueValue::Custom);
        match value {
            Some(value) => {
                self.issue.custom_field_values.insert(field_id.to_string(), value);
            }
            None => {
                self.issue.custom_field_values.remove(field_id);
            }
        }
        self.record(field_id, old, new);
    }

    /// Stash a value that lives outside the issue row (comments, work logs,
    /// links). Always recorded, even when old equals new.
    pub fn set_external_field_value(&mut self, field_id: &str, old: IssueValue, new: IssueValue) {
        if let Some((_, existing)) = self.modified.iter_mut().find(|(id, _)| id == field_id) {
            existing.new = new;
        } else {
            self.modified.push((field_id.to_string(), ModifiedValue::new(old, new)));
        }
    }

    /// Commit: the patched issue plus its deltas in recording order.
    #[must_use]
    pub fn commit(mut self) -> (Issue, Vec<(String, ModifiedValue)>) {
        if self.is_modified() {
            self.issue.touch();
        }
        (self.issue, self.modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueType, Project};
    use pretty_assertions::assert_eq;

    fn issue() -> Issue {
        Issue::new(Project::new(1, "HR", "Human Resources"), IssueType::new("1", "Bug"))
            .with_key(10, "HR-1")
    }

    #[test]
    fn test_unchanged_value_is_not_recorded() {
        let mut patch = IssuePatch::new(issue().with_summary("Same"));
        patch.set_summary(Some("Same".into()));

        assert!(!patch.is_modified());
    }

    #[test]
    fn test_records_old_and_new() {
        let mut patch = IssuePatch::new(issue());
        patch.set_assignee(Some(User::new("fred", "Fred")));
        patch.set_estimate(Some(3_600_000));

        let modified = patch.modified("assignee").unwrap();
        assert_eq!(modified.old, IssueValue::Empty);
        assert_eq!(modified.new.as_user().map(|u| u.name.as_str()), Some("fred"));
        assert_eq!(
            patch.modified_field_ids().collect::<Vec<_>>(),
            vec!["assignee", "timeestimate"]
        );
    }

    #[test]
    fn test_second_change_keeps_first_old_value() {
        let mut patch = IssuePatch::new(issue().with_summary("A"));
        patch.set_summary(Some("B".into()));
        patch.set_summary(Some("C".into()));

        let modified = patch.modified("summary").unwrap();
        assert_eq!(modified.old, IssueValue::Text("A".into()));
        assert_eq!(modified.new, IssueValue::Text("C".into()));
    }

    #[test]
    fn test_external_value_always_recorded() {
        let mut patch = IssuePatch::new(issue());
        patch.set_external_field_value("comment", IssueValue::Empty, IssueValue::Empty);
        assert!(patch.modified("comment").is_some());
    }

    #[test]
    fn test_commit_leaves_original_untouched() {
        let original = issue();
        let mut patch = IssuePatch::new(original.clone());
        patch.set_summary(Some("New".into()));

        assert_eq!(patch.original(), &original);
        let (committed, modified) = patch.commit();
        assert_eq!(committed.summary.as_deref(), Some("New"));
        assert_eq!(modified.len(), 1);
        assert!(original.summary.is_none());
    }
}
