//! Issue model and the catalog entities fields refer to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::custom::CustomFieldValue;

/// A project owning issues, components and versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub key: String,
    pub name: String,

    /// Username of the project lead, used by automatic assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,

    /// Issue security scheme attached to the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_scheme_id: Option<i64>,
}

impl Project {
    #[must_use]
    pub fn new(id: i64, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            name: name.into(),
            lead: None,
            security_scheme_id: None,
        }
    }

    #[must_use]
    pub fn with_lead(mut self, lead: impl Into<String>) -> Self {
        self.lead = Some(lead.into());
        self
    }

    #[must_use]
    pub const fn with_security_scheme(mut self, scheme_id: i64) -> Self {
        self.security_scheme_id = Some(scheme_id);
        self
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Stable key stored in change history.
    pub key: String,
    /// Login name, as submitted in request parameters.
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    /// Create a user whose key and name are the same.
    #[must_use]
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            display_name: display_name.into(),
            email: None,
        }
    }
}

/// A project component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectComponent {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,
}

impl ProjectComponent {
    #[must_use]
    pub fn new(id: i64, project_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            project_id,
            name: name.into(),
            lead: None,
        }
    }

    #[must_use]
    pub fn with_lead(mut self, lead: impl Into<String>) -> Self {
        self.lead = Some(lead.into());
        self
    }
}

/// A project version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Version {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub archived: bool,
}

impl Version {
    #[must_use]
    pub fn new(id: i64, project_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            project_id,
            name: name.into(),
            released: false,
            archived: false,
        }
    }

    #[must_use]
    pub const fn released(mut self) -> Self {
        self.released = true;
        self
    }

    #[must_use]
    pub const fn archived(mut self) -> Self {
        self.archived = true;
        self
    }
}

/// A named constant such as a resolution or priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueConstant {
    pub id: String,
    pub name: String,
}

impl IssueConstant {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An issue type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subtask: bool,
}

impl IssueType {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subtask: false,
        }
    }

    #[must_use]
    pub fn subtask(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subtask: true,
            ..Self::new(id, name)
        }
    }
}

/// An issue security level belonging to a security scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityLevel {
    pub id: i64,
    pub scheme_id: i64,
    pub name: String,
}

impl SecurityLevel {
    #[must_use]
    pub fn new(id: i64, scheme_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            scheme_id,
            name: name.into(),
        }
    }
}

/// An issue as seen by fields.
///
/// Estimates and time spent are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    /// Persistent id; `None` until the issue is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub project: Project,
    pub issue_type: IssueType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<User>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ProjectComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_versions: Vec<Version>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fix_versions: Vec<Version>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<IssueConstant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<i64>,

    /// Parent issue id when this issue is a sub-task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    /// Security level of the parent, carried so sub-tasks can inherit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_security_level: Option<SecurityLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtask_ids: Vec<i64>,

    /// Custom field values keyed by field id (`customfield_10000`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_field_values: BTreeMap<String, CustomFieldValue>,

    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Issue {
    /// Create an unsaved issue in a project.
    #[must_use]
    pub fn new(project: Project, issue_type: IssueType) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            key: None,
            project,
            issue_type,
            summary: None,
            description: None,
            environment: None,
            status: None,
            assignee: None,
            reporter: None,
            components: Vec::new(),
            affected_versions: Vec::new(),
            fix_versions: Vec::new(),
            resolution: None,
            security_level: None,
            original_estimate: None,
            estimate: None,
            time_spent: None,
            parent_id: None,
            parent_security_level: None,
            subtask_ids: Vec::new(),
            custom_field_values: BTreeMap::new(),
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn with_key(mut self, id: i64, key: impl Into<String>) -> Self {
        self.id = Some(id);
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn with_assignee(mut self, assignee: User) -> Self {
        self.assignee = Some(assignee);
        self
    }

    #[must_use]
    pub fn with_components(mut self, components: Vec<ProjectComponent>) -> Self {
        self.components = components;
        self
    }

    #[must_use]
    pub const fn with_estimates(mut self, original: Option<i64>, remaining: Option<i64>) -> Self {
        self.original_estimate = original;
        self.estimate = remaining;
        self
    }

    #[must_use]
    pub const fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub const fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Whether the issue has been persisted.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        self.id.is_some()
    }

    /// Key for display and logging, or a placeholder for unsaved issues.
    #[must_use]
    pub fn display_key(&self) -> &str {
        self.key.as_deref().unwrap_or("<new>")
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_issue() {
        let issue = Issue::new(Project::new(1, "HR", "Human Resources"), IssueType::new("1", "Bug"));

        assert!(issue.id.is_none());
        assert!(!issue.is_created());
        assert!(!issue.is_subtask());
        assert_eq!(issue.display_key(), "<new>");
        assert!(issue.components.is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let project = Project::new(1, "HR", "Human Resources").with_lead("admin");
        let issue = Issue::new(project, IssueType::subtask("5", "Sub-task"))
            .with_key(10, "HR-1")
            .with_summary("Payroll export")
            .with_assignee(User::new("fred", "Fred Normal"))
            .with_estimates(Some(3_600_000), None)
            .with_parent(9);

        assert_eq!(issue.display_key(), "HR-1");
        assert_eq!(issue.summary.as_deref(), Some("Payroll export"));
        assert_eq!(issue.assignee.as_ref().map(|u| u.key.as_str()), Some("fred"));
        assert_eq!(issue.original_estimate, Some(3_600_000));
        assert!(issue.is_subtask());
        assert!(issue.issue_type.subtask);
    }

    #[test]
    fn test_serialization_skips_empty_collections() {
        let issue = Issue::new(Project::new(1, "HR", "Human Resources"), IssueType::new("1", "Bug"));
        let json = serde_json::to_string(&issue).unwrap();

        assert!(!json.contains("components"));
        assert!(!json.contains("custom_field_values"));
    }
}
