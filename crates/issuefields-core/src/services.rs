//! Collaborator seams consumed by fields.
//!
//! Fields receive these through [`FieldServices`] at construction time.
//! [`InMemorySite`](crate::memory::InMemorySite) implements all of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::custom::CustomFieldDefinition;
use crate::duration::DurationFormatter;
use crate::error::Result;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, IssueConstant, IssueType, Project, ProjectComponent, SecurityLevel, User, Version};
use crate::layout::FieldLayout;
use crate::render::TemplateRenderer;
use crate::settings::SiteSettings;
use crate::validation::ErrorCollection;
use crate::values::{CommentParameters, IssueLinkValidation, Visibility, WorklogResult};

/// Project-scoped permissions checked by fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Browse,
    CreateIssue,
    EditIssue,
    AssignIssue,
    /// The user may be assigned issues.
    AssignableUser,
    ResolveIssue,
    CommentIssue,
    WorkIssue,
    LinkIssue,
    SetIssueSecurity,
    MoveIssue,
    AdministerProjects,
}

pub trait PermissionManager: Send + Sync {
    fn has_permission(&self, permission: Permission, project: &Project, user: Option<&User>) -> bool;

    /// Projects the user may browse.
    fn browsable_projects(&self, user: Option<&User>) -> Vec<Project>;
}

pub trait UserManager: Send + Sync {
    fn user_by_name(&self, name: &str) -> Option<User>;
}

pub trait ProjectManager: Send + Sync {
    fn project(&self, id: i64) -> Option<Project>;
    fn projects(&self) -> Vec<Project>;

    fn project_by_key(&self, key: &str) -> Option<Project> {
        self.projects()
            .into_iter()
            .find(|p| p.key.eq_ignore_ascii_case(key))
    }
}

pub trait ComponentManager: Send + Sync {
    fn component(&self, id: i64) -> Option<ProjectComponent>;
    fn components_for_project(&self, project_id: i64) -> Vec<ProjectComponent>;

    /// # Errors
    /// Returns an error if the component cannot be stored.
    fn create(&self, project_id: i64, name: &str) -> Result<ProjectComponent>;

    fn component_by_name(&self, project_id: i64, name: &str) -> Option<ProjectComponent> {
        self.components_for_project(project_id)
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }
}

pub trait VersionManager: Send + Sync {
    fn version(&self, id: i64) -> Option<Version>;
    fn versions_for_project(&self, project_id: i64) -> Vec<Version>;

    /// # Errors
    /// Returns an error if the version cannot be stored.
    fn create(&self, project_id: i64, name: &str) -> Result<Version>;

    fn version_by_name(&self, project_id: i64, name: &str) -> Option<Version> {
        self.versions_for_project(project_id)
            .into_iter()
            .find(|v| v.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Resolutions and issue types.
pub trait ConstantsManager: Send + Sync {
    fn resolutions(&self) -> Vec<IssueConstant>;
    fn issue_types(&self) -> Vec<IssueType>;

    /// Issue types enabled for a project.
    fn issue_types_for_project(&self, project_id: i64) -> Vec<IssueType>;

    fn resolution(&self, id: &str) -> Option<IssueConstant> {
        self.resolutions().into_iter().find(|r| r.id == id)
    }

    fn issue_type(&self, id: &str) -> Option<IssueType> {
        self.issue_types().into_iter().find(|t| t.id == id)
    }
}

pub trait SecurityLevelManager: Send + Sync {
    fn level(&self, id: i64) -> Option<SecurityLevel>;
    fn levels_for_scheme(&self, scheme_id: i64) -> Vec<SecurityLevel>;
    fn default_level(&self, scheme_id: i64) -> Option<SecurityLevel>;

    /// Levels of the project's scheme the user may set.
    fn usable_levels(&self, project: &Project, user: Option<&User>) -> Vec<SecurityLevel>;
}

/// Issue lookup and persistence.
pub trait IssueManager: Send + Sync {
    fn issue_by_id(&self, id: i64) -> Option<Issue>;
    fn issue_by_key(&self, key: &str) -> Option<Issue>;
    fn subtasks(&self, parent_id: i64) -> Vec<Issue>;

    /// Store an issue, assigning id and key if it is new.
    ///
    /// # Errors
    /// Returns an error if the issue cannot be stored.
    fn store(&self, issue: Issue) -> Result<Issue>;
}

/// Field layout lookup per project and issue type.
pub trait FieldLayoutManager: Send + Sync {
    fn field_layout(&self, project_id: i64, issue_type_id: &str) -> Arc<FieldLayout>;

    /// Every distinct layout used by a project.
    fn unique_field_layouts(&self, project_id: i64) -> Vec<Arc<FieldLayout>>;
}

/// Input for work log validation, built from submitted parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogInput {
    pub worklog_id: Option<i64>,
    pub time_spent: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub visibility: Visibility,
    /// Prefix applied to error keys so they land on the form inputs.
    pub error_field_prefix: String,
}

/// A stored work log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worklog {
    pub id: i64,
    pub issue_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub time_spent: i64,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

pub trait WorklogService: Send + Sync {
    fn has_work_started(&self, issue: &Issue) -> bool;

    /// Validate with automatic or leave-alone estimate adjustment.
    fn validate_create(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        input: &WorklogInput,
        errors: &mut ErrorCollection,
    ) -> Option<WorklogResult>;

    fn validate_create_with_new_estimate(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        input: &WorklogInput,
        new_estimate: Option<&str>,
        errors: &mut ErrorCollection,
    ) -> Option<WorklogResult>;

    fn validate_create_with_manual_adjustment(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        input: &WorklogInput,
        adjustment_amount: Option<&str>,
        errors: &mut ErrorCollection,
    ) -> Option<WorklogResult>;

    /// Create a validated entry and adjust the issue's estimate.
    ///
    /// # Errors
    /// Returns an error if the entry cannot be stored.
    fn create(&self, caller: Option<&User>, issue: &Issue, result: &WorklogResult) -> Result<Worklog>;

    fn worklogs(&self, issue_id: i64) -> Vec<Worklog>;
}

/// A stored comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub body: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

pub trait CommentService: Send + Sync {
    fn has_permission_to_create(&self, caller: Option<&User>, issue: &Issue, errors: &mut ErrorCollection) -> bool;
    fn has_permission_to_edit(&self, caller: Option<&User>, comment_id: i64, errors: &mut ErrorCollection) -> bool;
    fn has_permission_to_delete(&self, caller: Option<&User>, comment_id: i64, errors: &mut ErrorCollection) -> bool;

    fn is_valid_visibility(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        visibility: &Visibility,
        errors: &mut ErrorCollection,
    ) -> bool;

    /// # Errors
    /// Returns an error if the comment cannot be stored.
    fn create(&self, caller: Option<&User>, issue: &Issue, params: &CommentParameters) -> Result<Comment>;

    /// # Errors
    /// Returns an error if the comment does not exist or cannot be stored.
    fn update(&self, caller: Option<&User>, comment_id: i64, params: &CommentParameters) -> Result<Comment>;

    /// # Errors
    /// Returns an error if the comment does not exist.
    fn delete(&self, caller: Option<&User>, comment_id: i64) -> Result<Comment>;

    fn comments(&self, issue_id: i64) -> Vec<Comment>;
}

/// A link type such as "Blocks": `outward` reads "blocks", `inward` reads
/// "is blocked by".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLinkType {
    pub id: i64,
    pub name: String,
    pub outward: String,
    pub inward: String,
}

/// A stored link between two issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLink {
    pub id: i64,
    pub link_type_id: i64,
    pub source_key: String,
    pub destination_key: String,
}

pub trait IssueLinkService: Send + Sync {
    fn link_types(&self) -> Vec<IssueLinkType>;

    fn validate_add(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        link_description: &str,
        issue_keys: &[String],
        errors: &mut ErrorCollection,
    ) -> Option<IssueLinkValidation>;

    /// # Errors
    /// Returns an error if the links cannot be stored.
    fn add_links(&self, caller: Option<&User>, issue: &Issue, validation: &IssueLinkValidation) -> Result<Vec<IssueLink>>;

    fn links_for_issue(&self, issue_key: &str) -> Vec<IssueLink>;
}

/// Resolves "automatic" assignment.
pub trait AssigneeResolver: Send + Sync {
    fn default_assignee(&self, issue: &Issue, components: &[ProjectComponent]) -> Option<User>;

    /// Errors explaining why automatic assignment would fail, if it would.
    fn validate_default_assignee(&self, issue: &Issue, components: &[ProjectComponent]) -> ErrorCollection;
}

/// Source of admin-defined custom field definitions.
pub trait CustomFieldStore: Send + Sync {
    fn custom_field_definitions(&self) -> Vec<CustomFieldDefinition>;
}

/// Every collaborator a field may need, injected at construction.
#[derive(Clone)]
pub struct FieldServices {
    pub settings: Arc<SiteSettings>,
    pub permissions: Arc<dyn PermissionManager>,
    pub users: Arc<dyn UserManager>,
    pub projects: Arc<dyn ProjectManager>,
    pub components: Arc<dyn ComponentManager>,
    pub versions: Arc<dyn VersionManager>,
    pub constants: Arc<dyn ConstantsManager>,
    pub security_levels: Arc<dyn SecurityLevelManager>,
    pub issues: Arc<dyn IssueManager>,
    pub layouts: Arc<dyn FieldLayoutManager>,
    pub worklogs: Arc<dyn WorklogService>,
    pub comments: Arc<dyn CommentService>,
    pub links: Arc<dyn IssueLinkService>,
    pub assignee_resolver: Arc<dyn AssigneeResolver>,
    pub custom_fields: Arc<dyn CustomFieldStore>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub i18n: Arc<dyn I18nHelper>,
}

impl FieldServices {
    /// Duration parser configured with the site's working time.
    #[must_use]
    pub fn durations(&self) -> DurationFormatter {
        self.settings.working_time
    }

    /// Copy with different settings; every other collaborator is shared.
    #[must_use]
    pub fn with_settings(&self, settings: SiteSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for FieldServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldServices")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
