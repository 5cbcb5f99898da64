//! In-memory implementations of every collaborator seam.
//!
//! [`InMemorySite`] backs the CLI, the REST server (loaded from disk by the
//! store crate) and the unit tests.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::custom::CustomFieldDefinition;
use crate::error::{FieldError, Result};
use crate::i18n::{DefaultI18n, I18nHelper};
use crate::issue::{Issue, IssueConstant, IssueType, Project, ProjectComponent, SecurityLevel, User, Version};
use crate::layout::FieldLayout;
use crate::render::JsonTemplateRenderer;
use crate::services::{
    AssigneeResolver, Comment, CommentService, ComponentManager, ConstantsManager, CustomFieldStore,
    FieldLayoutManager, FieldServices, IssueLink, IssueLinkService, IssueLinkType, IssueManager,
    Permission, PermissionManager, ProjectManager, SecurityLevelManager, UserManager, VersionManager,
    Worklog, WorklogInput, WorklogService,
};
use crate::settings::SiteSettings;
use crate::validation::{ErrorCollection, Reason};
use crate::values::{AdjustEstimate, CommentParameters, IssueLinkValidation, Visibility, WorklogResult};

/// A permission granted to users, optionally limited to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub permission: Permission,
    /// `None` grants across all projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    /// Login names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Granted to everyone, including anonymous callers.
    #[serde(default)]
    pub anyone: bool,
}

impl PermissionGrant {
    #[must_use]
    pub fn to_users(permission: Permission, users: &[&str]) -> Self {
        Self {
            permission,
            project_id: None,
            users: users.iter().map(|u| (*u).to_string()).collect(),
            anyone: false,
        }
    }

    #[must_use]
    pub const fn to_anyone(permission: Permission) -> Self {
        Self {
            permission,
            project_id: None,
            users: Vec::new(),
            anyone: true,
        }
    }

    #[must_use]
    pub const fn in_project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    fn grants(&self, permission: Permission, project: &Project, user: Option<&User>) -> bool {
        self.permission == permission
            && self.project_id.is_none_or(|id| id == project.id)
            && (self.anyone || user.is_some_and(|u| self.users.iter().any(|name| name == &u.name)))
    }
}

/// Which layout a project (and optionally one issue type) uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutAssignment {
    pub project_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type_id: Option<String>,
    pub layout_id: i64,
}

/// Static site catalog: everything except issues and their activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteData {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub users: Vec<User>,
    /// Group name to member login names.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Project role id to member login names.
    #[serde(default)]
    pub roles: BTreeMap<i64, Vec<String>>,
    #[serde(default)]
    pub components: Vec<ProjectComponent>,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub issue_types: Vec<IssueType>,
    /// Issue type ids per project; projects not listed allow every type.
    #[serde(default)]
    pub project_issue_types: BTreeMap<i64, Vec<String>>,
    #[serde(default)]
    pub resolutions: Vec<IssueConstant>,
    #[serde(default)]
    pub security_levels: Vec<SecurityLevel>,
    /// Security scheme id to default level id.
    #[serde(default)]
    pub default_security_levels: BTreeMap<i64, i64>,
    #[serde(default)]
    pub default_layout: FieldLayout,
    #[serde(default)]
    pub layouts: Vec<FieldLayout>,
    #[serde(default)]
    pub layout_assignments: Vec<LayoutAssignment>,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub link_types: Vec<IssueLinkType>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDefinition>,
}

/// Issues and the activity attached to them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteActivity {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub worklogs: Vec<Worklog>,
    #[serde(default)]
    pub links: Vec<IssueLink>,
}

/// A whole site held in memory.
#[derive(Debug)]
pub struct InMemorySite {
    settings: SiteSettings,
    data: RwLock<SiteData>,
    activity: RwLock<SiteActivity>,
    next_id: AtomicI64,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl InMemorySite {
    #[must_use]
    pub fn new(settings: SiteSettings, data: SiteData, activity: SiteActivity) -> Self {
        let max_id = data
            .components
            .iter()
            .map(|c| c.id)
            .chain(data.versions.iter().map(|v| v.id))
            .chain(activity.issues.iter().filter_map(|i| i.id))
            .chain(activity.comments.iter().map(|c| c.id))
            .chain(activity.worklogs.iter().map(|w| w.id))
            .chain(activity.links.iter().map(|l| l.id))
            .max()
            .unwrap_or(0);
        Self {
            settings,
            data: RwLock::new(data),
            activity: RwLock::new(activity),
            next_id: AtomicI64::new(max_id.max(20_000) + 1),
        }
    }

    /// Bundle this site as the collaborators of a field manager.
    #[must_use]
    pub fn services(self: &Arc<Self>) -> FieldServices {
        FieldServices {
            settings: Arc::new(self.settings.clone()),
            permissions: self.clone(),
            users: self.clone(),
            projects: self.clone(),
            components: self.clone(),
            versions: self.clone(),
            constants: self.clone(),
            security_levels: self.clone(),
            issues: self.clone(),
            layouts: self.clone(),
            worklogs: self.clone(),
            comments: self.clone(),
            links: self.clone(),
            assignee_resolver: self.clone(),
            custom_fields: self.clone(),
            renderer: Arc::new(JsonTemplateRenderer),
            i18n: Arc::new(DefaultI18n),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    /// A copy of the catalog.
    #[must_use]
    pub fn data(&self) -> SiteData {
        read(&self.data).clone()
    }

    /// A copy of issues and activity.
    #[must_use]
    pub fn activity(&self) -> SiteActivity {
        read(&self.activity).clone()
    }

    pub fn issues(&self) -> Vec<Issue> {
        read(&self.activity).issues.clone()
    }

    /// Register a custom field definition. Field managers pick it up on
    /// their next refresh.
    pub fn add_custom_field(&self, definition: CustomFieldDefinition) {
        write(&self.data).custom_fields.push(definition);
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn is_member(&self, group: &str, user: &User) -> bool {
        read(&self.data)
            .groups
            .get(group)
            .is_some_and(|members| members.iter().any(|m| m == &user.name))
    }

    fn has_role(&self, role: i64, user: &User) -> bool {
        read(&self.data)
            .roles
            .get(&role)
            .is_some_and(|members| members.iter().any(|m| m == &user.name))
    }

    fn is_assignable(&self, project: &Project, user: &User) -> bool {
        self.has_permission(Permission::AssignableUser, project, Some(user))
    }
}

impl PermissionManager for InMemorySite {
    fn has_permission(&self, permission: Permission, project: &Project, user: Option<&User>) -> bool {
        read(&self.data)
            .permissions
            .iter()
            .any(|grant| grant.grants(permission, project, user))
    }

    fn browsable_projects(&self, user: Option<&User>) -> Vec<Project> {
        let projects = read(&self.data).projects.clone();
        projects
            .into_iter()
            .filter(|p| self.has_permission(Permission::Browse, p, user))
            .collect()
    }
}

impl UserManager for InMemorySite {
    fn user_by_name(&self, name: &str) -> Option<User> {
        read(&self.data).users.iter().find(|u| u.name == name).cloned()
    }
}

impl ProjectManager for InMemorySite {
    fn project(&self, id: i64) -> Option<Project> {
        read(&self.data).projects.iter().find(|p| p.id == id).cloned()
    }

    fn projects(&self) -> Vec<Project> {
        read(&self.data).projects.clone()
    }
}

impl ComponentManager for InMemorySite {
    fn component(&self, id: i64) -> Option<ProjectComponent> {
        read(&self.data).components.iter().find(|c| c.id == id).cloned()
    }

    fn components_for_project(&self, project_id: i64) -> Vec<ProjectComponent> {
        read(&self.data)
            .components
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect()
    }

    fn create(&self, project_id: i64, name: &str) -> Result<ProjectComponent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FieldError::DataAccess("component name is empty".into()));
        }
        if self.component_by_name(project_id, name).is_some() {
            return Err(FieldError::DataAccess(format!("component '{name}' already exists")));
        }
        let component = ProjectComponent::new(self.allocate_id(), project_id, name);
        write(&self.data).components.push(component.clone());
        debug!(project_id, name, id = component.id, "Created component");
        Ok(component)
    }
}

impl VersionManager for InMemorySite {
    fn version(&self, id: i64) -> Option<Version> {
        read(&self.data).versions.iter().find(|v| v.id == id).cloned()
    }

    fn versions_for_project(&self, project_id: i64) -> Vec<Version> {
        read(&self.data)
            .versions
            .iter()
            .filter(|v| v.project_id == project_id)
            .cloned()
            .collect()
    }

    fn create(&self, project_id: i64, name: &str) -> Result<Version> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FieldError::DataAccess("version name is empty".into()));
        }
        if self.version_by_name(project_id, name).is_some() {
            return Err(FieldError::DataAccess(format!("version '{name}' already exists")));
        }
        let version = Version::new(self.allocate_id(), project_id, name);
        write(&self.data).versions.push(version.clone());
        debug!(project_id, name, id = version.id, "Created version");
        Ok(version)
    }
}

impl ConstantsManager for InMemorySite {
    fn resolutions(&self) -> Vec<IssueConstant> {
        read(&self.data).resolutions.clone()
    }

    fn issue_types(&self) -> Vec<IssueType> {
        read(&self.data).issue_types.clone()
    }

    fn issue_types_for_project(&self, project_id: i64) -> Vec<IssueType> {
        let data = read(&self.data);
        match data.project_issue_types.get(&project_id) {
            Some(ids) => data
                .issue_types
                .iter()
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect(),
            None => data.issue_types.clone(),
        }
    }
}

impl SecurityLevelManager for InMemorySite {
    fn level(&self, id: i64) -> Option<SecurityLevel> {
        read(&self.data).security_levels.iter().find(|l| l.id == id).cloned()
    }

    fn levels_for_scheme(&self, scheme_id: i64) -> Vec<SecurityLevel> {
        read(&self.data)
            .security_levels
            .iter()
            .filter(|l| l.scheme_id == scheme_id)
            .cloned()
            .collect()
    }

    fn default_level(&self, scheme_id: i64) -> Option<SecurityLevel> {
        let id = *read(&self.data).default_security_levels.get(&scheme_id)?;
        self.level(id)
    }

    fn usable_levels(&self, project: &Project, user: Option<&User>) -> Vec<SecurityLevel> {
        match project.security_scheme_id {
            Some(scheme_id) if self.has_permission(Permission::SetIssueSecurity, project, user) => {
                self.levels_for_scheme(scheme_id)
            }
            _ => Vec::new(),
        }
    }
}

impl IssueManager for InMemorySite {
    fn issue_by_id(&self, id: i64) -> Option<Issue> {
        read(&self.activity).issues.iter().find(|i| i.id == Some(id)).cloned()
    }

    fn issue_by_key(&self, key: &str) -> Option<Issue> {
        read(&self.activity)
            .issues
            .iter()
            .find(|i| i.key.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(key)))
            .cloned()
    }

    fn subtasks(&self, parent_id: i64) -> Vec<Issue> {
        read(&self.activity)
            .issues
            .iter()
            .filter(|i| i.parent_id == Some(parent_id))
            .cloned()
            .collect()
    }

    fn store(&self, mut issue: Issue) -> Result<Issue> {
        let mut activity = write(&self.activity);
        if issue.id.is_none() {
            let prefix = format!("{}-", issue.project.key);
            let number = activity
                .issues
                .iter()
                .filter_map(|i| i.key.as_deref()?.strip_prefix(&prefix)?.parse::<i64>().ok())
                .max()
                .unwrap_or(0)
                + 1;
            issue.id = Some(self.allocate_id());
            issue.key = Some(format!("{prefix}{number}"));
        }
        if let Some(parent_id) = issue.parent_id {
            let child_id = issue.id;
            if let Some(parent) = activity.issues.iter_mut().find(|i| i.id == Some(parent_id)) {
                if let Some(child_id) = child_id.filter(|id| !parent.subtask_ids.contains(id)) {
                    parent.subtask_ids.push(child_id);
                }
            }
        }
        match activity.issues.iter_mut().find(|i| i.id == issue.id) {
            Some(existing) => *existing = issue.clone(),
            None => activity.issues.push(issue.clone()),
        }
        Ok(issue)
    }
}

impl FieldLayoutManager for InMemorySite {
    fn field_layout(&self, project_id: i64, issue_type_id: &str) -> Arc<FieldLayout> {
        let data = read(&self.data);
        let assignment = data
            .layout_assignments
            .iter()
            .find(|a| a.project_id == project_id && a.issue_type_id.as_deref() == Some(issue_type_id))
            .or_else(|| {
                data.layout_assignments
                    .iter()
                    .find(|a| a.project_id == project_id && a.issue_type_id.is_none())
            });
        let layout = assignment
            .and_then(|a| data.layouts.iter().find(|l| l.id == Some(a.layout_id)))
            .unwrap_or(&data.default_layout);
        Arc::new(layout.clone())
    }

    fn unique_field_layouts(&self, project_id: i64) -> Vec<Arc<FieldLayout>> {
        let mut layouts: Vec<Arc<FieldLayout>> = Vec::new();
        for issue_type in self.issue_types_for_project(project_id) {
            let layout = self.field_layout(project_id, &issue_type.id);
            if !layouts.iter().any(|l| l.id == layout.id) {
                layouts.push(layout);
            }
        }
        layouts
    }
}

impl WorklogService for InMemorySite {
    fn has_work_started(&self, issue: &Issue) -> bool {
        issue.time_spent.is_some_and(|spent| spent > 0)
            || issue
                .id
                .is_some_and(|id| read(&self.activity).worklogs.iter().any(|w| w.issue_id == id))
    }

    fn validate_create(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        input: &WorklogInput,
        errors: &mut ErrorCollection,
    ) -> Option<WorklogResult> {
        let i18n = DefaultI18n;
        if !self.has_permission(Permission::WorkIssue, &issue.project, caller) {
            errors.add_error_message("You do not have the permission to log work on this issue.");
            errors.add_reason(Reason::Forbidden);
            return None;
        }
        let prefix = &input.error_field_prefix;
        let durations = self.settings.working_time;
        let time_spent = match input.time_spent.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => {
                errors.add_error(format!("{prefix}timeLogged"), i18n.text("worklog.service.error.timespent.required", &[]));
                None
            }
            Some(raw) => match durations.parse(raw) {
                Ok(ms) if ms > 0 => Some(ms),
                _ => {
                    errors.add_error(
                        format!("{prefix}timeLogged"),
                        i18n.text("worklog.service.error.invalid.time.duration", &[]),
                    );
                    None
                }
            },
        };
        if input.start_date.is_none() {
            errors.add_error(format!("{prefix}startDate"), i18n.text("worklog.service.error.date.required", &[]));
        }
        if !self.is_valid_visibility(caller, issue, &input.visibility, errors) {
            return None;
        }
        Some(WorklogResult {
            issue_id: issue.id,
            worklog_id: input.worklog_id,
            time_spent: time_spent?,
            start_date: input.start_date?,
            comment: input.comment.clone(),
            visibility: input.visibility.clone(),
            adjust_estimate: AdjustEstimate::Auto,
            new_estimate: None,
            adjustment_amount: None,
        })
    }

    fn validate_create_with_new_estimate(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        input: &WorklogInput,
        new_estimate: Option<&str>,
        errors: &mut ErrorCollection,
    ) -> Option<WorklogResult> {
        let parsed = new_estimate.and_then(|e| self.settings.working_time.parse(e).ok());
        if parsed.is_none() {
            errors.add_error(
                format!("{}newEstimate", input.error_field_prefix),
                DefaultI18n.text("worklog.service.error.newestimate", &[]),
            );
        }
        let result = self.validate_create(caller, issue, input, errors)?;
        Some(WorklogResult {
            adjust_estimate: AdjustEstimate::New,
            new_estimate: Some(parsed?),
            ..result
        })
    }

    fn validate_create_with_manual_adjustment(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        input: &WorklogInput,
        adjustment_amount: Option<&str>,
        errors: &mut ErrorCollection,
    ) -> Option<WorklogResult> {
        let parsed = adjustment_amount.and_then(|a| self.settings.working_time.parse(a).ok());
        if parsed.is_none() {
            errors.add_error(
                format!("{}adjustmentAmount", input.error_field_prefix),
                DefaultI18n.text("worklog.service.error.adjustmentamount", &[]),
            );
        }
        let result = self.validate_create(caller, issue, input, errors)?;
        Some(WorklogResult {
            adjust_estimate: AdjustEstimate::Manual,
            adjustment_amount: Some(parsed?),
            ..result
        })
    }

    fn create(&self, caller: Option<&User>, issue: &Issue, result: &WorklogResult) -> Result<Worklog> {
        let issue_id = issue
            .id
            .ok_or_else(|| FieldError::DataAccess("cannot log work on an unsaved issue".into()))?;
        let worklog = Worklog {
            id: self.allocate_id(),
            issue_id,
            author: caller.map(|u| u.key.clone()),
            time_spent: result.time_spent,
            start_date: result.start_date,
            comment: result.comment.clone(),
            visibility: result.visibility.clone(),
        };
        let mut activity = write(&self.activity);
        let stored = activity
            .issues
            .iter_mut()
            .find(|i| i.id == Some(issue_id))
            .ok_or_else(|| FieldError::DataAccess(format!("issue {issue_id} not found")))?;
        stored.time_spent = Some(stored.time_spent.unwrap_or(0).saturating_add(result.time_spent));
        let remaining = stored.estimate;
        stored.estimate = match result.adjust_estimate {
            AdjustEstimate::Auto => remaining.map(|r| (r - result.time_spent).max(0)),
            AdjustEstimate::Leave => remaining,
            AdjustEstimate::New => result.new_estimate,
            AdjustEstimate::Manual => remaining.map(|r| (r - result.adjustment_amount.unwrap_or(0)).max(0)),
        };
        stored.touch();
        activity.worklogs.push(worklog.clone());
        debug!(issue_id, worklog_id = worklog.id, mode = result.adjust_estimate.as_str(), "Logged work");
        Ok(worklog)
    }

    fn worklogs(&self, issue_id: i64) -> Vec<Worklog> {
        read(&self.activity)
            .worklogs
            .iter()
            .filter(|w| w.issue_id == issue_id)
            .cloned()
            .collect()
    }
}

impl InMemorySite {
    fn comment_by_id(&self, comment_id: i64) -> Option<Comment> {
        read(&self.activity).comments.iter().find(|c| c.id == comment_id).cloned()
    }

    fn may_modify_comment(&self, caller: Option<&User>, comment_id: i64, errors: &mut ErrorCollection) -> bool {
        let Some(comment) = self.comment_by_id(comment_id) else {
            errors.add_error_with_reason("comment", format!("Comment {comment_id} does not exist."), Reason::NotFound);
            return false;
        };
        let is_author = caller.is_some_and(|u| comment.author.as_deref() == Some(u.key.as_str()));
        let is_admin = self
            .issues()
            .iter()
            .find(|i| i.id == Some(comment.issue_id))
            .is_some_and(|i| self.has_permission(Permission::AdministerProjects, &i.project, caller));
        if !is_author && !is_admin {
            errors.add_error_message("You do not have permission to modify this comment.");
            errors.add_reason(Reason::Forbidden);
            return false;
        }
        true
    }
}

impl CommentService for InMemorySite {
    fn has_permission_to_create(&self, caller: Option<&User>, issue: &Issue, errors: &mut ErrorCollection) -> bool {
        if self.has_permission(Permission::CommentIssue, &issue.project, caller) {
            return true;
        }
        errors.add_error_message("You do not have the permission to comment on this issue.");
        errors.add_reason(Reason::Forbidden);
        false
    }

    fn has_permission_to_edit(&self, caller: Option<&User>, comment_id: i64, errors: &mut ErrorCollection) -> bool {
        self.may_modify_comment(caller, comment_id, errors)
    }

    fn has_permission_to_delete(&self, caller: Option<&User>, comment_id: i64, errors: &mut ErrorCollection) -> bool {
        self.may_modify_comment(caller, comment_id, errors)
    }

    fn is_valid_visibility(
        &self,
        caller: Option<&User>,
        _issue: &Issue,
        visibility: &Visibility,
        errors: &mut ErrorCollection,
    ) -> bool {
        let allowed = match visibility {
            Visibility::Public => true,
            Visibility::Group(group) => {
                self.settings.comment_group_visibility && caller.is_some_and(|u| self.is_member(group, u))
            }
            Visibility::Role(role) => {
                self.settings.comment_role_visibility && caller.is_some_and(|u| self.has_role(*role, u))
            }
        };
        if !allowed {
            errors.add_error("commentLevel", DefaultI18n.text("comment.service.error.visibility", &[]));
        }
        allowed
    }

    fn create(&self, caller: Option<&User>, issue: &Issue, params: &CommentParameters) -> Result<Comment> {
        let issue_id = issue
            .id
            .ok_or_else(|| FieldError::DataAccess("cannot comment on an unsaved issue".into()))?;
        let body = params
            .body
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| FieldError::DataAccess("comment body is empty".into()))?;
        let now = Utc::now();
        let comment = Comment {
            id: self.allocate_id(),
            issue_id,
            author: caller.map(|u| u.key.clone()),
            body,
            visibility: params.visibility.clone(),
            created: now,
            updated: now,
        };
        write(&self.activity).comments.push(comment.clone());
        Ok(comment)
    }

    fn update(&self, _caller: Option<&User>, comment_id: i64, params: &CommentParameters) -> Result<Comment> {
        let mut activity = write(&self.activity);
        let comment = activity
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| FieldError::DataAccess(format!("comment {comment_id} not found")))?;
        if let Some(body) = params.body.clone().filter(|b| !b.trim().is_empty()) {
            comment.body = body;
        }
        comment.visibility = params.visibility.clone();
        comment.updated = Utc::now();
        Ok(comment.clone())
    }

    fn delete(&self, _caller: Option<&User>, comment_id: i64) -> Result<Comment> {
        let mut activity = write(&self.activity);
        let index = activity
            .comments
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or_else(|| FieldError::DataAccess(format!("comment {comment_id} not found")))?;
        Ok(activity.comments.remove(index))
    }

    fn comments(&self, issue_id: i64) -> Vec<Comment> {
        read(&self.activity)
            .comments
            .iter()
            .filter(|c| c.issue_id == issue_id)
            .cloned()
            .collect()
    }
}

impl IssueLinkService for InMemorySite {
    fn link_types(&self) -> Vec<IssueLinkType> {
        read(&self.data).link_types.clone()
    }

    fn validate_add(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        link_description: &str,
        issue_keys: &[String],
        errors: &mut ErrorCollection,
    ) -> Option<IssueLinkValidation> {
        let i18n = DefaultI18n;
        if !self.has_permission(Permission::LinkIssue, &issue.project, caller) {
            errors.add_error_message("You do not have the permission to link issues.");
            errors.add_reason(Reason::Forbidden);
            return None;
        }
        let wanted = link_description.trim();
        let found = self.link_types().into_iter().find_map(|t| {
            if t.outward.eq_ignore_ascii_case(wanted) {
                Some((t, true))
            } else if t.inward.eq_ignore_ascii_case(wanted) {
                Some((t, false))
            } else {
                None
            }
        });
        let Some((link_type, outward)) = found else {
            errors.add_error(
                "issuelinks-linktype",
                i18n.text("issuelinking.service.error.invalid.link.type", &[wanted]),
            );
            return None;
        };
        let mut valid = true;
        for key in issue_keys {
            if issue.key.as_deref().is_some_and(|own| own.eq_ignore_ascii_case(key)) {
                errors.add_error("issuelinks-issues", i18n.text("issuelinking.service.error.self.link", &[]));
                valid = false;
            } else if self.issue_by_key(key).is_none() {
                errors.add_error(
                    "issuelinks-issues",
                    i18n.text("issuelinking.service.error.issue.does.not.exist", &[key]),
                );
                valid = false;
            }
        }
        valid.then(|| IssueLinkValidation {
            link_type_id: link_type.id,
            outward,
            link_description: wanted.to_string(),
            issue_keys: issue_keys.to_vec(),
        })
    }

    fn add_links(&self, _caller: Option<&User>, issue: &Issue, validation: &IssueLinkValidation) -> Result<Vec<IssueLink>> {
        let own_key = issue
            .key
            .clone()
            .ok_or_else(|| FieldError::DataAccess("cannot link an unsaved issue".into()))?;
        let mut created = Vec::new();
        for key in &validation.issue_keys {
            let (source_key, destination_key) = if validation.outward {
                (own_key.clone(), key.clone())
            } else {
                (key.clone(), own_key.clone())
            };
            created.push(IssueLink {
                id: self.allocate_id(),
                link_type_id: validation.link_type_id,
                source_key,
                destination_key,
            });
        }
        write(&self.activity).links.extend(created.iter().cloned());
        Ok(created)
    }

    fn links_for_issue(&self, issue_key: &str) -> Vec<IssueLink> {
        read(&self.activity)
            .links
            .iter()
            .filter(|l| l.source_key == issue_key || l.destination_key == issue_key)
            .cloned()
            .collect()
    }
}

impl AssigneeResolver for InMemorySite {
    fn default_assignee(&self, issue: &Issue, components: &[ProjectComponent]) -> Option<User> {
        let component_lead = components
            .iter()
            .filter_map(|c| c.lead.as_deref())
            .filter_map(|lead| self.user_by_name(lead))
            .find(|user| self.is_assignable(&issue.project, user));
        if component_lead.is_some() {
            return component_lead;
        }
        let lead = issue.project.lead.as_deref().and_then(|lead| self.user_by_name(lead));
        match lead {
            Some(user) if self.is_assignable(&issue.project, &user) => Some(user),
            Some(user) => {
                warn!(project = %issue.project.key, lead = %user.name, "Project lead is not assignable");
                None
            }
            None => None,
        }
    }

    fn validate_default_assignee(&self, issue: &Issue, components: &[ProjectComponent]) -> ErrorCollection {
        let mut errors = ErrorCollection::new();
        if self.default_assignee(issue, components).is_none() && !self.settings.allow_unassigned {
            errors.add_error("assignee", DefaultI18n.text("assign.error.no.default.assignee", &[]));
        }
        errors
    }
}

impl CustomFieldStore for InMemorySite {
    fn custom_field_definitions(&self) -> Vec<CustomFieldDefinition> {
        read(&self.data).custom_fields.clone()
    }
}
