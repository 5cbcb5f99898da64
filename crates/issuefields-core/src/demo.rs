//! A small sample site: two projects, a handful of users and issues.
//!
//! Written to disk by `issuefields init` and used as the fixture of the
//! unit tests.

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

use crate::custom::types::{NUMBER, SELECT, TEXT_AREA};
use crate::custom::{CustomFieldDefinition, CustomFieldValue, FieldConfig, FieldConfigScheme};
use crate::field::ids::{COMPONENTS, DESCRIPTION, ENVIRONMENT};
use crate::issue::{Issue, IssueConstant, IssueType, Project, ProjectComponent, SecurityLevel, User, Version};
use crate::layout::{FieldLayout, FieldLayoutItem, WIKI_RENDERER};
use crate::memory::{LayoutAssignment, PermissionGrant, SiteActivity, SiteData};
use crate::services::{Comment, IssueLinkType, Permission};
use crate::values::Visibility;

pub const HR: i64 = 10_000;
pub const MKT: i64 = 10_001;
pub const HR_SECURITY_SCHEME: i64 = 10_000;
pub const HR_BUG_LAYOUT: i64 = 10_000;

const HOUR: i64 = 3_600_000;

const MEMBERS: &[&str] = &["admin", "fred", "sally"];

fn human_resources() -> Project {
    Project::new(HR, "HR", "Human Resources")
        .with_lead("admin")
        .with_security_scheme(HR_SECURITY_SCHEME)
}

fn marketing() -> Project {
    Project::new(MKT, "MKT", "Marketing").with_lead("sally")
}

fn bug() -> IssueType {
    IssueType::new("1", "Bug")
}

fn user(name: &str, display_name: &str) -> User {
    let mut user = User::new(name, display_name);
    user.email = Some(format!("{name}@example.com"));
    user
}

impl SiteData {
    /// The sample catalog.
    #[must_use]
    pub fn demo() -> Self {
        let member_grants = [
            Permission::CreateIssue,
            Permission::EditIssue,
            Permission::AssignIssue,
            Permission::AssignableUser,
            Permission::ResolveIssue,
            Permission::CommentIssue,
            Permission::WorkIssue,
            Permission::LinkIssue,
            Permission::MoveIssue,
        ]
        .into_iter()
        .map(|p| PermissionGrant::to_users(p, MEMBERS));

        let mut permissions = vec![PermissionGrant::to_anyone(Permission::Browse)];
        permissions.extend(member_grants);
        permissions.push(PermissionGrant::to_users(Permission::AdministerProjects, &["admin"]));
        permissions.push(PermissionGrant::to_users(Permission::SetIssueSecurity, &["admin"]).in_project(HR));

        let hr_bugs = FieldLayout::new(Some(HR_BUG_LAYOUT), "HR Bugs")
            .with_item(FieldLayoutItem::new(ENVIRONMENT).hidden())
            .with_item(FieldLayoutItem::new(COMPONENTS).required())
            .with_item(FieldLayoutItem::new(DESCRIPTION).with_renderer(WIKI_RENDERER));

        Self {
            projects: vec![human_resources(), marketing()],
            users: vec![
                user("admin", "Administrator"),
                user("fred", "Fred Normal"),
                user("bob", "Bob Visitor"),
                user("sally", "Sally Sales"),
            ],
            groups: BTreeMap::from([
                ("developers".to_string(), vec!["admin".to_string(), "fred".to_string()]),
                ("staff".to_string(), MEMBERS.iter().map(|m| (*m).to_string()).collect()),
            ]),
            roles: BTreeMap::from([(10_002, vec!["admin".to_string()])]),
            components: vec![
                ProjectComponent::new(10_000, HR, "Backend").with_lead("fred"),
                ProjectComponent::new(10_001, HR, "UI"),
            ],
            versions: vec![
                Version::new(10_000, HR, "1.0").released(),
                Version::new(10_001, HR, "1.1").released().archived(),
                Version::new(10_002, HR, "2.0"),
                Version::new(10_003, MKT, "Q1 Campaign"),
            ],
            issue_types: vec![bug(), IssueType::new("2", "Task"), IssueType::subtask("3", "Sub-task")],
            project_issue_types: BTreeMap::from([(MKT, vec!["2".to_string(), "3".to_string()])]),
            resolutions: vec![
                IssueConstant::new("1", "Fixed"),
                IssueConstant::new("2", "Won't Fix"),
                IssueConstant::new("3", "Duplicate"),
            ],
            security_levels: vec![
                SecurityLevel::new(10_000, HR_SECURITY_SCHEME, "Internal"),
                SecurityLevel::new(10_001, HR_SECURITY_SCHEME, "Staff"),
            ],
            default_security_levels: BTreeMap::new(),
            default_layout: FieldLayout::new(None, "Default Field Configuration"),
            layouts: vec![hr_bugs],
            layout_assignments: vec![LayoutAssignment {
                project_id: HR,
                issue_type_id: Some("1".to_string()),
                layout_id: HR_BUG_LAYOUT,
            }],
            permissions,
            link_types: vec![
                IssueLinkType {
                    id: 10_000,
                    name: "Blocks".to_string(),
                    outward: "blocks".to_string(),
                    inward: "is blocked by".to_string(),
                },
                IssueLinkType {
                    id: 10_001,
                    name: "Relates".to_string(),
                    outward: "relates to".to_string(),
                    inward: "relates to".to_string(),
                },
            ],
            custom_fields: vec![
                CustomFieldDefinition::new(10_000, "Story Points", NUMBER)
                    .with_description("Relative size of the work")
                    .with_scheme(FieldConfigScheme::global(10_000, FieldConfig::new(10_000)).for_projects(vec![HR])),
                CustomFieldDefinition::new(10_001, "Severity", SELECT).with_scheme(FieldConfigScheme::global(
                    10_001,
                    FieldConfig::new(10_001)
                        .with_options(vec!["Low".into(), "Medium".into(), "High".into()])
                        .with_default(CustomFieldValue::Options(vec!["Medium".into()])),
                )),
                CustomFieldDefinition::new(10_002, "Notes", TEXT_AREA)
                    .with_scheme(FieldConfigScheme::global(10_002, FieldConfig::new(10_002))),
            ],
        }
    }
}

impl SiteActivity {
    /// Issues HR-1 (a bug), HR-2 (a task), HR-3 (a sub-task of HR-1) and
    /// MKT-1, with one comment on HR-1.
    #[must_use]
    pub fn demo() -> Self {
        let created = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).single().unwrap_or_else(Utc::now);
        let dated = |mut issue: Issue| {
            issue.created = created;
            issue.updated = created;
            issue.status = Some("Open".to_string());
            issue.reporter = Some(user("admin", "Administrator"));
            issue
        };

        let mut payroll = dated(
            Issue::new(human_resources(), bug())
                .with_key(1, "HR-1")
                .with_summary("Payroll export drops the last row")
                .with_assignee(user("fred", "Fred Normal"))
                .with_estimates(Some(2 * HOUR), Some(HOUR)),
        );
        payroll.description = Some("Exporting March payroll to CSV loses the final employee.".to_string());
        payroll.subtask_ids = vec![3];

        let handbook = dated(
            Issue::new(human_resources(), IssueType::new("2", "Task"))
                .with_key(2, "HR-2")
                .with_summary("Update the staff handbook"),
        );

        let subtask = dated(
            Issue::new(human_resources(), IssueType::subtask("3", "Sub-task"))
                .with_key(3, "HR-3")
                .with_summary("Add a regression test for the export")
                .with_parent(1),
        );

        let campaign = dated(
            Issue::new(marketing(), IssueType::new("2", "Task"))
                .with_key(4, "MKT-1")
                .with_summary("Plan the spring campaign"),
        );

        Self {
            issues: vec![payroll, handbook, subtask, campaign],
            comments: vec![Comment {
                id: 100,
                issue_id: 1,
                author: Some("fred".to_string()),
                body: "Seen on staging as well.".to_string(),
                visibility: Visibility::Public,
                created,
                updated: created,
            }],
            worklogs: Vec::new(),
            links: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySite;
    use crate::services::{FieldLayoutManager, IssueManager, PermissionManager};
    use crate::settings::SiteSettings;
    use std::sync::Arc;

    #[test]
    fn test_demo_site_is_consistent() {
        let site = Arc::new(InMemorySite::new(SiteSettings::default(), SiteData::demo(), SiteActivity::demo()));

        let parent = site.issue_by_key("HR-1").unwrap();
        assert_eq!(site.subtasks(parent.id.unwrap()).len(), 1);
        assert_eq!(site.field_layout(HR, "1").id, Some(HR_BUG_LAYOUT));
        assert_eq!(site.field_layout(HR, "2").id, None);

        let bob = site.data().users.into_iter().find(|u| u.name == "bob");
        assert!(!site.has_permission(Permission::EditIssue, &human_resources(), bob.as_ref()));
        assert!(site.has_permission(Permission::Browse, &marketing(), None));
    }

    #[test]
    fn test_demo_survives_serialization() {
        let json = serde_json::to_string(&SiteData::demo()).unwrap();
        let back: SiteData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SiteData::demo());
    }
}
