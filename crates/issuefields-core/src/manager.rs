//! The field registry.
//!
//! [`FieldManager`] owns one instance of every system field, in a fixed
//! order, plus the custom fields defined on the site. It answers the
//! questions screens and navigators ask: which fields are orderable or
//! navigable, which are hidden for a set of layouts, and which are switched
//! off by site settings.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::custom::{CustomField, CustomFieldTypeRegistry};
use crate::field::ids::{
    AGGREGATE_PROGRESS, AGGREGATE_TIME_ESTIMATE, AGGREGATE_TIME_ORIGINAL_ESTIMATE, AGGREGATE_TIME_SPENT,
    CUSTOM_FIELD_PREFIX, PROGRESS, PROJECT, SUBTASKS, TIME_ESTIMATE, TIME_ORIGINAL_ESTIMATE, TIME_SPENT, TIMETRACKING,
    VOTES, WATCHES, WORKLOG,
};
use crate::field::{Field, NavigableField};
use crate::fields::{
    AssigneeSystemField, CommentSystemField, ComponentsSystemField, IssueLinksSystemField, IssueTypeSystemField,
    NavigableKind, NavigableSystemField, ProjectSystemField, ResolutionSystemField, SecurityLevelSystemField,
    TextKind, TextSystemField, TimeTrackingSystemField, VersionKind, VersionsSystemField, WorklogSystemField,
};
use crate::issue::{Issue, User};
use crate::layout::{FieldLayout, FieldLayoutItem};
use crate::rest::FieldMeta;
use crate::services::FieldServices;

/// Custom fields built from the site's definitions.
#[derive(Debug, Default)]
struct CustomFields {
    ordered: Vec<Arc<CustomField>>,
    by_id: HashMap<String, Arc<CustomField>>,
}

/// Registry of every field known to a site.
#[derive(Debug)]
pub struct FieldManager {
    services: FieldServices,
    types: CustomFieldTypeRegistry,
    system: Vec<Arc<dyn Field>>,
    by_id: HashMap<String, Arc<dyn Field>>,
    custom: RwLock<Option<Arc<CustomFields>>>,
}

impl FieldManager {
    /// A manager using the built-in custom field types.
    #[must_use]
    pub fn new(services: FieldServices) -> Self {
        Self::with_custom_types(services, CustomFieldTypeRegistry::builtin())
    }

    #[must_use]
    pub fn with_custom_types(services: FieldServices, types: CustomFieldTypeRegistry) -> Self {
        let system = Self::system_fields_for(&services);
        let by_id = system.iter().map(|f| (f.id().to_string(), Arc::clone(f))).collect();
        Self {
            services,
            types,
            system,
            by_id,
            custom: RwLock::new(None),
        }
    }

    /// Build the system fields in their canonical order.
    fn system_fields_for(services: &FieldServices) -> Vec<Arc<dyn Field>> {
        let s = || services.clone();
        let navigable = |kind: NavigableKind| -> Arc<dyn Field> { Arc::new(NavigableSystemField::new(kind, s())) };
        let components = Arc::new(ComponentsSystemField::new(s()));
        let time_tracking = Arc::new(TimeTrackingSystemField::new(s()));

        vec![
            Arc::new(ProjectSystemField::new(s())),
            navigable(NavigableKind::IssueKey),
            Arc::new(TextSystemField::new(TextKind::Summary, s())),
            Arc::new(IssueTypeSystemField::new(s())),
            navigable(NavigableKind::Status),
            navigable(NavigableKind::Priority),
            Arc::new(ResolutionSystemField::new(s())),
            Arc::new(AssigneeSystemField::new(s(), components.clone())),
            navigable(NavigableKind::Reporter),
            navigable(NavigableKind::Creator),
            navigable(NavigableKind::Created),
            navigable(NavigableKind::LastViewed),
            navigable(NavigableKind::Updated),
            navigable(NavigableKind::ResolutionDate),
            Arc::new(VersionsSystemField::new(VersionKind::Affected, s())),
            Arc::new(VersionsSystemField::new(VersionKind::Fix, s())),
            components,
            navigable(NavigableKind::DueDate),
            navigable(NavigableKind::Votes),
            navigable(NavigableKind::Watches),
            navigable(NavigableKind::Thumbnail),
            navigable(NavigableKind::OriginalEstimate),
            navigable(NavigableKind::RemainingEstimate),
            navigable(NavigableKind::TimeSpent),
            navigable(NavigableKind::WorkRatio),
            navigable(NavigableKind::Subtasks),
            Arc::new(IssueLinksSystemField::new(s())),
            navigable(NavigableKind::Attachment),
            Arc::new(TextSystemField::new(TextKind::Environment, s())),
            Arc::new(TextSystemField::new(TextKind::Description, s())),
            time_tracking.clone(),
            Arc::new(SecurityLevelSystemField::new(s())),
            Arc::new(CommentSystemField::new(s())),
            navigable(NavigableKind::Progress),
            navigable(NavigableKind::AggregateProgress),
            navigable(NavigableKind::AggregateTimeSpent),
            navigable(NavigableKind::AggregateRemainingEstimate),
            navigable(NavigableKind::AggregateOriginalEstimate),
            navigable(NavigableKind::Labels),
            Arc::new(WorklogSystemField::new(s(), time_tracking)),
        ]
    }

    #[must_use]
    pub const fn services(&self) -> &FieldServices {
        &self.services
    }

    /// System fields in canonical order.
    #[must_use]
    pub fn system_fields(&self) -> &[Arc<dyn Field>] {
        &self.system
    }

    /// A system or custom field by id.
    #[must_use]
    pub fn field(&self, id: &str) -> Option<Arc<dyn Field>> {
        if let Some(field) = self.by_id.get(id) {
            return Some(Arc::clone(field));
        }
        self.custom_field(id).map(|f| f as Arc<dyn Field>)
    }

    #[must_use]
    pub fn is_custom_field_id(id: &str) -> bool {
        id.strip_prefix(CUSTOM_FIELD_PREFIX)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }

    fn custom_cache(&self) -> Arc<CustomFields> {
        if let Some(cached) = self.custom.read().unwrap_or_else(std::sync::PoisonError::into_inner).as_ref() {
            return Arc::clone(cached);
        }
        let mut slot = self.custom.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        // Another caller may have filled the cache while we waited.
        if let Some(cached) = slot.as_ref() {
            return Arc::clone(cached);
        }
        let loaded = Arc::new(self.load_custom_fields());
        *slot = Some(Arc::clone(&loaded));
        loaded
    }

    fn load_custom_fields(&self) -> CustomFields {
        let mut fields = CustomFields::default();
        for definition in self.services.custom_fields.custom_field_definitions() {
            let Some(field_type) = self.types.get(&definition.type_key) else {
                warn!(
                    field_id = %definition.field_id(),
                    type_key = %definition.type_key,
                    "Skipping custom field of unknown type"
                );
                continue;
            };
            let field = Arc::new(CustomField::new(definition, field_type, self.services.clone()));
            fields.by_id.insert(field.id().to_string(), Arc::clone(&field));
            fields.ordered.push(field);
        }
        debug!(count = fields.ordered.len(), "Loaded custom fields");
        fields
    }

    /// Drop cached custom fields; the next lookup reloads definitions.
    pub fn refresh(&self) {
        *self.custom.write().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        debug!("Custom field cache cleared");
    }

    #[must_use]
    pub fn custom_fields(&self) -> Vec<Arc<CustomField>> {
        self.custom_cache().ordered.clone()
    }

    #[must_use]
    pub fn custom_field(&self, id: &str) -> Option<Arc<CustomField>> {
        if !Self::is_custom_field_id(id) {
            return None;
        }
        self.custom_cache().by_id.get(id).cloned()
    }

    /// Every field, system fields first.
    #[must_use]
    pub fn all_fields(&self) -> Vec<Arc<dyn Field>> {
        self.system
            .iter()
            .cloned()
            .chain(self.custom_fields().into_iter().map(|f| f as Arc<dyn Field>))
            .collect()
    }

    /// Whether a field may be placed on screens. The project field is
    /// excluded: changing it is a move.
    #[must_use]
    pub fn is_orderable_field(&self, field: &dyn Field) -> bool {
        field.id() != PROJECT && field.as_orderable().is_some()
    }

    #[must_use]
    pub fn is_navigable_field(&self, field: &dyn Field) -> bool {
        field.as_navigable().is_some()
    }

    #[must_use]
    pub fn orderable_fields(&self) -> Vec<Arc<dyn Field>> {
        self.all_fields()
            .into_iter()
            .filter(|f| self.is_orderable_field(f.as_ref()))
            .collect()
    }

    #[must_use]
    pub fn navigable_fields(&self) -> Vec<Arc<dyn Field>> {
        self.all_fields()
            .into_iter()
            .filter(|f| self.is_navigable_field(f.as_ref()))
            .collect()
    }

    #[must_use]
    pub fn searchable_fields(&self) -> Vec<Arc<dyn Field>> {
        self.all_fields().into_iter().filter(|f| f.traits().searchable).collect()
    }

    /// Look up an orderable field, for callers that drive the lifecycle.
    #[must_use]
    pub fn orderable_field(&self, id: &str) -> Option<Arc<dyn Field>> {
        self.field(id).filter(|f| self.is_orderable_field(f.as_ref()))
    }

    /// System fields switched off by site settings.
    #[must_use]
    pub fn unavailable_fields(&self) -> BTreeSet<&'static str> {
        let settings = &self.services.settings;
        let mut unavailable = BTreeSet::new();
        if !settings.time_tracking {
            unavailable.extend([TIMETRACKING, TIME_ORIGINAL_ESTIMATE, TIME_ESTIMATE, TIME_SPENT, PROGRESS, WORKLOG]);
        }
        if !settings.subtasks || !settings.time_tracking {
            unavailable.extend([
                AGGREGATE_TIME_SPENT,
                AGGREGATE_TIME_ESTIMATE,
                AGGREGATE_TIME_ORIGINAL_ESTIMATE,
                AGGREGATE_PROGRESS,
            ]);
        }
        if !settings.voting {
            unavailable.insert(VOTES);
        }
        if !settings.watching {
            unavailable.insert(WATCHES);
        }
        if !settings.subtasks {
            unavailable.insert(SUBTASKS);
        }
        unavailable
    }

    #[must_use]
    pub fn is_field_available(&self, id: &str) -> bool {
        !self.unavailable_fields().contains(id)
    }

    /// A field is hidden only if every layout hides it. Fields that cannot
    /// go on screens are never hidden.
    #[must_use]
    pub fn is_field_hidden(&self, layouts: &[Arc<FieldLayout>], field: &dyn Field) -> bool {
        if !self.is_orderable_field(field) {
            return false;
        }
        layouts.iter().all(|layout| layout.is_field_hidden(field.id()))
    }

    /// The distinct layouts of every project the user may browse.
    #[must_use]
    pub fn visible_field_layouts(&self, caller: Option<&User>) -> Vec<Arc<FieldLayout>> {
        let project_ids: Vec<i64> = self
            .services
            .permissions
            .browsable_projects(caller)
            .iter()
            .map(|p| p.id)
            .collect();
        self.layouts_in_scope(&project_ids, &[])
    }

    fn layouts_in_scope(&self, project_ids: &[i64], issue_type_ids: &[String]) -> Vec<Arc<FieldLayout>> {
        let mut layouts: Vec<Arc<FieldLayout>> = Vec::new();
        let mut push = |layout: Arc<FieldLayout>| {
            if !layouts.iter().any(|l| l.id == layout.id) {
                layouts.push(layout);
            }
        };
        for &project_id in project_ids {
            if issue_type_ids.is_empty() {
                self.services
                    .layouts
                    .unique_field_layouts(project_id)
                    .into_iter()
                    .for_each(&mut push);
            } else {
                for issue_type_id in issue_type_ids {
                    push(self.services.layouts.field_layout(project_id, issue_type_id));
                }
            }
        }
        layouts
    }

    /// Whether a field is hidden in every layout the user can reach.
    #[must_use]
    pub fn is_field_hidden_for(&self, caller: Option<&User>, field_id: &str) -> bool {
        self.field(field_id)
            .is_some_and(|field| self.is_field_hidden(&self.visible_field_layouts(caller), field.as_ref()))
    }

    /// Navigable fields the user can use as columns.
    #[must_use]
    pub fn available_navigable_fields(&self, caller: Option<&User>) -> Vec<Arc<dyn Field>> {
        self.available_navigable_fields_with_scope(caller, &[], &[])
    }

    /// Navigable fields available for the given projects and issue types
    /// (empty means all). Projects the user cannot browse are ignored.
    #[must_use]
    pub fn available_navigable_fields_with_scope(
        &self,
        caller: Option<&User>,
        project_ids: &[i64],
        issue_type_ids: &[String],
    ) -> Vec<Arc<dyn Field>> {
        let browsable: Vec<i64> = self
            .services
            .permissions
            .browsable_projects(caller)
            .iter()
            .map(|p| p.id)
            .filter(|id| project_ids.is_empty() || project_ids.contains(id))
            .collect();
        let layouts = self.layouts_in_scope(&browsable, issue_type_ids);
        let unavailable = self.unavailable_fields();

        let system = self
            .system
            .iter()
            .filter(|f| self.is_navigable_field(f.as_ref()))
            .filter(|f| !unavailable.contains(f.id()))
            .cloned();
        let custom = self
            .custom_fields()
            .into_iter()
            .filter(|f| f.is_in_scope_for(&browsable, issue_type_ids))
            .map(|f| f as Arc<dyn Field>);

        system
            .chain(custom)
            .filter(|f| !self.is_field_hidden(&layouts, f.as_ref()))
            .collect()
    }

    /// The layout governing an issue.
    #[must_use]
    pub fn field_layout(&self, issue: &Issue) -> Arc<FieldLayout> {
        self.services.layouts.field_layout(issue.project.id, &issue.issue_type.id)
    }

    /// The layout item of one field for an issue.
    #[must_use]
    pub fn layout_item(&self, issue: &Issue, field_id: &str) -> FieldLayoutItem {
        self.field_layout(issue).item(field_id)
    }

    /// Orderable fields that are visible in the issue's layout and shown
    /// for the caller, in canonical order.
    #[must_use]
    pub fn screen_fields(&self, issue: &Issue, caller: Option<&User>) -> Vec<Arc<dyn Field>> {
        let layout = self.field_layout(issue);
        let unavailable = self.unavailable_fields();
        self.orderable_fields()
            .into_iter()
            .filter(|f| !unavailable.contains(f.id()) && !layout.is_field_hidden(f.id()))
            .filter(|f| {
                if let Some(custom) = self.custom_field(f.id()) {
                    return custom.is_in_scope(issue.project.id, &issue.issue_type.id);
                }
                true
            })
            .filter(|f| f.as_orderable().is_some_and(|o| o.is_shown(issue, caller)))
            .collect()
    }

    /// Listing entry for the field endpoint.
    #[must_use]
    pub fn field_meta(&self, field: &dyn Field) -> FieldMeta {
        let i18n = self.services.i18n.as_ref();
        let name = field.name(i18n);
        let clause_names = if field.traits().searchable {
            match field.id().strip_prefix(CUSTOM_FIELD_PREFIX) {
                Some(number) => vec![format!("cf[{number}]"), name.clone()],
                None => vec![field.id().to_string()],
            }
        } else {
            Vec::new()
        };
        FieldMeta {
            id: field.id().to_string(),
            key: field.id().to_string(),
            name,
            custom: field.is_custom(),
            orderable: self.is_orderable_field(field),
            navigable: self.is_navigable_field(field),
            searchable: field.traits().searchable,
            schema: field.as_rest_aware().map(|f| f.json_schema()),
            clause_names,
        }
    }

    /// Column heading and value of a navigable field for an issue.
    #[must_use]
    pub fn column(&self, field: &dyn Field, issue: &Issue) -> Option<(String, Option<String>)> {
        let navigable: &dyn NavigableField = field.as_navigable()?;
        let heading = self.services.i18n.text(navigable.column_heading_key(), &[]);
        Some((heading, navigable.column_value(issue)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom::types::TEXT_FIELD;
    use crate::custom::{CustomFieldDefinition, FieldConfig, FieldConfigScheme};
    use crate::field::ids::{
        ASSIGNEE, COMMENT, COMPONENTS, DESCRIPTION, ENVIRONMENT, ISSUE_KEY, ISSUE_LINKS, LABELS, STATUS, SUMMARY,
    };
    use crate::settings::SiteSettings;
    use crate::testing;
    use pretty_assertions::assert_eq;

    const CANONICAL: [&str; 40] = [
        "project",
        "issuekey",
        "summary",
        "issuetype",
        "status",
        "priority",
        "resolution",
        "assignee",
        "reporter",
        "creator",
        "created",
        "lastViewed",
        "updated",
        "resolutiondate",
        "versions",
        "fixVersions",
        "components",
        "duedate",
        "votes",
        "watches",
        "thumbnail",
        "timeoriginalestimate",
        "timeestimate",
        "timespent",
        "workratio",
        "subtasks",
        "issuelinks",
        "attachment",
        "environment",
        "description",
        "timetracking",
        "security",
        "comment",
        "progress",
        "aggregateprogress",
        "aggregatetimespent",
        "aggregatetimeestimate",
        "aggregatetimeoriginalestimate",
        "labels",
        "worklog",
    ];

    fn manager() -> FieldManager {
        FieldManager::new(testing::services())
    }

    fn ids(fields: &[Arc<dyn Field>]) -> Vec<String> {
        fields.iter().map(|f| f.id().to_string()).collect()
    }

    #[test]
    fn test_system_fields_in_canonical_order() {
        assert_eq!(ids(manager().system_fields()), CANONICAL);
    }

    #[test]
    fn test_orderable_view_excludes_project() {
        let manager = manager();
        let orderable = ids(&manager.orderable_fields());

        assert!(!orderable.contains(&PROJECT.to_string()));
        assert!(orderable.contains(&SUMMARY.to_string()));
        assert!(orderable.contains(&COMMENT.to_string()));
        assert!(!orderable.contains(&STATUS.to_string()));
        assert!(orderable.contains(&"customfield_10000".to_string()));
        assert!(manager.field(PROJECT).unwrap().as_orderable().is_some());
    }

    #[test]
    fn test_navigable_and_searchable_views() {
        let manager = manager();
        let navigable = ids(&manager.navigable_fields());
        assert!(navigable.contains(&ISSUE_KEY.to_string()));
        assert!(navigable.contains(&COMPONENTS.to_string()));
        assert!(!navigable.contains(&COMMENT.to_string()));

        let searchable = ids(&manager.searchable_fields());
        assert!(searchable.contains(&LABELS.to_string()));
        assert!(!searchable.contains(&TIMETRACKING.to_string()));
    }

    #[test]
    fn test_unavailable_fields_follow_settings() {
        assert!(manager().unavailable_fields().is_empty());

        let no_time_tracking = SiteSettings::default().with_time_tracking(false);
        let manager = FieldManager::new(testing::site_with(no_time_tracking).services());
        let unavailable = manager.unavailable_fields();
        for id in [TIMETRACKING, TIME_ORIGINAL_ESTIMATE, TIME_ESTIMATE, TIME_SPENT, PROGRESS, WORKLOG] {
            assert!(unavailable.contains(id), "{id} should be unavailable");
        }
        assert!(unavailable.contains(AGGREGATE_PROGRESS));
        assert!(!unavailable.contains(SUBTASKS));

        let no_subtasks = SiteSettings::default().with_subtasks(false).with_voting(false).with_watching(false);
        let manager = FieldManager::new(testing::site_with(no_subtasks).services());
        let unavailable = manager.unavailable_fields();
        assert!(unavailable.contains(SUBTASKS));
        assert!(unavailable.contains(AGGREGATE_TIME_SPENT));
        assert!(unavailable.contains(VOTES));
        assert!(unavailable.contains(WATCHES));
        assert!(!unavailable.contains(TIMETRACKING));
    }

    #[test]
    fn test_hidden_only_when_hidden_everywhere() {
        let manager = manager();
        let environment = manager.field(ENVIRONMENT).unwrap();
        let hides = Arc::new(FieldLayout::new(Some(1), "A").with_item(FieldLayoutItem::new(ENVIRONMENT).hidden()));
        let shows = Arc::new(FieldLayout::new(Some(2), "B"));

        assert!(manager.is_field_hidden(&[hides.clone()], environment.as_ref()));
        assert!(!manager.is_field_hidden(&[hides.clone(), shows], environment.as_ref()));

        let status_hidden = Arc::new(FieldLayout::new(Some(3), "C").with_item(FieldLayoutItem::new(STATUS).hidden()));
        assert!(!manager.is_field_hidden(&[status_hidden], manager.field(STATUS).unwrap().as_ref()));
    }

    #[test]
    fn test_hidden_for_user_uses_reachable_layouts() {
        let manager = manager();
        // HR bugs hide the environment; other HR types and MKT use the default layout.
        assert!(!manager.is_field_hidden_for(Some(&testing::user("fred")), ENVIRONMENT));
        assert!(!manager.is_field_hidden_for(Some(&testing::user("fred")), DESCRIPTION));
    }

    #[test]
    fn test_available_navigable_fields_with_scope() {
        let manager = manager();
        let fred = testing::user("fred");

        let bugs_only = ids(&manager.available_navigable_fields_with_scope(Some(&fred), &[testing::HR], &["1".into()]));
        assert!(!bugs_only.contains(&ENVIRONMENT.to_string()));
        assert!(bugs_only.contains(&ISSUE_LINKS.to_string()));
        assert!(bugs_only.contains(&"customfield_10000".to_string()));

        let marketing = ids(&manager.available_navigable_fields_with_scope(Some(&fred), &[testing::MKT], &[]));
        assert!(marketing.contains(&ENVIRONMENT.to_string()));
        assert!(!marketing.contains(&"customfield_10000".to_string()));
        assert!(marketing.contains(&"customfield_10001".to_string()));
    }

    #[test]
    fn test_unavailable_fields_leave_navigator() {
        let settings = SiteSettings::default().with_time_tracking(false);
        let manager = FieldManager::new(testing::site_with(settings).services());
        let fields = ids(&manager.available_navigable_fields(Some(&testing::user("fred"))));
        assert!(!fields.contains(&TIME_SPENT.to_string()));
        assert!(fields.contains(&ASSIGNEE.to_string()));
    }

    #[test]
    fn test_refresh_reloads_custom_fields() {
        let site = testing::site();
        let manager = FieldManager::new(site.services());
        assert!(manager.custom_field("customfield_10100").is_none());

        site.add_custom_field(
            CustomFieldDefinition::new(10_100, "Team", TEXT_FIELD)
                .with_scheme(FieldConfigScheme::global(10_100, FieldConfig::new(10_100))),
        );
        assert!(manager.custom_field("customfield_10100").is_none());

        manager.refresh();
        let team = manager.custom_field("customfield_10100").unwrap();
        assert_eq!(team.definition().name, "Team");
    }

    #[test]
    fn test_unknown_custom_type_is_skipped() {
        let site = testing::site();
        site.add_custom_field(CustomFieldDefinition::new(10_200, "Mystery", "vendor:unknown"));
        let manager = FieldManager::new(site.services());
        assert!(manager.field("customfield_10200").is_none());
        assert_eq!(manager.custom_fields().len(), 3);
    }

    #[test]
    fn test_custom_field_ids() {
        assert!(FieldManager::is_custom_field_id("customfield_10000"));
        assert!(!FieldManager::is_custom_field_id("customfield_"));
        assert!(!FieldManager::is_custom_field_id("customfield_x"));
        assert!(!FieldManager::is_custom_field_id(SUMMARY));
    }

    #[test]
    fn test_field_meta() {
        let manager = manager();
        let summary = manager.field_meta(manager.field(SUMMARY).unwrap().as_ref());
        assert_eq!(summary.name, "Summary");
        assert!(summary.orderable && summary.navigable && !summary.custom);
        assert_eq!(summary.clause_names, vec!["summary"]);

        let points = manager.field_meta(manager.field("customfield_10000").unwrap().as_ref());
        assert!(points.custom);
        assert_eq!(points.clause_names, vec!["cf[10000]", "Story Points"]);
    }

    #[test]
    fn test_screen_fields_respect_layout_and_scope() {
        let manager = manager();
        let fred = testing::user("fred");
        let bug = ids(&manager.screen_fields(&testing::issue(), Some(&fred)));
        assert!(!bug.contains(&ENVIRONMENT.to_string()));
        assert!(bug.contains(&"customfield_10000".to_string()));

        let campaign = ids(&manager.screen_fields(&testing::stored("MKT-1"), Some(&fred)));
        assert!(campaign.contains(&ENVIRONMENT.to_string()));
        assert!(!campaign.contains(&"customfield_10000".to_string()));
    }
}
