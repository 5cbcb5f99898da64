//! Issue security level.
//!
//! Sub-tasks never carry their own level: they inherit the parent's, and
//! changing a parent's level rewrites its sub-tasks.

use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::{FieldError, Result};
use crate::field::ids::SECURITY;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{add_required_error, hidden_or_permission, render};
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, Project, SecurityLevel, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, IdOrName, JsonType, StandardOperation, id_or_name};
use crate::services::{FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::params::first_non_blank;
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

/// Id submitted for "None".
pub const NO_LEVEL_ID: &str = "-1";

pub const BULK_UNAVAILABLE_MULTIPLE_SCHEMES: &str = "bulk.edit.unavailable.multiplesecurityschemes";
pub const BULK_UNAVAILABLE_NO_SCHEME: &str = "bulk.edit.unavailable.nosecurityscheme";

#[derive(Debug)]
pub struct SecurityLevelSystemField {
    services: FieldServices,
}

impl SecurityLevelSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn level_json(level: &SecurityLevel) -> Value {
        json!({"id": level.id.to_string(), "name": level.name})
    }

    /// The level a holder entry names; `Ok(None)` for "None" or absent.
    fn level_from_holder(&self, holder: &FieldValuesHolder) -> Result<Option<SecurityLevel>> {
        match holder.text(SECURITY).filter(|id| *id != NO_LEVEL_ID) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .and_then(|id| self.services.security_levels.level(id))
                .map(Some)
                .ok_or_else(|| FieldError::FieldValidation(format!("security level {raw} does not exist"))),
        }
    }

    fn default_level(&self, project: &Project) -> Option<SecurityLevel> {
        project
            .security_scheme_id
            .and_then(|scheme| self.services.security_levels.default_level(scheme))
    }

    fn level_id(level: Option<&SecurityLevel>) -> Option<String> {
        level.map(|l| l.id.to_string())
    }

    /// Rewrite the level of every sub-task of `parent`.
    fn update_subtasks(&self, parent: &Issue, level: Option<&SecurityLevel>) -> Result<usize> {
        let Some(parent_id) = parent.id else {
            return Ok(0);
        };
        let subtasks = self.services.issues.subtasks(parent_id);
        let count = subtasks.len();
        for mut subtask in subtasks {
            subtask.security_level = level.cloned();
            subtask.parent_security_level = level.cloned();
            subtask.touch();
            self.services.issues.store(subtask)?;
        }
        Ok(count)
    }
}

impl Field for SecurityLevelSystemField {
    fn id(&self) -> &str {
        SECURITY
    }

    fn name_key(&self) -> &str {
        "issue.field.securitylevel"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable()
    }

    fn as_orderable(&self) -> Option<&dyn OrderableField> {
        Some(self)
    }

    fn as_navigable(&self) -> Option<&dyn NavigableField> {
        Some(self)
    }

    fn as_rest_aware(&self) -> Option<&dyn RestAwareField> {
        Some(self)
    }
}

impl NavigableField for SecurityLevelSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Desc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        issue.security_level.as_ref().map(|l| l.name.clone())
    }
}

impl OrderableField for SecurityLevelSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Text(params.get(SECURITY).and_then(first_non_blank).map(str::to_string))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(SECURITY, FieldValue::Text(Self::level_id(issue.security_level.as_ref())));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        let level = if issue.is_subtask() {
            issue.parent_security_level.clone()
        } else {
            self.default_level(&issue.project)
        };
        holder.insert(SECURITY, FieldValue::Text(Self::level_id(level.as_ref())));
    }

    /// Keep a level of the same name in the target scheme, otherwise fall
    /// back to the target's default.
    fn populate_for_move(&self, holder: &mut FieldValuesHolder, original: &Issue, target: &Issue) {
        let same_name = original.security_level.as_ref().and_then(|level| {
            let scheme = target.project.security_scheme_id?;
            self.services
                .security_levels
                .levels_for_scheme(scheme)
                .into_iter()
                .find(|l| l.name == level.name)
        });
        let level = same_name.or_else(|| self.default_level(&target.project));
        holder.insert(SECURITY, FieldValue::Text(Self::level_id(level.as_ref())));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, issue: &Issue) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            holder.insert(SECURITY, FieldValue::Text(None));
            return Ok(());
        }
        let level = issue
            .project
            .security_scheme_id
            .map(|scheme| self.services.security_levels.levels_for_scheme(scheme))
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.name.eq_ignore_ascii_case(value) || l.id.to_string() == value)
            .ok_or_else(|| {
                FieldError::FieldValidation(self.services.i18n.text("createissue.error.security.level.invalid", &[]))
            })?;
        holder.insert(SECURITY, FieldValue::Text(Some(level.id.to_string())));
        Ok(())
    }

    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        item: &FieldLayoutItem,
    ) {
        if issue.is_subtask() {
            return;
        }
        let Ok(level) = self.level_from_holder(&ctx.holder) else {
            errors.add_error(SECURITY, i18n.text("createissue.error.security.level.invalid", &[]));
            return;
        };
        let Some(level) = level else {
            if item.required {
                add_required_error(errors, SECURITY, self.name_key(), i18n);
            }
            return;
        };
        if issue.project.security_scheme_id != Some(level.scheme_id) {
            errors.add_error(SECURITY, i18n.text("createissue.error.security.level.invalid", &[]));
            return;
        }
        let unchanged = issue.security_level.as_ref().is_some_and(|l| l.id == level.id);
        let usable = self
            .services
            .security_levels
            .usable_levels(&issue.project, ctx.caller.as_ref());
        if !unchanged && !usable.iter().any(|l| l.id == level.id) {
            errors.add_error(SECURITY, i18n.text("createissue.error.security.level.invalid", &[]));
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        Ok(self
            .level_from_holder(holder)?
            .map_or(IssueValue::Empty, IssueValue::SecurityLevel))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        issue.security_level.clone().map_or(IssueValue::Empty, IssueValue::SecurityLevel)
    }

    fn default_value(&self, issue: &Issue) -> IssueValue {
        self.default_level(&issue.project)
            .map_or(IssueValue::Empty, IssueValue::SecurityLevel)
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if patch.issue().is_subtask() {
            let inherited = patch.issue().parent_security_level.clone();
            patch.set_security_level(inherited);
            return Ok(());
        }
        if !holder.contains(SECURITY) {
            return Ok(());
        }
        let level = self.level_from_holder(holder)?;
        patch.set_security_level(level);
        Ok(())
    }

    /// History item plus the sub-task cascade.
    fn update_value(
        &self,
        _caller: Option<&User>,
        _item: Option<&FieldLayoutItem>,
        issue: &Issue,
        modified: &ModifiedValue,
        changes: &mut IssueChangeHolder,
    ) -> Result<()> {
        let split = |value: &IssueValue| match value {
            IssueValue::SecurityLevel(l) => (Some(l.id.to_string()), Some(l.name.clone())),
            _ => (None, None),
        };
        let (old_id, old_name) = split(&modified.old);
        let (new_id, new_name) = split(&modified.new);
        changes.add_change_item(
            ChangeItemBean::jira(SECURITY)
                .from_value(old_id, old_name)
                .to_value(new_id, new_name),
        );

        if !issue.is_subtask() {
            let level = match &modified.new {
                IssueValue::SecurityLevel(level) => Some(level),
                _ => None,
            };
            let updated = self.update_subtasks(issue, level)?;
            if updated > 0 {
                debug!(issue = issue.display_key(), updated, "Updated sub-task security levels");
                changes.subtasks_updated = true;
            }
        }
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        issue.security_level.is_some()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        patch.set_security_level(None);
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        let target_scheme = target.project.security_scheme_id;
        let needs_input = originals.iter().filter(|o| !o.is_subtask()).any(|original| match &original.security_level {
            Some(level) => target_scheme != Some(level.scheme_id),
            None => target_item.required && target_scheme.is_some(),
        });
        MessagedResult::new(needs_input)
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        let schemes: BTreeSet<Option<i64>> = bean.projects().iter().map(|p| p.security_scheme_id).collect();
        if schemes.len() > 1 {
            return Some(BULK_UNAVAILABLE_MULTIPLE_SCHEMES);
        }
        if schemes.iter().any(Option::is_none) {
            return Some(BULK_UNAVAILABLE_NO_SCHEME);
        }
        hidden_or_permission(
            SECURITY,
            self.services.permissions.as_ref(),
            bean,
            Some(Permission::SetIssueSecurity),
        )
    }

    fn is_shown(&self, issue: &Issue, caller: Option<&User>) -> bool {
        issue.project.security_scheme_id.is_some()
            && self
                .services
                .permissions
                .has_permission(Permission::SetIssueSecurity, &issue.project, caller)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(SECURITY, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("securityLevel", &issue.security_level);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current = request
                    .holder
                    .and_then(|h| h.text(SECURITY).map(str::to_string))
                    .or_else(|| Self::level_id(issue.security_level.as_ref()));
                let levels = self
                    .services
                    .security_levels
                    .usable_levels(&issue.project, request.caller);
                if levels.is_empty() {
                    warn!(project = %issue.project.key, "No usable security levels to render");
                }
                params.insert_serialized("securityLevels", &levels);
                params.insert("currentSecurityLevel", current);
                params.insert("noneLevelId", NO_LEVEL_ID);
                params.insert("isSubtask", issue.is_subtask());
            }
        }
        render(self.services.renderer.as_ref(), &format!("security-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for SecurityLevelSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("securitylevel", SECURITY)
    }

    fn field_type_info(&self, project: &Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        let allowed = project
            .security_scheme_id
            .map(|scheme| self.services.security_levels.levels_for_scheme(scheme))
            .unwrap_or_default()
            .iter()
            .map(Self::level_json)
            .collect();
        FieldTypeInfo {
            allowed_values: Some(allowed),
            auto_complete_url: None,
        }
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        let json = issue.security_level.as_ref().map_or(Value::Null, Self::level_json);
        Some(FieldJsonRepresentation::new(json))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Set]
    }

    fn apply_operations(
        &self,
        issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        let levels = issue
            .project
            .security_scheme_id
            .map(|scheme| self.services.security_levels.levels_for_scheme(scheme))
            .unwrap_or_default();
        for op in check_supported(self, operations, errors) {
            if op.value.is_null() {
                params.set(SECURITY, vec![NO_LEVEL_ID.to_string()]);
                continue;
            }
            let found = id_or_name(&op.value).and_then(|reference| {
                levels.iter().find(|l| match &reference {
                    IdOrName::Id(id) => &l.id.to_string() == id,
                    IdOrName::Name(name) => l.name.eq_ignore_ascii_case(name),
                })
            });
            match found {
                Some(level) => params.set(SECURITY, vec![level.id.to_string()]),
                None => errors.add_error(
                    SECURITY,
                    self.services.i18n.text("createissue.error.security.level.invalid", &[]),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use crate::layout::{BulkOperation, IssueOperation};
    use crate::services::IssueManager;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn validate(field: &SecurityLevelSystemField, raw: &str, issue: &Issue, caller: &str) -> ErrorCollection {
        let mut ctx = OperationContext::new(IssueOperation::Edit, Some(testing::user(caller)));
        field.populate_from_params(&mut ctx.holder, &RequestParams::new().with(SECURITY, raw));
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, issue, &FieldLayoutItem::new(SECURITY));
        errors
    }

    #[test]
    fn test_only_permitted_callers_change_level() {
        let field = SecurityLevelSystemField::new(testing::services());
        let issue = testing::issue();

        assert!(!validate(&field, "10000", &issue, "admin").has_any_errors());
        assert_eq!(
            validate(&field, "10000", &issue, "fred").error(SECURITY),
            Some("Security level is invalid.")
        );
        assert!(validate(&field, "999", &issue, "admin").has_any_errors());
        assert!(!validate(&field, NO_LEVEL_ID, &issue, "fred").has_any_errors());
    }

    #[test]
    fn test_level_from_other_scheme_rejected() {
        let field = SecurityLevelSystemField::new(testing::services());
        let campaign = testing::stored("MKT-1");
        assert!(validate(&field, "10000", &campaign, "admin").has_any_errors());
    }

    #[test]
    fn test_subtask_inherits_parent_level() {
        let field = SecurityLevelSystemField::new(testing::services());
        let mut subtask = testing::stored("HR-3");
        subtask.parent_security_level = Some(SecurityLevel::new(10_001, 10_000, "Staff"));
        let mut holder = FieldValuesHolder::new();
        holder.insert(SECURITY, FieldValue::text("10000"));
        let mut patch = IssuePatch::new(subtask.clone());

        assert!(!validate(&field, "999", &subtask, "fred").has_any_errors());
        field.update_issue(None, &mut patch, &mut holder).unwrap();

        assert_eq!(patch.issue().security_level.as_ref().map(|l| l.id), Some(10_001));
    }

    #[test]
    fn test_parent_change_cascades_to_subtasks() {
        let site = testing::site();
        let field = SecurityLevelSystemField::new(site.services());
        let internal = SecurityLevel::new(10_000, 10_000, "Internal");
        let modified = ModifiedValue::new(IssueValue::Empty, IssueValue::SecurityLevel(internal.clone()));
        let mut changes = IssueChangeHolder::new();

        field
            .update_value(None, None, &testing::issue(), &modified, &mut changes)
            .unwrap();

        assert_eq!(changes.items[0].field, "security");
        assert_eq!(changes.items[0].to_string.as_deref(), Some("Internal"));
        assert!(changes.subtasks_updated);
        let subtask = site.issue_by_key("HR-3").unwrap();
        assert_eq!(subtask.security_level, Some(internal));
    }

    #[test]
    fn test_bulk_edit_needs_one_scheme() {
        let field = SecurityLevelSystemField::new(testing::services());
        let admin = Some(testing::user("admin"));

        let mixed = BulkEditBean::new(BulkOperation::Edit, admin.clone(), vec![testing::issue(), testing::stored("MKT-1")]);
        assert_eq!(field.available_for_bulk_edit(&mixed), Some(BULK_UNAVAILABLE_MULTIPLE_SCHEMES));

        let none = BulkEditBean::new(BulkOperation::Edit, admin.clone(), vec![testing::stored("MKT-1")]);
        assert_eq!(field.available_for_bulk_edit(&none), Some(BULK_UNAVAILABLE_NO_SCHEME));

        let hr = BulkEditBean::new(BulkOperation::Edit, admin, vec![testing::issue(), testing::stored("HR-2")]);
        assert_eq!(field.available_for_bulk_edit(&hr), None);
    }

    #[test]
    fn test_needs_move_into_project_without_level() {
        let field = SecurityLevelSystemField::new(testing::services());
        let mut original = testing::issue();
        original.security_level = Some(SecurityLevel::new(10_000, 10_000, "Internal"));

        let target = testing::stored("MKT-1");
        assert!(field.needs_move(&[original.clone()], &target, &FieldLayoutItem::new(SECURITY)).needs_input);
        assert!(!field.needs_move(&[original], &testing::issue(), &FieldLayoutItem::new(SECURITY)).needs_input);
    }

    #[test]
    fn test_round_trip_from_issue() {
        let field = SecurityLevelSystemField::new(testing::services());
        let mut issue = testing::issue();
        issue.security_level = Some(SecurityLevel::new(10_001, 10_000, "Staff"));
        let mut holder = FieldValuesHolder::new();

        field.populate_from_issue(&mut holder, &issue);

        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));
    }
}
