//! The project an issue belongs to.
//!
//! Implements the orderable contract so create screens can carry it, but
//! the field manager leaves it out of the orderable view: changing it is a
//! move, not an edit.

use serde_json::{Value, json};

use crate::error::{FieldError, Result};
use crate::field::ids::PROJECT;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{BULK_UNAVAILABLE, add_required_error, render};
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, Project, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, IdOrName, JsonType, StandardOperation, id_or_name};
use crate::services::{FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::params::first_non_blank;
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

#[derive(Debug)]
pub struct ProjectSystemField {
    services: FieldServices,
}

impl ProjectSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn project_json(project: &Project) -> Value {
        json!({"id": project.id.to_string(), "key": project.key, "name": project.name})
    }

    fn lookup(&self, reference: &str) -> Option<Project> {
        match reference.parse::<i64>() {
            Ok(id) => self.services.projects.project(id),
            Err(_) => self.services.projects.project_by_key(reference),
        }
    }

    /// Projects the caller may create issues in.
    fn creatable_projects(&self, caller: Option<&User>) -> Vec<Project> {
        self.services
            .permissions
            .browsable_projects(caller)
            .into_iter()
            .filter(|p| self.services.permissions.has_permission(Permission::CreateIssue, p, caller))
            .collect()
    }
}

impl Field for ProjectSystemField {
    fn id(&self) -> &str {
        PROJECT
    }

    fn name_key(&self) -> &str {
        "issue.field.project"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::default().mandatory()
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

impl NavigableField for ProjectSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        Some(issue.project.name.clone())
    }
}

impl OrderableField for ProjectSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Text(params.get(PROJECT).and_then(first_non_blank).map(str::to_string))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(PROJECT, FieldValue::text(issue.project.id.to_string()));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        self.populate_from_issue(holder, issue);
    }

    fn populate_for_move(&self, holder: &mut FieldValuesHolder, _original: &Issue, target: &Issue) {
        self.populate_from_issue(holder, target);
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        let project = self.lookup(value.trim()).ok_or_else(|| {
            FieldError::FieldValidation(self.services.i18n.text("createissue.error.invalid.project", &[value]))
        })?;
        holder.insert(PROJECT, FieldValue::text(project.id.to_string()));
        Ok(())
    }

    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        _item: &FieldLayoutItem,
    ) {
        let Some(reference) = ctx.holder.text(PROJECT).map(str::to_string) else {
            add_required_error(errors, PROJECT, self.name_key(), i18n);
            return;
        };
        let caller = ctx.caller.as_ref();
        let Some(project) = self.lookup(&reference) else {
            errors.add_error(PROJECT, i18n.text("createissue.error.invalid.project", &[&reference]));
            return;
        };
        if !self.services.permissions.has_permission(Permission::CreateIssue, &project, caller) {
            errors.add_error(PROJECT, i18n.text("createissue.error.invalid.project", &[&project.key]));
            return;
        }
        let moving = !ctx.operation.is_create() && project.id != issue.project.id;
        if moving
            && !self
                .services
                .permissions
                .has_permission(Permission::MoveIssue, &issue.project, caller)
        {
            errors.add_error(PROJECT, i18n.text("createissue.error.invalid.project", &[&project.key]));
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let reference = holder
            .text(PROJECT)
            .ok_or_else(|| FieldError::FieldValidation("no project selected".into()))?;
        self.lookup(reference)
            .map(IssueValue::Project)
            .ok_or_else(|| FieldError::FieldValidation(format!("project {reference} does not exist")))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        IssueValue::Project(issue.project.clone())
    }

    fn default_value(&self, issue: &Issue) -> IssueValue {
        self.current_value(issue)
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if holder.text(PROJECT).is_none() {
            return Ok(());
        }
        if let IssueValue::Project(project) = self.value_from_params(holder)? {
            patch.set_project(project);
        }
        Ok(())
    }

    fn update_value(
        &self,
        _caller: Option<&User>,
        _item: Option<&FieldLayoutItem>,
        _issue: &Issue,
        modified: &ModifiedValue,
        changes: &mut IssueChangeHolder,
    ) -> Result<()> {
        let split = |value: &IssueValue| match value {
            IssueValue::Project(p) => (Some(p.id.to_string()), Some(p.name.clone())),
            _ => (None, None),
        };
        let (old_id, old_name) = split(&modified.old);
        let (new_id, new_name) = split(&modified.new);
        changes.add_change_item(
            ChangeItemBean::jira(PROJECT)
                .from_value(old_id, old_name)
                .to_value(new_id, new_name),
        );
        Ok(())
    }

    fn has_value(&self, _issue: &Issue) -> bool {
        true
    }

    fn needs_move(&self, _originals: &[Issue], _target: &Issue, _target_item: &FieldLayoutItem) -> MessagedResult {
        MessagedResult::no_input()
    }

    fn available_for_bulk_edit(&self, _bean: &BulkEditBean) -> Option<&'static str> {
        Some(BULK_UNAVAILABLE)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(PROJECT, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("project", &issue.project);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current = request
                    .holder
                    .and_then(|h| h.text(PROJECT).map(str::to_string))
                    .unwrap_or_else(|| issue.project.id.to_string());
                params.insert_serialized("projects", &self.creatable_projects(request.caller));
                params.insert("currentProject", current);
            }
        }
        render(self.services.renderer.as_ref(), &format!("project-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for ProjectSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("project", PROJECT)
    }

    fn field_type_info(&self, project: &Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        FieldTypeInfo {
            allowed_values: Some(vec![Self::project_json(project)]),
            auto_complete_url: None,
        }
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        Some(FieldJsonRepresentation::new(Self::project_json(&issue.project)))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Set]
    }

    fn apply_operations(
        &self,
        _issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        for op in check_supported(self, operations, errors) {
            let found = id_or_name(&op.value).and_then(|reference| match reference {
                IdOrName::Id(id) | IdOrName::Name(id) => self.lookup(&id),
            });
            match found {
                Some(project) => params.set(PROJECT, vec![project.id.to_string()]),
                None => errors.add_error(
                    PROJECT,
                    self.services
                        .i18n
                        .text("createissue.error.invalid.project", &[&op.value.to_string()]),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use crate::layout::IssueOperation;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn validate(raw: &str, caller: &str) -> ErrorCollection {
        let field = ProjectSystemField::new(testing::services());
        let mut ctx = OperationContext::new(IssueOperation::Create, Some(testing::user(caller)));
        field.populate_from_params(&mut ctx.holder, &RequestParams::new().with(PROJECT, raw));
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &testing::issue(), &FieldLayoutItem::new(PROJECT));
        errors
    }

    #[test]
    fn test_create_needs_permission() {
        assert!(!validate("10000", "fred").has_any_errors());
        assert_eq!(
            validate("10000", "bob").error(PROJECT),
            Some("You cannot create issues in project 'HR'.")
        );
        assert!(validate("NOPE", "admin").has_any_errors());
    }

    #[test]
    fn test_import_by_key() {
        let field = ProjectSystemField::new(testing::services());
        let mut holder = FieldValuesHolder::new();
        field.populate_from_string(&mut holder, "mkt", &testing::issue()).unwrap();

        assert_eq!(field.value_from_params(&holder).unwrap(), IssueValue::Project(testing::marketing()));
    }

    #[test]
    fn test_never_bulk_edited() {
        let field = ProjectSystemField::new(testing::services());
        let bean = BulkEditBean::default();
        assert_eq!(field.available_for_bulk_edit(&bean), Some(BULK_UNAVAILABLE));
    }
}
