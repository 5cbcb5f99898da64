//! Issue type.

use serde_json::{Value, json};

use crate::error::{FieldError, Result};
use crate::field::ids::ISSUE_TYPE;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{hidden_or_permission, render};
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, IssueType, Project, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, IdOrName, JsonType, StandardOperation, id_or_name};
use crate::services::FieldServices;
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::params::first_non_blank;
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

pub const BULK_UNAVAILABLE_NO_COMMON_TYPES: &str = "bulk.edit.unavailable.issuetypes";

#[derive(Debug)]
pub struct IssueTypeSystemField {
    services: FieldServices,
}

impl IssueTypeSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn type_json(issue_type: &IssueType) -> Value {
        json!({"id": issue_type.id, "name": issue_type.name, "subtask": issue_type.subtask})
    }

    /// Types offered for an issue: the project's types of matching
    /// sub-task-ness.
    fn options_for(&self, issue: &Issue) -> Vec<IssueType> {
        self.services
            .constants
            .issue_types_for_project(issue.project.id)
            .into_iter()
            .filter(|t| t.subtask == issue.is_subtask())
            .collect()
    }

    fn valid_for_project(&self, project: &Project, type_id: &str) -> Option<IssueType> {
        self.services
            .constants
            .issue_types_for_project(project.id)
            .into_iter()
            .find(|t| t.id == type_id)
    }

    /// Types available in every project of the selection.
    fn common_types(&self, bean: &BulkEditBean) -> Vec<IssueType> {
        let mut projects = bean.projects().into_iter();
        let Some(first) = projects.next() else {
            return Vec::new();
        };
        let mut common = self.services.constants.issue_types_for_project(first.id);
        for project in projects {
            let types = self.services.constants.issue_types_for_project(project.id);
            common.retain(|t| types.contains(t));
        }
        common
    }
}

impl Field for IssueTypeSystemField {
    fn id(&self) -> &str {
        ISSUE_TYPE
    }

    fn name_key(&self) -> &str {
        "issue.field.issuetype"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable().mandatory()
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

impl NavigableField for IssueTypeSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        Some(issue.issue_type.name.clone())
    }
}

impl OrderableField for IssueTypeSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Text(params.get(ISSUE_TYPE).and_then(first_non_blank).map(str::to_string))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(ISSUE_TYPE, FieldValue::text(issue.issue_type.id.clone()));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        let default = self.options_for(issue).into_iter().next().map(|t| t.id);
        holder.insert(ISSUE_TYPE, FieldValue::Text(default));
    }

    /// Keep the type if the target project offers it; otherwise the user
    /// has to pick one.
    fn populate_for_move(&self, holder: &mut FieldValuesHolder, original: &Issue, target: &Issue) {
        let kept = self
            .valid_for_project(&target.project, &original.issue_type.id)
            .map(|t| t.id);
        holder.insert(ISSUE_TYPE, FieldValue::Text(kept));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, issue: &Issue) -> Result<()> {
        let value = value.trim();
        let issue_type = self
            .services
            .constants
            .issue_types_for_project(issue.project.id)
            .into_iter()
            .find(|t| t.id == value || t.name.eq_ignore_ascii_case(value))
            .ok_or_else(|| FieldError::FieldValidation(self.services.i18n.text("createissue.invalidissuetype", &[])))?;
        holder.insert(ISSUE_TYPE, FieldValue::text(issue_type.id));
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
        let Some(type_id) = ctx.holder.text(ISSUE_TYPE) else {
            errors.add_error(ISSUE_TYPE, i18n.text("createissue.noissuetype", &[]));
            return;
        };
        let Some(issue_type) = self.valid_for_project(&issue.project, type_id) else {
            errors.add_error(ISSUE_TYPE, i18n.text("createissue.invalidissuetype", &[]));
            return;
        };
        if issue_type.subtask && !issue.is_subtask() {
            errors.add_error(ISSUE_TYPE, i18n.text("createissue.subtasks.notsubtask", &[&issue_type.name]));
        } else if !issue_type.subtask && issue.is_subtask() {
            errors.add_error(ISSUE_TYPE, i18n.text("createissue.subtasks.issubtask", &[&issue_type.name]));
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let type_id = holder
            .text(ISSUE_TYPE)
            .ok_or_else(|| FieldError::FieldValidation("no issue type selected".into()))?;
        self.services
            .constants
            .issue_type(type_id)
            .map(IssueValue::IssueType)
            .ok_or_else(|| FieldError::FieldValidation(format!("issue type {type_id} does not exist")))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        IssueValue::IssueType(issue.issue_type.clone())
    }

    fn default_value(&self, issue: &Issue) -> IssueValue {
        self.options_for(issue)
            .into_iter()
            .next()
            .map_or(IssueValue::Empty, IssueValue::IssueType)
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if holder.text(ISSUE_TYPE).is_none() {
            return Ok(());
        }
        if let IssueValue::IssueType(issue_type) = self.value_from_params(holder)? {
            patch.set_issue_type(issue_type);
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
            IssueValue::IssueType(t) => (Some(t.id.clone()), Some(t.name.clone())),
            _ => (None, None),
        };
        let (old_id, old_name) = split(&modified.old);
        let (new_id, new_name) = split(&modified.new);
        changes.add_change_item(
            ChangeItemBean::jira(ISSUE_TYPE)
                .from_value(old_id, old_name)
                .to_value(new_id, new_name),
        );
        Ok(())
    }

    fn has_value(&self, _issue: &Issue) -> bool {
        true
    }

    /// The type decides the target layout, so a move always asks for it.
    fn needs_move(&self, _originals: &[Issue], _target: &Issue, _target_item: &FieldLayoutItem) -> MessagedResult {
        MessagedResult::input_required()
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        if self.common_types(bean).is_empty() {
            return Some(BULK_UNAVAILABLE_NO_COMMON_TYPES);
        }
        hidden_or_permission(ISSUE_TYPE, self.services.permissions.as_ref(), bean, None)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(ISSUE_TYPE, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("issueType", &issue.issue_type);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current = request
                    .holder
                    .and_then(|h| h.text(ISSUE_TYPE).map(str::to_string))
                    .unwrap_or_else(|| issue.issue_type.id.clone());
                params.insert_serialized("issueTypes", &self.options_for(issue));
                params.insert("currentIssueType", current);
            }
        }
        render(self.services.renderer.as_ref(), &format!("issuetype-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for IssueTypeSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("issuetype", ISSUE_TYPE)
    }

    fn field_type_info(&self, project: &Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        let allowed = self
            .services
            .constants
            .issue_types_for_project(project.id)
            .iter()
            .map(Self::type_json)
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
        Some(FieldJsonRepresentation::new(Self::type_json(&issue.issue_type)))
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
        let types = self.services.constants.issue_types_for_project(issue.project.id);
        for op in check_supported(self, operations, errors) {
            let found = id_or_name(&op.value).and_then(|reference| {
                types.iter().find(|t| match &reference {
                    IdOrName::Id(id) => &t.id == id,
                    IdOrName::Name(name) => t.name.eq_ignore_ascii_case(name),
                })
            });
            match found {
                Some(issue_type) => params.set(ISSUE_TYPE, vec![issue_type.id.clone()]),
                None => errors.add_error(ISSUE_TYPE, self.services.i18n.text("createissue.invalidissuetype", &[])),
            }
        }
    }
}
