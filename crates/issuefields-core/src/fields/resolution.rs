//! Issue resolution.

use serde_json::{Value, json};

use crate::error::{FieldError, Result};
use crate::field::ids::RESOLUTION;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{BULK_UNAVAILABLE, add_required_error, hidden_or_permission, render};
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, IssueConstant, Project, User};
use crate::layout::{BulkEditBean, BulkOperation, FieldLayoutItem, IssueOperation, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, IdOrName, JsonType, StandardOperation, id_or_name};
use crate::services::{FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::params::first_non_blank;
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

pub const BULK_UNAVAILABLE_NO_RESOLUTIONS: &str = "bulk.edit.unavailable.noresolutions";

#[derive(Debug)]
pub struct ResolutionSystemField {
    services: FieldServices,
}

impl ResolutionSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn resolution_json(resolution: &IssueConstant) -> Value {
        json!({"id": resolution.id, "name": resolution.name})
    }

    /// Resolutions a transition may set: the include list when present,
    /// minus the exclude list.
    fn allowed_resolutions(&self, operation: &IssueOperation) -> Vec<IssueConstant> {
        let all = self.services.constants.resolutions();
        match operation {
            IssueOperation::Transition {
                include_resolutions,
                exclude_resolutions,
            } => all
                .into_iter()
                .filter(|r| include_resolutions.is_empty() || include_resolutions.contains(&r.id))
                .filter(|r| !exclude_resolutions.contains(&r.id))
                .collect(),
            _ => all,
        }
    }
}

impl Field for ResolutionSystemField {
    fn id(&self) -> &str {
        RESOLUTION
    }

    fn name_key(&self) -> &str {
        "issue.field.resolution"
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

impl NavigableField for ResolutionSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        issue.resolution.as_ref().map(|r| r.name.clone())
    }
}

impl OrderableField for ResolutionSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        let id = params.get(RESOLUTION).and_then(first_non_blank).map(str::to_string);
        FieldValue::Text(id)
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(RESOLUTION, FieldValue::Text(issue.resolution.as_ref().map(|r| r.id.clone())));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(RESOLUTION, FieldValue::Text(self.services.settings.default_resolution.clone()));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            holder.insert(RESOLUTION, FieldValue::Text(None));
            return Ok(());
        }
        let resolution = self
            .services
            .constants
            .resolutions()
            .into_iter()
            .find(|r| r.id == value || r.name.eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                FieldError::FieldValidation(self.services.i18n.text("field.error.invalidresolution", &[value]))
            })?;
        holder.insert(RESOLUTION, FieldValue::Text(Some(resolution.id)));
        Ok(())
    }

    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        _issue: &Issue,
        item: &FieldLayoutItem,
    ) {
        let Some(id) = ctx.holder.text(RESOLUTION).map(str::to_string) else {
            if item.required || matches!(ctx.operation, IssueOperation::Transition { .. }) {
                add_required_error(errors, RESOLUTION, self.name_key(), i18n);
            }
            return;
        };
        let Some(resolution) = self.services.constants.resolution(&id) else {
            errors.add_error(RESOLUTION, i18n.text("field.error.invalidresolution", &[&id]));
            return;
        };
        if !self.allowed_resolutions(&ctx.operation).iter().any(|r| r.id == resolution.id) {
            errors.add_error(RESOLUTION, i18n.text("field.error.excludedresolution", &[&resolution.name]));
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let Some(id) = holder.text(RESOLUTION) else {
            return Ok(IssueValue::Empty);
        };
        self.services
            .constants
            .resolution(id)
            .map(IssueValue::Resolution)
            .ok_or_else(|| FieldError::FieldValidation(format!("resolution {id} does not exist")))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        issue.resolution.clone().map_or(IssueValue::Empty, IssueValue::Resolution)
    }

    fn default_value(&self, _issue: &Issue) -> IssueValue {
        self.services
            .settings
            .default_resolution
            .as_deref()
            .and_then(|id| self.services.constants.resolution(id))
            .map_or(IssueValue::Empty, IssueValue::Resolution)
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if !holder.contains(RESOLUTION) {
            return Ok(());
        }
        let resolution = match self.value_from_params(holder)? {
            IssueValue::Resolution(resolution) => Some(resolution),
            _ => None,
        };
        patch.set_resolution(resolution);
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
            IssueValue::Resolution(r) => (Some(r.id.clone()), Some(r.name.clone())),
            _ => (None, None),
        };
        let (old_id, old_name) = split(&modified.old);
        let (new_id, new_name) = split(&modified.new);
        changes.add_change_item(
            ChangeItemBean::jira(RESOLUTION)
                .from_value(old_id, old_name)
                .to_value(new_id, new_name),
        );
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        issue.resolution.is_some()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        patch.set_resolution(None);
        Ok(())
    }

    fn needs_move(&self, _originals: &[Issue], _target: &Issue, _target_item: &FieldLayoutItem) -> MessagedResult {
        MessagedResult::no_input()
    }

    /// Resolutions are set by transitions, never by a plain bulk edit.
    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        if bean.operation != BulkOperation::Transition {
            return Some(BULK_UNAVAILABLE);
        }
        if self.services.constants.resolutions().is_empty() {
            return Some(BULK_UNAVAILABLE_NO_RESOLUTIONS);
        }
        hidden_or_permission(
            RESOLUTION,
            self.services.permissions.as_ref(),
            bean,
            Some(Permission::ResolveIssue),
        )
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(RESOLUTION, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("resolution", &issue.resolution);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current = request
                    .holder
                    .and_then(|h| h.text(RESOLUTION).map(str::to_string))
                    .or_else(|| issue.resolution.as_ref().map(|r| r.id.clone()))
                    .or_else(|| self.services.settings.default_resolution.clone());
                params.insert_serialized("resolutions", &self.allowed_resolutions(request.operation));
                params.insert("currentResolution", current);
            }
        }
        render(self.services.renderer.as_ref(), &format!("resolution-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for ResolutionSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("resolution", RESOLUTION)
    }

    fn field_type_info(&self, _project: &Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        let allowed = self
            .services
            .constants
            .resolutions()
            .iter()
            .map(Self::resolution_json)
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
        let json = issue.resolution.as_ref().map_or(Value::Null, Self::resolution_json);
        Some(FieldJsonRepresentation::new(json))
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
            if op.value.is_null() {
                params.set(RESOLUTION, Vec::new());
                continue;
            }
            let found = id_or_name(&op.value).and_then(|reference| {
                self.services.constants.resolutions().into_iter().find(|r| match &reference {
                    IdOrName::Id(id) => &r.id == id,
                    IdOrName::Name(name) => r.name.eq_ignore_ascii_case(name) || &r.id == name,
                })
            });
            match found {
                Some(resolution) => params.set(RESOLUTION, vec![resolution.id]),
                None => errors.add_error(
                    RESOLUTION,
                    self.services
                        .i18n
                        .text("field.error.invalidresolution", &[&op.value.to_string()]),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use crate::settings::SiteSettings;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn field() -> ResolutionSystemField {
        ResolutionSystemField::new(testing::services())
    }

    fn validate(raw: Option<&str>, operation: IssueOperation, item: &FieldLayoutItem) -> ErrorCollection {
        let params = raw.map_or_else(RequestParams::new, |r| RequestParams::new().with(RESOLUTION, r));
        let mut ctx = OperationContext::new(operation, Some(testing::user("admin")));
        field().populate_from_params(&mut ctx.holder, &params);
        let mut errors = ErrorCollection::new();
        field().validate_params(&mut ctx, &mut errors, &DefaultI18n, &testing::issue(), item);
        errors
    }

    fn transition(include: &[&str], exclude: &[&str]) -> IssueOperation {
        IssueOperation::Transition {
            include_resolutions: include.iter().map(|s| (*s).to_string()).collect(),
            exclude_resolutions: exclude.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_unknown_resolution_rejected() {
        let errors = validate(Some("42"), IssueOperation::Edit, &FieldLayoutItem::new(RESOLUTION));
        assert_eq!(errors.error(RESOLUTION), Some("The resolution '42' is invalid."));
    }

    #[test]
    fn test_transition_include_and_exclude_lists() {
        let item = FieldLayoutItem::new(RESOLUTION);
        assert!(!validate(Some("1"), transition(&["1", "2"], &[]), &item).has_any_errors());

        let errors = validate(Some("3"), transition(&["1", "2"], &[]), &item);
        assert_eq!(
            errors.error(RESOLUTION),
            Some("The resolution 'Duplicate' is not allowed for this transition.")
        );

        assert!(validate(Some("2"), transition(&[], &["2"]), &item).has_any_errors());
    }

    #[test]
    fn test_required_on_transition() {
        let errors = validate(None, transition(&[], &[]), &FieldLayoutItem::new(RESOLUTION));
        assert_eq!(errors.error(RESOLUTION), Some("Resolution is required."));
        assert!(!validate(None, IssueOperation::Edit, &FieldLayoutItem::new(RESOLUTION)).has_any_errors());
    }

    #[test]
    fn test_default_from_settings() {
        let mut settings = SiteSettings::default();
        settings.default_resolution = Some("1".to_string());
        let field = ResolutionSystemField::new(testing::services().with_settings(settings));
        let mut holder = FieldValuesHolder::new();

        field.populate_defaults(&mut holder, &testing::issue());

        assert_eq!(holder.text(RESOLUTION), Some("1"));
        assert_eq!(field.default_value(&testing::issue()), IssueValue::Resolution(IssueConstant::new("1", "Fixed")));
    }

    #[test]
    fn test_update_and_change_item() {
        let field = field();
        let issue = testing::issue();
        let mut holder = FieldValuesHolder::new();
        holder.insert(RESOLUTION, FieldValue::text("2"));
        let mut patch = IssuePatch::new(issue.clone());

        field.update_issue(None, &mut patch, &mut holder).unwrap();
        let modified = patch.modified(RESOLUTION).unwrap().clone();
        let mut changes = IssueChangeHolder::new();
        field.update_value(None, None, &issue, &modified, &mut changes).unwrap();

        assert_eq!(changes.items[0].to_string.as_deref(), Some("Won't Fix"));
        assert_eq!(changes.items[0].from, None);
    }

    #[test]
    fn test_bulk_only_through_transitions() {
        let admin = Some(testing::user("admin"));
        let edit = BulkEditBean::new(BulkOperation::Edit, admin.clone(), vec![testing::issue()]);
        assert_eq!(field().available_for_bulk_edit(&edit), Some(BULK_UNAVAILABLE));

        let transition = BulkEditBean::new(BulkOperation::Transition, admin, vec![testing::issue()]);
        assert_eq!(field().available_for_bulk_edit(&transition), None);
    }

    #[test]
    fn test_round_trip_and_import() {
        let field = field();
        let mut issue = testing::issue();
        issue.resolution = Some(IssueConstant::new("3", "Duplicate"));
        let mut holder = FieldValuesHolder::new();

        field.populate_from_issue(&mut holder, &issue);
        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));

        field.populate_from_string(&mut holder, "won't fix", &issue).unwrap();
        assert_eq!(holder.text(RESOLUTION), Some("2"));
    }
}
