//! Project components.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::field::ids::COMPONENTS;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{
    BULK_UNAVAILABLE_MULTIPLE_PROJECTS, add_required_error, entity_change_items, hidden_or_permission, render,
};
use crate::history::IssueChangeHolder;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, ProjectComponent, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, IdOrName, JsonType, StandardOperation, id_or_name};
use crate::services::{FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{FieldValue, FieldValuesHolder, LongIdsValueHolder, RequestParams};

/// Id submitted for the "Unknown" (no component) choice.
pub const UNKNOWN_COMPONENT_ID: i64 = -1;

pub const BULK_UNAVAILABLE_NO_COMPONENTS: &str = "bulk.edit.unavailable.nocomponents";

/// Read access to the components selected in a holder, used by fields whose
/// validation depends on them (automatic assignment).
pub trait ComponentsQuery: Send + Sync + std::fmt::Debug {
    /// Resolved components of the holder's entry, or `None` if the entry is
    /// absent. Unknown ids and names still to be created are skipped.
    fn components_from_holder(&self, holder: &FieldValuesHolder) -> Option<Vec<ProjectComponent>>;
}

#[derive(Debug)]
pub struct ComponentsSystemField {
    services: FieldServices,
}

impl ComponentsSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn selected_ids(holder: &LongIdsValueHolder) -> impl Iterator<Item = i64> + '_ {
        holder.ids.iter().copied().filter(|id| *id != UNKNOWN_COMPONENT_ID)
    }

    fn resolve(&self, ids: impl Iterator<Item = i64>) -> Vec<ProjectComponent> {
        ids.filter_map(|id| self.services.components.component(id)).collect()
    }

    fn pairs(components: &[ProjectComponent]) -> Vec<(i64, String)> {
        components.iter().map(|c| (c.id, c.name.clone())).collect()
    }

    fn component_json(component: &ProjectComponent) -> Value {
        json!({"id": component.id.to_string(), "name": component.name})
    }
}

impl ComponentsQuery for ComponentsSystemField {
    fn components_from_holder(&self, holder: &FieldValuesHolder) -> Option<Vec<ProjectComponent>> {
        let ids = holder.ids(COMPONENTS)?;
        Some(self.resolve(Self::selected_ids(ids)))
    }
}

impl Field for ComponentsSystemField {
    fn id(&self) -> &str {
        COMPONENTS
    }

    fn name_key(&self) -> &str {
        "issue.field.components"
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

impl NavigableField for ComponentsSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        let names: Vec<&str> = issue.components.iter().map(|c| c.name.as_str()).collect();
        (!names.is_empty()).then(|| names.join(", "))
    }
}

impl OrderableField for ComponentsSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Ids(LongIdsValueHolder::from_raw(&params.values(COMPONENTS)))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        let ids = issue.components.iter().map(|c| c.id);
        holder.insert(COMPONENTS, FieldValue::Ids(LongIdsValueHolder::from_ids(ids)));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(COMPONENTS, FieldValue::Ids(LongIdsValueHolder::default()));
    }

    /// Components are per project; carry them across by name.
    fn populate_for_move(&self, holder: &mut FieldValuesHolder, original: &Issue, target: &Issue) {
        let ids = original
            .components
            .iter()
            .filter_map(|c| self.services.components.component_by_name(target.project.id, &c.name))
            .map(|c| c.id);
        holder.insert(COMPONENTS, FieldValue::Ids(LongIdsValueHolder::from_ids(ids)));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, issue: &Issue) -> Result<()> {
        let mut ids = Vec::new();
        for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let component = self
                .services
                .components
                .component_by_name(issue.project.id, name)
                .ok_or_else(|| {
                    FieldError::FieldValidation(
                        self.services
                            .i18n
                            .text("issue.field.components.does.not.exist", &[name]),
                    )
                })?;
            ids.push(component.id);
        }
        holder.insert(COMPONENTS, FieldValue::Ids(LongIdsValueHolder::from_ids(ids)));
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
        let value = ctx.holder.ids(COMPONENTS).cloned().unwrap_or_default();
        if value.contains(UNKNOWN_COMPONENT_ID) && value.ids.len() > 1 {
            errors.add_error(COMPONENTS, i18n.text("issue.field.components.noneselectedwithother", &[]));
            return;
        }

        for id in Self::selected_ids(&value) {
            match self.services.components.component(id) {
                Some(component) if component.project_id == issue.project.id => {}
                Some(component) => errors.add_error(
                    COMPONENTS,
                    i18n.text("issue.field.components.not.valid.for.project", &[&component.name]),
                ),
                None => errors.add_error(
                    COMPONENTS,
                    i18n.text("issue.field.components.does.not.exist", &[&id.to_string()]),
                ),
            }
        }

        if !value.values_to_add.is_empty() {
            let caller = ctx.caller.as_ref();
            if !self
                .services
                .permissions
                .has_permission(Permission::AdministerProjects, &issue.project, caller)
            {
                errors.add_error(COMPONENTS, i18n.text("issue.field.components.noadmin", &[]));
            }
            for name in &value.values_to_add {
                if name.trim().is_empty() {
                    errors.add_error(COMPONENTS, i18n.text("issue.field.components.namenotset", &[]));
                } else if self.services.components.component_by_name(issue.project.id, name).is_some() {
                    errors.add_error(COMPONENTS, i18n.text("issue.field.components.namenotunique", &[name]));
                }
            }
        }

        if let Some(text) = &value.input_text {
            errors.add_error(COMPONENTS, i18n.text("issue.field.components.does.not.exist", &[text]));
        }

        let nothing_selected = Self::selected_ids(&value).next().is_none() && value.values_to_add.is_empty();
        if item.required && nothing_selected {
            if self.services.components.components_for_project(issue.project.id).is_empty() {
                errors.add_error_message(i18n.text("createissue.error.components.required", &[&issue.project.name]));
            } else {
                add_required_error(errors, COMPONENTS, self.name_key(), i18n);
            }
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let Some(value) = holder.ids(COMPONENTS) else {
            return Ok(IssueValue::Components(Vec::new()));
        };
        Self::selected_ids(value)
            .map(|id| {
                self.services
                    .components
                    .component(id)
                    .ok_or_else(|| FieldError::FieldValidation(format!("component {id} does not exist")))
            })
            .collect::<Result<Vec<_>>>()
            .map(IssueValue::Components)
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        IssueValue::Components(issue.components.clone())
    }

    fn default_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Components(Vec::new())
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        let Some(value) = holder.ids(COMPONENTS).cloned() else {
            return Ok(());
        };
        let mut components = self.resolve(Self::selected_ids(&value));
        let project_id = patch.issue().project.id;
        for name in &value.values_to_add {
            let created = self.services.components.create(project_id, name)?;
            debug!(project_id, component = %created.name, "Created component inline");
            components.push(created);
        }
        patch.set_components(components);
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
        let old = Self::pairs(modified.old.as_components());
        let new = Self::pairs(modified.new.as_components());
        for item in entity_change_items("Component", &old, &new) {
            changes.add_change_item(item);
        }
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        !issue.components.is_empty()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        patch.set_components(Vec::new());
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        let needs_input = originals.iter().any(|original| {
            let project_changed = original.project.id != target.project.id;
            (project_changed && !original.components.is_empty())
                || (target_item.required && original.components.is_empty())
        });
        MessagedResult::new(needs_input)
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        if bean.is_multiple_projects() {
            return Some(BULK_UNAVAILABLE_MULTIPLE_PROJECTS);
        }
        if let Some(project) = bean.single_project() {
            if self.services.components.components_for_project(project.id).is_empty() {
                return Some(BULK_UNAVAILABLE_NO_COMPONENTS);
            }
        }
        hidden_or_permission(COMPONENTS, self.services.permissions.as_ref(), bean, None)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(COMPONENTS, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("components", &issue.components);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current: Vec<i64> = request
                    .holder
                    .and_then(|h| h.ids(COMPONENTS))
                    .map_or_else(|| issue.components.iter().map(|c| c.id).collect(), |h| h.ids.clone());
                let project_id = issue.project.id;
                params.insert_serialized("components", &self.services.components.components_for_project(project_id));
                params.insert_serialized("currentComponents", &current);
                params.insert("unknownComponentId", UNKNOWN_COMPONENT_ID);
                params.insert(
                    "canCreateComponents",
                    self.services.permissions.has_permission(
                        Permission::AdministerProjects,
                        &issue.project,
                        request.caller,
                    ),
                );
            }
        }
        render(self.services.renderer.as_ref(), &format!("components-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for ComponentsSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system_array("component", COMPONENTS)
    }

    fn field_type_info(&self, project: &crate::issue::Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        let allowed = self
            .services
            .components
            .components_for_project(project.id)
            .iter()
            .map(Self::component_json)
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
        let components = issue.components.iter().map(Self::component_json).collect();
        Some(FieldJsonRepresentation::new(Value::Array(components)))
    }

    fn json_default_value(&self, _issue: &Issue) -> Option<Value> {
        Some(Value::Array(Vec::new()))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Set, StandardOperation::Add, StandardOperation::Remove]
    }

    fn apply_operations(
        &self,
        issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        let mut ids: Vec<i64> = issue.components.iter().map(|c| c.id).collect();
        let lookup = |value: &Value, errors: &mut ErrorCollection| -> Option<i64> {
            let found = match id_or_name(value)? {
                IdOrName::Id(id) => id.parse().ok().and_then(|id| self.services.components.component(id)),
                IdOrName::Name(name) => self.services.components.component_by_name(issue.project.id, &name),
            };
            if found.is_none() {
                errors.add_error(
                    COMPONENTS,
                    self.services.i18n.text("issue.field.components.does.not.exist", &[&value.to_string()]),
                );
            }
            found.map(|c| c.id)
        };
        for op in check_supported(self, operations, errors) {
            match op.operation {
                StandardOperation::Set => {
                    let values = op.value.as_array().cloned().unwrap_or_default();
                    ids = values.iter().filter_map(|v| lookup(v, errors)).collect();
                }
                StandardOperation::Add => {
                    if let Some(id) = lookup(&op.value, errors).filter(|id| !ids.contains(id)) {
                        ids.push(id);
                    }
                }
                StandardOperation::Remove => {
                    if let Some(id) = lookup(&op.value, errors) {
                        ids.retain(|existing| *existing != id);
                    }
                }
                StandardOperation::Edit => {}
            }
        }
        params.set(COMPONENTS, ids.iter().map(ToString::to_string).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use crate::layout::BulkOperation;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn field() -> ComponentsSystemField {
        ComponentsSystemField::new(testing::services())
    }

    fn validate(raw: &[&str], item: &FieldLayoutItem, issue: &Issue, caller: Option<User>) -> ErrorCollection {
        let params = RequestParams::from_pairs(raw.iter().map(|v| (COMPONENTS, *v)));
        let mut ctx = OperationContext::new(crate::layout::IssueOperation::Edit, caller);
        field().populate_from_params(&mut ctx.holder, &params);
        let mut errors = ErrorCollection::new();
        field().validate_params(&mut ctx, &mut errors, &DefaultI18n, issue, item);
        errors
    }

    #[test]
    fn test_unknown_with_others_rejected() {
        let errors = validate(&["-1", "10000"], &FieldLayoutItem::new(COMPONENTS), &testing::issue(), None);
        assert!(errors.error(COMPONENTS).unwrap().contains("Unknown"));
    }

    #[test]
    fn test_component_from_other_project_rejected() {
        let mut issue = testing::issue();
        issue.project = testing::marketing();
        let errors = validate(&["10000"], &FieldLayoutItem::new(COMPONENTS), &issue, None);
        assert!(errors.error(COMPONENTS).unwrap().contains("not valid for this project"));
    }

    #[test]
    fn test_required_without_project_components_is_general_message() {
        let mut issue = testing::issue();
        issue.project = testing::marketing();
        let errors = validate(&[], &FieldLayoutItem::new(COMPONENTS).required(), &issue, None);

        assert!(errors.errors().is_empty());
        assert_eq!(errors.error_messages().len(), 1);
    }

    #[test]
    fn test_new_component_needs_admin() {
        let item = FieldLayoutItem::new(COMPONENTS);
        let errors = validate(&["nv_Docs"], &item, &testing::issue(), Some(testing::user("fred")));
        assert!(errors.error(COMPONENTS).is_some());

        let errors = validate(&["nv_Docs"], &item, &testing::issue(), Some(testing::user("admin")));
        assert!(!errors.has_any_errors(), "{errors}");
    }

    #[test]
    fn test_update_creates_inline_component() {
        let services = testing::services();
        let field = ComponentsSystemField::new(services.clone());
        let mut holder = FieldValuesHolder::new();
        holder.insert(COMPONENTS, FieldValue::Ids(LongIdsValueHolder::from_raw(&["10000".into(), "nv_Docs".into()])));
        let mut patch = IssuePatch::new(testing::issue());

        field.update_issue(None, &mut patch, &mut holder).unwrap();

        let names: Vec<&str> = patch.issue().components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Backend", "Docs"]);
        assert!(services.components.component_by_name(testing::HR, "Docs").is_some());
    }

    #[test]
    fn test_round_trip_from_issue() {
        let field = field();
        let issue = testing::issue().with_components(vec![testing::backend()]);
        let mut holder = FieldValuesHolder::new();

        field.populate_from_issue(&mut holder, &issue);

        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));
    }

    #[test]
    fn test_bulk_edit_availability() {
        let field = field();
        let admin = Some(testing::user("admin"));

        let mut marketing_issue = testing::issue();
        marketing_issue.project = testing::marketing();
        let mixed = BulkEditBean::new(BulkOperation::Edit, admin.clone(), vec![testing::issue(), marketing_issue.clone()]);
        assert_eq!(field.available_for_bulk_edit(&mixed), Some(BULK_UNAVAILABLE_MULTIPLE_PROJECTS));

        let no_components = BulkEditBean::new(BulkOperation::Edit, admin.clone(), vec![marketing_issue]);
        assert_eq!(field.available_for_bulk_edit(&no_components), Some(BULK_UNAVAILABLE_NO_COMPONENTS));

        let fine = BulkEditBean::new(BulkOperation::Edit, admin, vec![testing::issue()]);
        assert_eq!(field.available_for_bulk_edit(&fine), None);
    }

    #[test]
    fn test_populate_for_move_maps_by_name() {
        let field = field();
        let original = testing::issue().with_components(vec![testing::backend()]);
        let mut target = testing::issue();
        target.project = testing::marketing();
        let mut holder = FieldValuesHolder::new();

        field.populate_for_move(&mut holder, &original, &target);

        assert!(holder.ids(COMPONENTS).unwrap().ids.is_empty());
        assert!(field.needs_move(&[original], &target, &FieldLayoutItem::new(COMPONENTS)).needs_input);
    }

    #[test]
    fn test_rest_add_and_remove() {
        let issue = testing::issue().with_components(vec![testing::backend()]);
        let ops = vec![
            FieldOperation::new(StandardOperation::Add, json!({"name": "UI"})),
            FieldOperation::new(StandardOperation::Remove, json!({"id": "10000"})),
        ];
        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();

        field().apply_operations(&issue, &ops, &mut params, &mut errors);

        assert!(!errors.has_any_errors(), "{errors}");
        assert_eq!(params.values(COMPONENTS), vec!["10001".to_string()]);
    }
}
