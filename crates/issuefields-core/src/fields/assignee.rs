//! Issue assignee.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::field::ids::ASSIGNEE;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{hidden_or_permission, render};
use crate::fields::components::ComponentsQuery;
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, ProjectComponent, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, JsonType, StandardOperation};
use crate::services::{FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{
    AUTOMATIC_ASSIGNEE, AUTOMATIC_ASSIGNEE_STRING, AssigneeSelection, FieldValue, FieldValuesHolder, RequestParams,
};

#[derive(Debug)]
pub struct AssigneeSystemField {
    services: FieldServices,
    components: Arc<dyn ComponentsQuery>,
}

impl AssigneeSystemField {
    #[must_use]
    pub fn new(services: FieldServices, components: Arc<dyn ComponentsQuery>) -> Self {
        Self { services, components }
    }

    fn selection_for(issue: &Issue) -> AssigneeSelection {
        issue
            .assignee
            .as_ref()
            .map_or(AssigneeSelection::Unassigned, |u| AssigneeSelection::User(u.name.clone()))
    }

    fn is_assignable(&self, issue: &Issue, user: &User) -> bool {
        self.services
            .permissions
            .has_permission(Permission::AssignableUser, &issue.project, Some(user))
    }

    /// Components the automatic assignee is chosen from: the ones being
    /// submitted, or the issue's own.
    fn components_for(&self, holder: &FieldValuesHolder, issue: &Issue) -> Vec<ProjectComponent> {
        self.components
            .components_from_holder(holder)
            .unwrap_or_else(|| issue.components.clone())
    }

    fn user_json(user: &User) -> Value {
        json!({
            "name": user.name,
            "key": user.key,
            "displayName": user.display_name,
            "emailAddress": user.email,
        })
    }

    fn validate_user(
        &self,
        name: &str,
        ctx: &OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
    ) {
        let Some(user) = self.services.users.user_by_name(name) else {
            errors.add_error(ASSIGNEE, i18n.text("assign.error.user.does.not.exist", &[name]));
            return;
        };
        if !self.is_assignable(issue, &user) {
            errors.add_error(ASSIGNEE, i18n.text("assign.error.user.cannot.be.assigned", &[name]));
            return;
        }
        let caller = ctx.caller.as_ref();
        if !self
            .services
            .permissions
            .has_permission(Permission::AssignIssue, &issue.project, caller)
        {
            errors.add_error(ASSIGNEE, i18n.text("assign.error.no.permission", &[]));
        }
    }
}

impl Field for AssigneeSystemField {
    fn id(&self) -> &str {
        ASSIGNEE
    }

    fn name_key(&self) -> &str {
        "issue.field.assignee"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable().not_hideable()
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

impl NavigableField for AssigneeSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        Some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        issue.assignee.as_ref().map(|u| u.display_name.clone())
    }
}

impl OrderableField for AssigneeSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Assignee(AssigneeSelection::parse(params.first(ASSIGNEE)))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(ASSIGNEE, FieldValue::Assignee(Self::selection_for(issue)));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(ASSIGNEE, FieldValue::Assignee(AssigneeSelection::Automatic));
    }

    /// Keep the assignee if they may work in the target project, otherwise
    /// fall back to automatic assignment.
    fn populate_for_move(&self, holder: &mut FieldValuesHolder, original: &Issue, target: &Issue) {
        let selection = match &original.assignee {
            Some(user) if self.is_assignable(target, user) => AssigneeSelection::User(user.name.clone()),
            _ => AssigneeSelection::Automatic,
        };
        holder.insert(ASSIGNEE, FieldValue::Assignee(selection));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        let selection = match value.trim() {
            "" => AssigneeSelection::Unassigned,
            AUTOMATIC_ASSIGNEE_STRING | AUTOMATIC_ASSIGNEE => AssigneeSelection::Automatic,
            name => {
                let user = self.services.users.user_by_name(name).ok_or_else(|| {
                    FieldError::FieldValidation(self.services.i18n.text("assign.error.user.does.not.exist", &[name]))
                })?;
                AssigneeSelection::User(user.name)
            }
        };
        holder.insert(ASSIGNEE, FieldValue::Assignee(selection));
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
        let selection = ctx.holder.assignee(ASSIGNEE).cloned().unwrap_or_default();
        let unchanged = !ctx.operation.is_create() && selection == Self::selection_for(issue);
        match &selection {
            AssigneeSelection::Separator => {
                errors.add_error(ASSIGNEE, i18n.text("assign.error.invaliduser", &[]));
            }
            AssigneeSelection::Unassigned => {
                if !self.services.settings.allow_unassigned {
                    errors.add_error(ASSIGNEE, i18n.text("assign.error.issues.unassigned", &[]));
                }
            }
            AssigneeSelection::User(_) if unchanged => {}
            AssigneeSelection::User(name) => self.validate_user(name, ctx, errors, i18n, issue),
            AssigneeSelection::Automatic => {
                let components = self.components_for(&ctx.holder, issue);
                errors.add_error_collection(
                    self.services
                        .assignee_resolver
                        .validate_default_assignee(issue, &components),
                );
            }
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        Ok(IssueValue::Assignee(holder.assignee(ASSIGNEE).cloned().unwrap_or_default()))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        IssueValue::Assignee(Self::selection_for(issue))
    }

    fn default_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Assignee(AssigneeSelection::Automatic)
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        let Some(selection) = holder.assignee(ASSIGNEE).cloned() else {
            return Ok(());
        };
        let assignee = match selection {
            AssigneeSelection::Separator => return Ok(()),
            AssigneeSelection::Unassigned => None,
            AssigneeSelection::User(name) => Some(
                self.services
                    .users
                    .user_by_name(&name)
                    .ok_or_else(|| FieldError::DataAccess(format!("user '{name}' not found")))?,
            ),
            AssigneeSelection::Automatic => {
                let components = self.components_for(holder, patch.issue());
                let resolved = self
                    .services
                    .assignee_resolver
                    .default_assignee(patch.issue(), &components);
                debug!(
                    issue = patch.issue().display_key(),
                    assignee = resolved.as_ref().map(|u| u.name.as_str()),
                    "Resolved automatic assignee"
                );
                resolved
            }
        };
        patch.set_assignee(assignee);
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
        let old = modified.old.as_user();
        let new = modified.new.as_user();
        changes.add_change_item(
            ChangeItemBean::jira(ASSIGNEE)
                .from_value(old.map(|u| u.key.clone()), old.map(|u| u.display_name.clone()))
                .to_value(new.map(|u| u.key.clone()), new.map(|u| u.display_name.clone())),
        );
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        issue.assignee.is_some()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        self.services.settings.allow_unassigned
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        if !self.services.settings.allow_unassigned {
            return Err(FieldError::unsupported(ASSIGNEE, "remove value"));
        }
        patch.set_assignee(None);
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], target: &Issue, _target_item: &FieldLayoutItem) -> MessagedResult {
        let allow_unassigned = self.services.settings.allow_unassigned;
        let needs_input = originals.iter().any(|original| match &original.assignee {
            Some(user) => !self.is_assignable(target, user),
            None => !allow_unassigned,
        });
        MessagedResult::new(needs_input)
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        hidden_or_permission(
            ASSIGNEE,
            self.services.permissions.as_ref(),
            bean,
            Some(Permission::AssignIssue),
        )
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(ASSIGNEE, &self.name(i18n), request);
        let issue = request.issue;
        match view {
            FieldView::View | FieldView::Column => {
                params.insert_serialized("assignee", &issue.assignee);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let selection = request
                    .holder
                    .and_then(|h| h.assignee(ASSIGNEE).cloned())
                    .unwrap_or_else(|| Self::selection_for(issue));
                params.insert("currentAssignee", selection.to_param());
                params.insert("automaticAssignee", AUTOMATIC_ASSIGNEE);
                params.insert("allowUnassigned", self.services.settings.allow_unassigned);
                params.insert(
                    "canAssign",
                    self.services
                        .permissions
                        .has_permission(Permission::AssignIssue, &issue.project, request.caller),
                );
            }
        }
        render(self.services.renderer.as_ref(), &format!("assignee-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for AssigneeSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("user", ASSIGNEE)
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        let json = issue.assignee.as_ref().map_or(Value::Null, Self::user_json);
        Some(FieldJsonRepresentation::new(json))
    }

    fn json_default_value(&self, _issue: &Issue) -> Option<Value> {
        Some(json!({"name": AUTOMATIC_ASSIGNEE}))
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
            let name = match &op.value {
                Value::Null => String::new(),
                Value::String(name) => name.clone(),
                Value::Object(o) => match o.get("name") {
                    Some(Value::String(name)) => name.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => {
                        errors.add_error(ASSIGNEE, format!("Invalid assignee: {other}"));
                        continue;
                    }
                },
                other => {
                    errors.add_error(ASSIGNEE, format!("Invalid assignee: {other}"));
                    continue;
                }
            };
            params.set(ASSIGNEE, vec![name]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::components::ComponentsSystemField;
    use crate::i18n::DefaultI18n;
    use crate::layout::{BulkOperation, IssueOperation};
    use crate::settings::SiteSettings;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn field_with(services: FieldServices) -> AssigneeSystemField {
        let components = Arc::new(ComponentsSystemField::new(services.clone()));
        AssigneeSystemField::new(services, components)
    }

    fn field() -> AssigneeSystemField {
        field_with(testing::services())
    }

    fn validate(field: &AssigneeSystemField, params: &RequestParams, caller: Option<User>) -> ErrorCollection {
        let mut ctx = OperationContext::new(IssueOperation::Edit, caller);
        field.populate_from_params(&mut ctx.holder, params);
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &testing::issue(), &FieldLayoutItem::new(ASSIGNEE));
        errors
    }

    #[test]
    fn test_separator_rejected() {
        let errors = validate(&field(), &RequestParams::new().with(ASSIGNEE, "-2"), Some(testing::user("admin")));
        assert_eq!(errors.error(ASSIGNEE), Some("You must select a valid assignee."));
    }

    #[test]
    fn test_automatic_is_not_a_username() {
        let mut holder = FieldValuesHolder::new();
        field().populate_from_params(&mut holder, &RequestParams::new().with(ASSIGNEE, AUTOMATIC_ASSIGNEE));
        assert_eq!(holder.assignee(ASSIGNEE), Some(&AssigneeSelection::Automatic));
    }

    #[test]
    fn test_unassignable_user_rejected() {
        let errors = validate(&field(), &RequestParams::new().with(ASSIGNEE, "bob"), Some(testing::user("admin")));
        assert!(errors.error(ASSIGNEE).unwrap().contains("cannot be assigned"));

        let errors = validate(&field(), &RequestParams::new().with(ASSIGNEE, "nobody"), Some(testing::user("admin")));
        assert!(errors.error(ASSIGNEE).unwrap().contains("does not exist"));
    }

    #[test]
    fn test_changing_assignee_needs_permission() {
        let params = RequestParams::new().with(ASSIGNEE, "sally");
        assert!(validate(&field(), &params, Some(testing::user("bob"))).has_any_errors());
        assert!(!validate(&field(), &params, Some(testing::user("admin"))).has_any_errors());

        let unchanged = RequestParams::new().with(ASSIGNEE, "fred");
        assert!(!validate(&field(), &unchanged, Some(testing::user("bob"))).has_any_errors());
    }

    #[test]
    fn test_unassigned_when_not_allowed() {
        let services = testing::services().with_settings(SiteSettings::default().with_allow_unassigned(false));
        let field = field_with(services);
        let errors = validate(&field, &RequestParams::new().with(ASSIGNEE, ""), Some(testing::user("admin")));
        assert_eq!(errors.error(ASSIGNEE), Some("Issues must be assigned."));
        assert!(!field.can_remove_value_from_issue_object(&testing::issue()));
    }

    #[test]
    fn test_automatic_uses_submitted_component_lead() {
        let field = field();
        let mut holder = FieldValuesHolder::new();
        holder.insert(ASSIGNEE, FieldValue::Assignee(AssigneeSelection::Automatic));
        holder.insert(
            crate::field::ids::COMPONENTS,
            FieldValue::Ids(crate::values::LongIdsValueHolder::from_ids([testing::backend().id])),
        );
        let mut patch = IssuePatch::new(testing::stored("HR-2"));

        field.update_issue(None, &mut patch, &mut holder).unwrap();
        assert_eq!(patch.issue().assignee.as_ref().map(|u| u.name.as_str()), Some("fred"));

        let mut holder = FieldValuesHolder::new();
        holder.insert(ASSIGNEE, FieldValue::Assignee(AssigneeSelection::Automatic));
        let mut patch = IssuePatch::new(testing::stored("HR-2"));
        field.update_issue(None, &mut patch, &mut holder).unwrap();
        assert_eq!(patch.issue().assignee.as_ref().map(|u| u.name.as_str()), Some("admin"));
    }

    #[test]
    fn test_change_item_uses_key_and_display_name() {
        let field = field();
        let issue = testing::issue();
        let mut patch = IssuePatch::new(issue.clone());
        patch.set_assignee(Some(testing::user("sally")));
        let modified = patch.modified(ASSIGNEE).unwrap().clone();
        let mut changes = IssueChangeHolder::new();

        field.update_value(None, None, &issue, &modified, &mut changes).unwrap();

        let item = &changes.items[0];
        assert_eq!(item.from.as_deref(), Some("fred"));
        assert_eq!(item.from_string.as_deref(), Some("Fred Normal"));
        assert_eq!(item.to_string.as_deref(), Some("Sally Sales"));
    }

    #[test]
    fn test_round_trip_from_issue() {
        let field = field();
        let issue = testing::issue();
        let mut holder = FieldValuesHolder::new();

        field.populate_from_issue(&mut holder, &issue);

        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));
    }

    #[test]
    fn test_import_string() {
        let field = field();
        let mut holder = FieldValuesHolder::new();
        field
            .populate_from_string(&mut holder, AUTOMATIC_ASSIGNEE_STRING, &testing::issue())
            .unwrap();
        assert_eq!(holder.assignee(ASSIGNEE), Some(&AssigneeSelection::Automatic));
        assert!(field.populate_from_string(&mut holder, "nobody", &testing::issue()).is_err());
    }

    #[test]
    fn test_needs_move_and_bulk_edit() {
        let field = field();
        let mut original = testing::issue();
        original.assignee = Some(testing::user("bob"));
        let target = testing::issue();
        assert!(field.needs_move(&[original], &target, &FieldLayoutItem::new(ASSIGNEE)).needs_input);
        assert!(!field.needs_move(&[testing::issue()], &target, &FieldLayoutItem::new(ASSIGNEE)).needs_input);

        let bean = BulkEditBean::new(BulkOperation::Edit, Some(testing::user("bob")), vec![testing::issue()]);
        assert!(field.available_for_bulk_edit(&bean).is_some());
    }

    #[test]
    fn test_rest_set_by_name() {
        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        field().apply_operations(
            &testing::issue(),
            &[FieldOperation::set(json!({"name": "sally"}))],
            &mut params,
            &mut errors,
        );
        assert_eq!(params.first(ASSIGNEE), Some("sally"));

        let json = field().json_from_issue(&testing::issue(), false, None).unwrap();
        assert_eq!(json.standard["displayName"], json!("Fred Normal"));
    }
}
