//! Summary, description and environment.

use serde_json::Value;

use crate::custom::BULK_DIFFERENT_RENDERERS;
use crate::error::Result;
use crate::field::ids::{DESCRIPTION, ENVIRONMENT, SUMMARY};
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{BULK_UNAVAILABLE, add_required_error, hidden_or_permission, render};
use crate::history::{ChangeItemBean, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, JsonType, StandardOperation};
use crate::services::FieldServices;
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

pub const MAX_SUMMARY_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Summary,
    Description,
    Environment,
}

impl TextKind {
    #[must_use]
    pub const fn field_id(self) -> &'static str {
        match self {
            Self::Summary => SUMMARY,
            Self::Description => DESCRIPTION,
            Self::Environment => ENVIRONMENT,
        }
    }

    const fn name_key(self) -> &'static str {
        match self {
            Self::Summary => "issue.field.summary",
            Self::Description => "issue.field.description",
            Self::Environment => "issue.field.environment",
        }
    }

    fn value(self, issue: &Issue) -> Option<&str> {
        match self {
            Self::Summary => issue.summary.as_deref(),
            Self::Description => issue.description.as_deref(),
            Self::Environment => issue.environment.as_deref(),
        }
    }

    fn set(self, patch: &mut IssuePatch, value: Option<String>) {
        match self {
            Self::Summary => patch.set_summary(value),
            Self::Description => patch.set_description(value),
            Self::Environment => patch.set_environment(value),
        }
    }

    const fn is_renderable(self) -> bool {
        !matches!(self, Self::Summary)
    }
}

#[derive(Debug)]
pub struct TextSystemField {
    kind: TextKind,
    services: FieldServices,
}

/// Minimal HTML for the `rendered` REST variant.
pub(crate) fn to_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<p>{}</p>", escaped.replace('\n', "<br/>"))
}

impl TextSystemField {
    #[must_use]
    pub const fn new(kind: TextKind, services: FieldServices) -> Self {
        Self { kind, services }
    }

    #[must_use]
    pub const fn summary(services: FieldServices) -> Self {
        Self::new(TextKind::Summary, services)
    }

    #[must_use]
    pub const fn description(services: FieldServices) -> Self {
        Self::new(TextKind::Description, services)
    }

    #[must_use]
    pub const fn environment(services: FieldServices) -> Self {
        Self::new(TextKind::Environment, services)
    }

    fn normalize(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(if self.kind == TextKind::Summary { raw.trim().to_string() } else { raw.to_string() })
    }
}

impl Field for TextSystemField {
    fn id(&self) -> &str {
        self.kind.field_id()
    }

    fn name_key(&self) -> &str {
        self.kind.name_key()
    }

    fn traits(&self) -> FieldTraits {
        match self.kind {
            TextKind::Summary => FieldTraits::hideable_requirable().mandatory(),
            TextKind::Description | TextKind::Environment => FieldTraits::hideable_requirable().renderable(),
        }
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

impl NavigableField for TextSystemField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        (self.kind == TextKind::Summary).then_some(SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        self.kind.value(issue).map(str::to_string)
    }
}

impl OrderableField for TextSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        FieldValue::Text(self.normalize(params.first(self.id())))
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        holder.insert(self.id(), FieldValue::Text(self.kind.value(issue).map(str::to_string)));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(self.id(), FieldValue::Text(None));
    }

    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        _issue: &Issue,
        item: &FieldLayoutItem,
    ) {
        let id = self.id();
        let Some(text) = ctx.holder.text(id) else {
            if item.required || self.kind == TextKind::Summary {
                add_required_error(errors, id, self.name_key(), i18n);
            }
            return;
        };
        if self.kind == TextKind::Summary {
            if text.chars().count() > MAX_SUMMARY_LENGTH {
                errors.add_error(id, i18n.text("issue.field.summary.too.long", &[]));
            } else if text.contains(['\n', '\r']) {
                errors.add_error(id, i18n.text("createissue.error.summary.newlines", &[]));
            }
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        Ok(IssueValue::from_text(holder.text(self.id())))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        IssueValue::from_text(self.kind.value(issue))
    }

    fn default_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Empty
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if !holder.contains(self.id()) {
            return Ok(());
        }
        self.kind.set(patch, holder.text(self.id()).map(str::to_string));
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
        changes.add_change_item(
            ChangeItemBean::jira(self.id())
                .from_value(None, modified.old.as_text().map(str::to_string))
                .to_value(None, modified.new.as_text().map(str::to_string)),
        );
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        self.kind.value(issue).is_some()
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        self.kind != TextKind::Summary
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        if self.kind == TextKind::Summary {
            return Err(crate::error::FieldError::unsupported(SUMMARY, "remove value"));
        }
        self.kind.set(patch, None);
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], _target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        let needs_input = target_item.required && originals.iter().any(|o| self.kind.value(o).is_none());
        MessagedResult::new(needs_input)
    }

    /// Summaries are unique per issue; renderable text needs one renderer
    /// across the selection.
    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        if self.kind == TextKind::Summary {
            return Some(BULK_UNAVAILABLE);
        }
        let mut renderers = bean.field_layouts.iter().map(|l| l.renderer_type_for_field(self.id()));
        if let Some(first) = renderers.next() {
            if renderers.any(|r| r != first) {
                return Some(BULK_DIFFERENT_RENDERERS);
            }
        }
        hidden_or_permission(self.id(), self.services.permissions.as_ref(), bean, None)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(self.id(), &self.name(i18n), request);
        let value = match view {
            FieldView::View | FieldView::Column => self.kind.value(request.issue).map(str::to_string),
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => request
                .holder
                .and_then(|h| h.text(self.id()).map(str::to_string))
                .or_else(|| self.kind.value(request.issue).map(str::to_string)),
        };
        params.insert("value", value);
        if self.kind == TextKind::Summary {
            params.insert("maxLength", MAX_SUMMARY_LENGTH);
        }
        render(self.services.renderer.as_ref(), &format!("{}-{}.vm", self.id(), view.suffix()), &params)
    }
}

impl RestAwareField for TextSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("string", self.id())
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        let text = self.kind.value(issue);
        let json = FieldJsonRepresentation::new(text.map_or(Value::Null, |t| Value::String(t.to_string())));
        Some(if render && self.kind.is_renderable() {
            json.with_rendered(text.map_or(Value::Null, |t| Value::String(to_html(t))))
        } else {
            json
        })
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
            match &op.value {
                Value::Null => params.set(self.id(), Vec::new()),
                Value::String(text) => params.set(self.id(), vec![text.clone()]),
                other => errors.add_error(self.id(), format!("Field '{}' expects a string, got {other}", self.id())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::common::BULK_UNAVAILABLE_HIDDEN;
    use crate::i18n::DefaultI18n;
    use crate::layout::{BulkOperation, FieldLayout, IssueOperation, WIKI_RENDERER};
    use crate::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn validate(field: &TextSystemField, raw: &str, item: &FieldLayoutItem) -> ErrorCollection {
        let mut ctx = OperationContext::new(IssueOperation::Edit, None);
        field.populate_from_params(&mut ctx.holder, &RequestParams::new().with(field.id(), raw));
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &testing::issue(), item);
        errors
    }

    #[test]
    fn test_summary_rules() {
        let summary = TextSystemField::summary(testing::services());
        let item = FieldLayoutItem::new(SUMMARY);

        assert_eq!(validate(&summary, "  ", &item).error(SUMMARY), Some("Summary is required."));
        assert_eq!(
            validate(&summary, &"x".repeat(256), &item).error(SUMMARY),
            Some("Summary must be less than 255 characters.")
        );
        assert!(validate(&summary, "two\nlines", &item).has_any_errors());
        assert!(!validate(&summary, &"x".repeat(255), &item).has_any_errors());
    }

    #[test]
    fn test_description_required_only_when_configured() {
        let description = TextSystemField::description(testing::services());
        assert!(!validate(&description, "", &FieldLayoutItem::new(DESCRIPTION)).has_any_errors());
        assert!(validate(&description, "", &FieldLayoutItem::new(DESCRIPTION).required()).has_any_errors());
    }

    #[test]
    fn test_update_records_text_change() {
        let summary = TextSystemField::summary(testing::services());
        let issue = testing::issue();
        let mut holder = FieldValuesHolder::new();
        holder.insert(SUMMARY, FieldValue::text("Payroll export drops rows"));
        let mut patch = IssuePatch::new(issue.clone());

        summary.update_issue(None, &mut patch, &mut holder).unwrap();
        let modified = patch.modified(SUMMARY).unwrap().clone();
        let mut changes = IssueChangeHolder::new();
        summary.update_value(None, None, &issue, &modified, &mut changes).unwrap();

        assert_eq!(changes.items[0].from_string.as_deref(), Some("Payroll export drops the last row"));
        assert_eq!(changes.items[0].to_string.as_deref(), Some("Payroll export drops rows"));
    }

    #[test]
    fn test_bulk_edit_rules() {
        let admin = Some(testing::user("admin"));
        let bean = BulkEditBean::new(BulkOperation::Edit, admin, vec![testing::issue()]);
        assert_eq!(TextSystemField::summary(testing::services()).available_for_bulk_edit(&bean), Some(BULK_UNAVAILABLE));

        let mixed = bean.with_layouts(vec![
            Arc::new(FieldLayout::new(None, "Default")),
            Arc::new(FieldLayout::new(Some(1), "Wiki").with_item(FieldLayoutItem::new(DESCRIPTION).with_renderer(WIKI_RENDERER))),
        ]);
        let description = TextSystemField::description(testing::services());
        assert_eq!(description.available_for_bulk_edit(&mixed), Some(BULK_DIFFERENT_RENDERERS));
        assert_eq!(TextSystemField::environment(testing::services()).available_for_bulk_edit(&mixed), None);
    }

    #[test]
    fn test_bulk_edit_blocked_when_one_layout_hides_field() {
        let admin = Some(testing::user("admin"));
        let bean = BulkEditBean::new(BulkOperation::Edit, admin, vec![testing::issue(), testing::stored("HR-2")])
            .with_layouts(vec![
                Arc::new(FieldLayout::new(Some(1), "Bugs").with_item(FieldLayoutItem::new(ENVIRONMENT).hidden())),
                Arc::new(FieldLayout::new(None, "Default")),
            ]);

        let environment = TextSystemField::environment(testing::services());
        assert_eq!(environment.available_for_bulk_edit(&bean), Some(BULK_UNAVAILABLE_HIDDEN));
        let description = TextSystemField::description(testing::services());
        assert_eq!(description.available_for_bulk_edit(&bean), None);
    }

    #[test]
    fn test_rest_rendered_variant() {
        let description = TextSystemField::description(testing::services());
        let mut issue = testing::issue();
        issue.description = Some("a < b".to_string());

        let json = description.json_from_issue(&issue, true, None).unwrap();
        assert_eq!(json.standard, json!("a < b"));
        assert_eq!(json.rendered, Some(json!("<p>a &lt; b</p>")));

        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        description.apply_operations(&issue, &[FieldOperation::set(json!(42))], &mut params, &mut errors);
        assert!(errors.has_any_errors());
    }

    #[test]
    fn test_round_trip_from_issue() {
        let field = TextSystemField::description(testing::services());
        let issue = testing::issue();
        let mut holder = FieldValuesHolder::new();
        field.populate_from_issue(&mut holder, &issue);
        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));
    }
}
