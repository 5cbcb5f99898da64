//! Admin-defined custom fields.

pub mod types;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::field::ids::CUSTOM_FIELD_PREFIX;
use crate::field::{Field, FieldTraits, NavigableField, OrderableField, RestAwareField, SortOrder, check_supported};
use crate::fields::common::{hidden_or_permission, render};
use crate::history::{ChangeItemBean, FieldType, IssueChangeHolder};
use crate::i18n::I18nHelper;
use crate::issue::{Issue, Project, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, JsonType, StandardOperation};
use crate::services::FieldServices;
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

pub use types::{CustomFieldType, CustomFieldTypeRegistry};

pub const BULK_INCOMPATIBLE_CONFIGS: &str = "bulk.edit.incompatible.customfields";
pub const BULK_NOT_IN_SCOPE: &str = "bulk.edit.unavailable.customfield.notinscope";
pub const BULK_DIFFERENT_RENDERERS: &str = "bulk.edit.unavailable.different.renderers";

/// A stored custom field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CustomFieldValue {
    Text(String),
    Number(f64),
    Options(Vec<String>),
}

impl fmt::Display for CustomFieldValue {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Options(options) => f.write_str(&options.join(", ")),
        }
    }
}

/// Submitted custom field values. The main values are keyed by `None`;
/// multi-part types may add named sub-values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldParams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_values: BTreeMap<String, Vec<String>>,
}

impl CustomFieldParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_values(values: Vec<String>) -> Self {
        Self {
            values,
            sub_values: BTreeMap::new(),
        }
    }

    /// First non-blank main value.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        crate::values::params::first_non_blank(&self.values)
    }

    /// Main values with blanks dropped.
    #[must_use]
    pub fn non_blank(&self) -> Vec<&str> {
        self.values
            .iter()
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.non_blank().is_empty() && self.sub_values.values().all(Vec::is_empty)
    }
}

/// Per-context configuration of a custom field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<CustomFieldValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldConfig {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: CustomFieldValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Where a configuration applies. Empty lists mean every project or issue
/// type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfigScheme {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issue_type_ids: Vec<String>,
    pub config: FieldConfig,
}

impl FieldConfigScheme {
    #[must_use]
    pub fn global(id: i64, config: FieldConfig) -> Self {
        Self {
            id,
            project_ids: Vec::new(),
            issue_type_ids: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub fn for_projects(mut self, project_ids: Vec<i64>) -> Self {
        self.project_ids = project_ids;
        self
    }

    #[must_use]
    pub fn for_issue_types(mut self, issue_type_ids: Vec<String>) -> Self {
        self.issue_type_ids = issue_type_ids;
        self
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.project_ids.is_empty() && self.issue_type_ids.is_empty()
    }

    #[must_use]
    pub fn applies_to(&self, project_id: i64, issue_type_id: &str) -> bool {
        (self.project_ids.is_empty() || self.project_ids.contains(&project_id))
            && (self.issue_type_ids.is_empty() || self.issue_type_ids.iter().any(|t| t == issue_type_id))
    }
}

const fn searchable_default() -> bool {
    true
}

/// A custom field as defined by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub type_key: String,
    #[serde(default = "searchable_default")]
    pub searchable: bool,
    #[serde(default)]
    pub schemes: Vec<FieldConfigScheme>,
}

impl CustomFieldDefinition {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, type_key: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            type_key: type_key.into(),
            searchable: true,
            schemes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: FieldConfigScheme) -> Self {
        self.schemes.push(scheme);
        self
    }

    #[must_use]
    pub fn field_id(&self) -> String {
        format!("{CUSTOM_FIELD_PREFIX}{}", self.id)
    }
}

/// The field contract for a custom field, delegating type-specific behaviour
/// to its [`CustomFieldType`].
pub struct CustomField {
    id: String,
    definition: CustomFieldDefinition,
    field_type: Arc<dyn CustomFieldType>,
    services: FieldServices,
}

impl fmt::Debug for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomField")
            .field("id", &self.id)
            .field("type", &self.field_type.key())
            .finish_non_exhaustive()
    }
}

impl CustomField {
    #[must_use]
    pub fn new(definition: CustomFieldDefinition, field_type: Arc<dyn CustomFieldType>, services: FieldServices) -> Self {
        Self {
            id: definition.field_id(),
            definition,
            field_type,
            services,
        }
    }

    #[must_use]
    pub const fn definition(&self) -> &CustomFieldDefinition {
        &self.definition
    }

    #[must_use]
    pub fn field_type(&self) -> &dyn CustomFieldType {
        self.field_type.as_ref()
    }

    /// The configuration for a project and issue type. Specific schemes win
    /// over global ones.
    #[must_use]
    pub fn config_for(&self, project_id: i64, issue_type_id: &str) -> Option<&FieldConfig> {
        let schemes = &self.definition.schemes;
        schemes
            .iter()
            .find(|s| !s.is_global() && s.applies_to(project_id, issue_type_id))
            .or_else(|| schemes.iter().find(|s| s.is_global()))
            .map(|s| &s.config)
    }

    #[must_use]
    pub fn relevant_config(&self, issue: &Issue) -> Option<&FieldConfig> {
        self.config_for(issue.project.id, &issue.issue_type.id)
    }

    #[must_use]
    pub fn is_in_scope(&self, project_id: i64, issue_type_id: &str) -> bool {
        self.config_for(project_id, issue_type_id).is_some()
    }

    /// Scope check over sets of projects and issue types; empty sets match
    /// anything.
    #[must_use]
    pub fn is_in_scope_for(&self, project_ids: &[i64], issue_type_ids: &[String]) -> bool {
        self.definition.schemes.iter().any(|scheme| {
            let projects = scheme.project_ids.is_empty()
                || project_ids.is_empty()
                || project_ids.iter().any(|p| scheme.project_ids.contains(p));
            let types = scheme.issue_type_ids.is_empty()
                || issue_type_ids.is_empty()
                || issue_type_ids.iter().any(|t| scheme.issue_type_ids.contains(t));
            projects && types
        })
    }

    fn value_of(issue: &Issue, id: &str) -> Option<CustomFieldValue> {
        issue.custom_field_values.get(id).cloned()
    }

    fn display(&self, value: Option<&CustomFieldValue>) -> Option<String> {
        value.map(|v| self.field_type.string_from_value(v))
    }

    fn renderers_differ(&self, issues: &[Issue], renderer: Option<&str>) -> bool {
        let mut renderers = issues.iter().map(|issue| {
            self.services
                .layouts
                .field_layout(issue.project.id, &issue.issue_type.id)
                .renderer_type_for_field(&self.id)
        });
        let first = renderer.map(str::to_string).or_else(|| renderers.next());
        first.is_some_and(|first| renderers.any(|r| r != first))
    }

    fn params_from_json(&self, value: &Value) -> Option<Vec<String>> {
        match self.field_type.rest_aware() {
            Some(rest) => rest.values_from_json(value),
            None => value.as_str().map(|s| vec![s.to_string()]),
        }
    }
}

impl Field for CustomField {
    fn id(&self) -> &str {
        &self.id
    }

    fn name_key(&self) -> &str {
        &self.definition.name
    }

    fn name(&self, _i18n: &dyn I18nHelper) -> String {
        self.definition.name.clone()
    }

    fn traits(&self) -> FieldTraits {
        let mut traits = FieldTraits::hideable_requirable();
        traits.searchable = self.definition.searchable;
        traits.renderable = self.field_type.is_renderable();
        traits
    }

    fn is_custom(&self) -> bool {
        true
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

impl NavigableField for CustomField {
    fn default_sort_order(&self) -> Option<SortOrder> {
        self.field_type.sortable().map(|_| SortOrder::Asc)
    }

    fn column_value(&self, issue: &Issue) -> Option<String> {
        self.display(issue.custom_field_values.get(&self.id))
    }
}

impl OrderableField for CustomField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        let mut custom = CustomFieldParams::from_values(params.values(&self.id));
        let prefix = format!("{}:", self.id);
        for (name, values) in params.with_prefix(&prefix) {
            custom.sub_values.insert(name[prefix.len()..].to_string(), values.clone());
        }
        FieldValue::Custom(custom)
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        let params = Self::value_of(issue, &self.id)
            .map(|v| self.field_type.params_from_value(&v))
            .unwrap_or_default();
        holder.insert(self.id.clone(), FieldValue::Custom(params));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        let params = self
            .relevant_config(issue)
            .and_then(|c| c.default_value.as_ref())
            .map(|v| self.field_type.params_from_value(v))
            .unwrap_or_default();
        holder.insert(self.id.clone(), FieldValue::Custom(params));
    }

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        let params = CustomFieldParams::from_values(vec![value.to_string()]);
        self.field_type.value_from_params(&params)?;
        holder.insert(self.id.clone(), FieldValue::Custom(params));
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
        let Some(config) = self.relevant_config(issue) else {
            return;
        };
        let params = ctx.holder.custom(&self.id).cloned().unwrap_or_default();
        let before = errors.errors().len();
        self.field_type.validate(&self.id, &params, config, i18n, errors);
        if errors.errors().len() == before && item.required && params.is_empty() {
            errors.add_error(self.id.clone(), i18n.text("issue.field.required", &[&self.definition.name]));
        }
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        let Some(params) = holder.custom(&self.id) else {
            return Ok(IssueValue::Empty);
        };
        Ok(self
            .field_type
            .value_from_params(params)?
            .map_or(IssueValue::Empty, IssueValue::Custom))
    }

    fn current_value(&self, issue: &Issue) -> IssueValue {
        Self::value_of(issue, &self.id).map_or(IssueValue::Empty, IssueValue::Custom)
    }

    fn default_value(&self, issue: &Issue) -> IssueValue {
        self.relevant_config(issue)
            .and_then(|c| c.default_value.clone())
            .map_or(IssueValue::Empty, IssueValue::Custom)
    }

    fn update_issue(
        &self,
        _item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()> {
        if !holder.contains(&self.id) {
            return Ok(());
        }
        let value = match self.value_from_params(holder)? {
            IssueValue::Custom(value) => Some(value),
            _ => None,
        };
        patch.set_custom_field_value(&self.id, value);
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
        let string = |value: &IssueValue| match value {
            IssueValue::Custom(v) => Some(self.field_type.string_from_value(v)),
            _ => None,
        };
        let old = string(&modified.old);
        let new = string(&modified.new);
        changes.add_change_item(
            ChangeItemBean::new(FieldType::Custom, self.definition.name.clone())
                .from_value(old.clone(), old)
                .to_value(new.clone(), new),
        );
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool {
        issue.custom_field_values.contains_key(&self.id)
    }

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        true
    }

    fn remove_value_from_issue_object(&self, patch: &mut IssuePatch) -> Result<()> {
        patch.set_custom_field_value(&self.id, None);
        Ok(())
    }

    fn needs_move(&self, originals: &[Issue], target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        let Some(target_config) = self.relevant_config(target) else {
            return MessagedResult::no_input();
        };
        for original in originals {
            let Some(value) = original.custom_field_values.get(&self.id) else {
                if target_item.required {
                    return MessagedResult::input_required();
                }
                continue;
            };
            if self.relevant_config(original).is_none() {
                return MessagedResult::input_required();
            }
            let mut errors = ErrorCollection::new();
            let params = self.field_type.params_from_value(value);
            self.field_type
                .validate(&self.id, &params, target_config, self.services.i18n.as_ref(), &mut errors);
            if errors.has_any_errors() {
                return MessagedResult::input_required();
            }
        }
        if self.field_type.is_renderable() && originals.len() > 1 && self.renderers_differ(originals, Some(target_item.renderer())) {
            return MessagedResult::warning(
                self.services
                    .i18n
                    .text("renderer.bulk.move.warning", &[&self.definition.name]),
            );
        }
        MessagedResult::no_input()
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        if let Some(reason) = hidden_or_permission(&self.id, self.services.permissions.as_ref(), bean, None) {
            return Some(reason);
        }
        let mut config_ids = Vec::new();
        for issue in &bean.selected_issues {
            let Some(config) = self.relevant_config(issue) else {
                return Some(BULK_NOT_IN_SCOPE);
            };
            if !config_ids.contains(&config.id) {
                config_ids.push(config.id);
            }
        }
        if config_ids.len() > 1 {
            return Some(BULK_INCOMPATIBLE_CONFIGS);
        }
        if self.field_type.is_renderable() {
            let mut renderers = bean.field_layouts.iter().map(|l| l.renderer_type_for_field(&self.id));
            if let Some(first) = renderers.next() {
                if renderers.any(|r| r != first) {
                    return Some(BULK_DIFFERENT_RENDERERS);
                }
            }
        }
        None
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let mut params = TemplateParams::for_field(&self.id, &self.definition.name, request);
        let issue = request.issue;
        params.insert("description", self.definition.description.clone());
        match view {
            FieldView::View | FieldView::Column => {
                params.insert("value", self.display(issue.custom_field_values.get(&self.id)));
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let current = request
                    .holder
                    .and_then(|h| h.custom(&self.id).cloned())
                    .unwrap_or_else(|| {
                        Self::value_of(issue, &self.id)
                            .map(|v| self.field_type.params_from_value(&v))
                            .unwrap_or_default()
                    });
                params.insert_serialized("customFieldParams", &current);
                if let Some(config) = self.relevant_config(issue) {
                    params.insert_serialized("options", &config.options);
                }
            }
        }
        let template = format!("{}-{}.vm", self.field_type.template_prefix(), view.suffix());
        render(self.services.renderer.as_ref(), &template, &params)
    }
}

impl RestAwareField for CustomField {
    fn json_schema(&self) -> JsonType {
        self.field_type.json_type(self.definition.id)
    }

    fn field_type_info(&self, project: &Project, issue: Option<&Issue>) -> FieldTypeInfo {
        let config = match issue {
            Some(issue) => self.relevant_config(issue),
            None => self.config_for(project.id, ""),
        };
        FieldTypeInfo {
            allowed_values: config.and_then(|c| self.field_type.rest_aware()?.allowed_values(c)),
            auto_complete_url: None,
        }
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        self.relevant_config(issue)?;
        let json = issue
            .custom_field_values
            .get(&self.id)
            .map_or(Value::Null, |value| match self.field_type.rest_aware() {
                Some(rest) => rest.json_from_value(value),
                None => Value::String(self.field_type.string_from_value(value)),
            });
        Some(FieldJsonRepresentation::new(json))
    }

    fn json_default_value(&self, issue: &Issue) -> Option<Value> {
        let value = self.relevant_config(issue)?.default_value.as_ref()?;
        Some(match self.field_type.rest_aware() {
            Some(rest) => rest.json_from_value(value),
            None => Value::String(self.field_type.string_from_value(value)),
        })
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        if self.field_type.multi_valued().is_some() {
            &[StandardOperation::Set, StandardOperation::Add, StandardOperation::Remove]
        } else {
            &[StandardOperation::Set]
        }
    }

    fn apply_operations(
        &self,
        issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        let mut values: Vec<String> = match (issue.custom_field_values.get(&self.id), self.field_type.multi_valued()) {
            (Some(value), Some(multi)) => multi.entries(value),
            (Some(value), None) => self.field_type.params_from_value(value).values,
            (None, _) => Vec::new(),
        };
        for op in check_supported(self, operations, errors) {
            let Some(submitted) = self.params_from_json(&op.value) else {
                errors.add_error(self.id.clone(), format!("Invalid value for {}: {}", self.definition.name, op.value));
                continue;
            };
            match op.operation {
                StandardOperation::Add => {
                    values.extend(submitted.into_iter().filter(|v| !values.contains(v)).collect::<Vec<_>>());
                }
                StandardOperation::Remove => values.retain(|v| !submitted.contains(v)),
                StandardOperation::Set | StandardOperation::Edit => values = submitted,
            }
        }
        params.set(self.id.clone(), values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use crate::issue::IssueType;
    use crate::layout::{BulkOperation, IssueOperation};
    use crate::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn story_points() -> CustomField {
        let definition = CustomFieldDefinition::new(10000, "Story Points", types::NUMBER)
            .with_scheme(FieldConfigScheme::global(1, FieldConfig::new(1)).for_projects(vec![testing::HR]));
        CustomField::new(definition, Arc::new(types::NumberCustomFieldType), testing::services())
    }

    fn severity() -> CustomField {
        let options = vec!["Low".to_string(), "High".to_string()];
        let definition = CustomFieldDefinition::new(10001, "Severity", types::SELECT)
            .with_scheme(FieldConfigScheme::global(2, FieldConfig::new(2).with_options(options.clone())))
            .with_scheme(
                FieldConfigScheme::global(3, FieldConfig::new(3).with_options(vec!["Low".into()]))
                    .for_projects(vec![testing::MKT]),
            );
        CustomField::new(definition, Arc::new(types::SelectCustomFieldType::single()), testing::services())
    }

    #[test]
    fn test_scope_and_config() {
        let field = severity();
        assert_eq!(field.id(), "customfield_10001");
        assert_eq!(field.config_for(testing::MKT, "1").map(|c| c.id), Some(3));
        assert_eq!(field.config_for(testing::HR, "1").map(|c| c.id), Some(2));

        let points = story_points();
        assert!(points.is_in_scope(testing::HR, "1"));
        assert!(!points.is_in_scope(testing::MKT, "1"));
        assert!(points.is_in_scope_for(&[testing::MKT, testing::HR], &[]));
    }

    #[test]
    fn test_validation_then_required() {
        let field = story_points();
        let issue = testing::issue();
        let item = FieldLayoutItem::new(field.id()).required();

        let mut ctx = OperationContext::new(IssueOperation::Edit, None);
        field.populate_from_params(&mut ctx.holder, &RequestParams::new().with(field.id(), "many"));
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &issue, &item);
        assert!(errors.error(field.id()).unwrap().contains("invalid number"));

        let mut ctx = OperationContext::new(IssueOperation::Edit, None);
        field.populate_from_params(&mut ctx.holder, &RequestParams::new());
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &issue, &item);
        assert_eq!(errors.error(field.id()), Some("Story Points is required."));
    }

    #[test]
    fn test_update_records_custom_change_item() {
        let field = story_points();
        let issue = testing::issue();
        let mut holder = FieldValuesHolder::new();
        field.populate_from_params(&mut holder, &RequestParams::new().with(field.id(), "5"));
        let mut patch = IssuePatch::new(issue.clone());

        field.update_issue(None, &mut patch, &mut holder).unwrap();
        let modified = patch.modified(field.id()).unwrap().clone();
        let mut changes = IssueChangeHolder::new();
        field.update_value(None, None, &issue, &modified, &mut changes).unwrap();

        let item = &changes.items[0];
        assert_eq!(item.field_type, FieldType::Custom);
        assert_eq!(item.field, "Story Points");
        assert_eq!(item.to_string.as_deref(), Some("5"));
    }

    #[test]
    fn test_round_trip_from_issue() {
        let field = severity();
        let mut issue = testing::issue();
        issue
            .custom_field_values
            .insert(field.id().to_string(), CustomFieldValue::Options(vec!["High".into()]));
        let mut holder = FieldValuesHolder::new();

        field.populate_from_issue(&mut holder, &issue);

        assert_eq!(field.value_from_params(&holder).unwrap(), field.current_value(&issue));
    }

    #[test]
    fn test_needs_move_when_value_invalid_in_target() {
        let field = severity();
        let mut original = testing::issue();
        original
            .custom_field_values
            .insert(field.id().to_string(), CustomFieldValue::Options(vec!["High".into()]));
        let target = Issue::new(testing::marketing(), IssueType::new("1", "Bug"));

        let result = field.needs_move(&[original], &target, &FieldLayoutItem::new(field.id()));
        assert!(result.needs_input);
    }

    #[test]
    fn test_bulk_edit_requires_one_config() {
        let field = severity();
        let admin = Some(testing::user("admin"));
        let marketing_issue = Issue::new(testing::marketing(), IssueType::new("1", "Bug"));

        let bean = BulkEditBean::new(BulkOperation::Edit, admin.clone(), vec![testing::issue(), marketing_issue]);
        assert_eq!(field.available_for_bulk_edit(&bean), Some(BULK_INCOMPATIBLE_CONFIGS));

        let bean = BulkEditBean::new(BulkOperation::Edit, admin, vec![testing::issue()]);
        assert_eq!(field.available_for_bulk_edit(&bean), None);
    }

    #[test]
    fn test_rest_json_and_set() {
        let field = severity();
        let mut issue = testing::issue();
        issue
            .custom_field_values
            .insert(field.id().to_string(), CustomFieldValue::Options(vec!["Low".into()]));

        let json = field.json_from_issue(&issue, false, None).unwrap();
        assert_eq!(json.standard, json!({"value": "Low"}));

        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        field.apply_operations(&issue, &[FieldOperation::set(json!({"value": "High"}))], &mut params, &mut errors);
        assert_eq!(params.values(field.id()), vec!["High".to_string()]);

        field.apply_operations(
            &issue,
            &[FieldOperation::new(StandardOperation::Add, json!("High"))],
            &mut params,
            &mut errors,
        );
        assert!(errors.has_any_errors());
    }

    #[test]
    fn test_number_display() {
        assert_eq!(CustomFieldValue::Number(5.0).to_string(), "5");
        assert_eq!(CustomFieldValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CustomFieldValue::Options(vec!["A".into(), "B".into()]).to_string(), "A, B");
    }
}
