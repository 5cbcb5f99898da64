//! Custom field type strategies.
//!
//! A [`CustomFieldType`] owns everything type-specific: parsing, validation,
//! display and JSON. Optional capabilities are exposed through accessors
//! returning `Option<&dyn ...>`.

use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{CustomFieldParams, CustomFieldValue, FieldConfig};
use crate::error::{FieldError, Result};
use crate::i18n::I18nHelper;
use crate::rest::JsonType;
use crate::validation::ErrorCollection;

pub const TEXT_FIELD: &str = "issuefields:textfield";
pub const TEXT_AREA: &str = "issuefields:textarea";
pub const NUMBER: &str = "issuefields:float";
pub const SELECT: &str = "issuefields:select";
pub const MULTI_SELECT: &str = "issuefields:multiselect";

/// Behaviour shared by every custom field of one type.
pub trait CustomFieldType: Send + Sync + fmt::Debug {
    fn key(&self) -> &str;

    /// Prefix of the type's templates, e.g. `textfield` for `textfield-edit.vm`.
    fn template_prefix(&self) -> &str;

    /// Check submitted values against the field's configuration, adding
    /// errors under `field_id`.
    fn validate(
        &self,
        field_id: &str,
        params: &CustomFieldParams,
        config: &FieldConfig,
        i18n: &dyn I18nHelper,
        errors: &mut ErrorCollection,
    );

    /// Convert submitted values; `None` when nothing was entered.
    ///
    /// # Errors
    /// Returns [`FieldError::FieldValidation`] for values the type cannot
    /// represent.
    fn value_from_params(&self, params: &CustomFieldParams) -> Result<Option<CustomFieldValue>>;

    fn params_from_value(&self, value: &CustomFieldValue) -> CustomFieldParams;

    /// Plain-text rendering used for columns and change history.
    fn string_from_value(&self, value: &CustomFieldValue) -> String;

    fn json_type(&self, custom_id: i64) -> JsonType;

    fn is_renderable(&self) -> bool {
        false
    }

    fn sortable(&self) -> Option<&dyn SortableCustomFieldType> {
        None
    }

    fn multi_valued(&self) -> Option<&dyn MultiValuedCustomFieldType> {
        None
    }

    fn rest_aware(&self) -> Option<&dyn RestAwareCustomFieldType> {
        None
    }
}

pub trait SortableCustomFieldType {
    fn compare(&self, a: &CustomFieldValue, b: &CustomFieldValue) -> Ordering;
}

/// Types whose value is a set of entries that REST `add`/`remove` can edit.
pub trait MultiValuedCustomFieldType {
    fn entries(&self, value: &CustomFieldValue) -> Vec<String>;
}

pub trait RestAwareCustomFieldType {
    fn json_from_value(&self, value: &CustomFieldValue) -> Value;

    /// Submitted values for a JSON input; `None` if the shape is wrong.
    fn values_from_json(&self, value: &Value) -> Option<Vec<String>>;

    fn allowed_values(&self, _config: &FieldConfig) -> Option<Vec<Value>> {
        None
    }
}

/// Single or multi line free text.
#[derive(Debug, Clone, Copy)]
pub struct TextCustomFieldType {
    multiline: bool,
}

impl TextCustomFieldType {
    #[must_use]
    pub const fn single_line() -> Self {
        Self { multiline: false }
    }

    #[must_use]
    pub const fn multi_line() -> Self {
        Self { multiline: true }
    }
}

impl CustomFieldType for TextCustomFieldType {
    fn key(&self) -> &str {
        if self.multiline { TEXT_AREA } else { TEXT_FIELD }
    }

    fn template_prefix(&self) -> &str {
        if self.multiline { "textarea" } else { "textfield" }
    }

    fn validate(
        &self,
        field_id: &str,
        params: &CustomFieldParams,
        _config: &FieldConfig,
        _i18n: &dyn I18nHelper,
        errors: &mut ErrorCollection,
    ) {
        if !self.multiline && params.first().is_some_and(|v| v.contains('\n')) {
            errors.add_error(field_id, "Only a single line of text is allowed.");
        }
    }

    fn value_from_params(&self, params: &CustomFieldParams) -> Result<Option<CustomFieldValue>> {
        Ok(params.first().map(|v| CustomFieldValue::Text(v.to_string())))
    }

    fn params_from_value(&self, value: &CustomFieldValue) -> CustomFieldParams {
        CustomFieldParams::from_values(vec![self.string_from_value(value)])
    }

    fn string_from_value(&self, value: &CustomFieldValue) -> String {
        value.to_string()
    }

    fn json_type(&self, custom_id: i64) -> JsonType {
        JsonType::custom("string", self.key(), custom_id)
    }

    fn is_renderable(&self) -> bool {
        self.multiline
    }

    fn sortable(&self) -> Option<&dyn SortableCustomFieldType> {
        Some(self)
    }

    fn rest_aware(&self) -> Option<&dyn RestAwareCustomFieldType> {
        Some(self)
    }
}

impl SortableCustomFieldType for TextCustomFieldType {
    fn compare(&self, a: &CustomFieldValue, b: &CustomFieldValue) -> Ordering {
        a.to_string().to_lowercase().cmp(&b.to_string().to_lowercase())
    }
}

impl RestAwareCustomFieldType for TextCustomFieldType {
    fn json_from_value(&self, value: &CustomFieldValue) -> Value {
        Value::String(value.to_string())
    }

    fn values_from_json(&self, value: &Value) -> Option<Vec<String>> {
        match value {
            Value::Null => Some(Vec::new()),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

/// Floating point numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCustomFieldType;

impl NumberCustomFieldType {
    fn parse(raw: &str) -> Option<f64> {
        raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

impl CustomFieldType for NumberCustomFieldType {
    fn key(&self) -> &str {
        NUMBER
    }

    fn template_prefix(&self) -> &str {
        "float"
    }

    fn validate(
        &self,
        field_id: &str,
        params: &CustomFieldParams,
        _config: &FieldConfig,
        i18n: &dyn I18nHelper,
        errors: &mut ErrorCollection,
    ) {
        if let Some(raw) = params.first() {
            if Self::parse(raw).is_none() {
                errors.add_error(field_id, i18n.text("customfield.error.invalid.number", &[raw]));
            }
        }
    }

    fn value_from_params(&self, params: &CustomFieldParams) -> Result<Option<CustomFieldValue>> {
        params
            .first()
            .map(|raw| {
                Self::parse(raw)
                    .map(CustomFieldValue::Number)
                    .ok_or_else(|| FieldError::FieldValidation(format!("'{raw}' is an invalid number")))
            })
            .transpose()
    }

    fn params_from_value(&self, value: &CustomFieldValue) -> CustomFieldParams {
        CustomFieldParams::from_values(vec![self.string_from_value(value)])
    }

    fn string_from_value(&self, value: &CustomFieldValue) -> String {
        value.to_string()
    }

    fn json_type(&self, custom_id: i64) -> JsonType {
        JsonType::custom("number", NUMBER, custom_id)
    }

    fn sortable(&self) -> Option<&dyn SortableCustomFieldType> {
        Some(self)
    }

    fn rest_aware(&self) -> Option<&dyn RestAwareCustomFieldType> {
        Some(self)
    }
}

impl SortableCustomFieldType for NumberCustomFieldType {
    fn compare(&self, a: &CustomFieldValue, b: &CustomFieldValue) -> Ordering {
        match (a, b) {
            (CustomFieldValue::Number(x), CustomFieldValue::Number(y)) => x.total_cmp(y),
            _ => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl RestAwareCustomFieldType for NumberCustomFieldType {
    fn json_from_value(&self, value: &CustomFieldValue) -> Value {
        match value {
            CustomFieldValue::Number(n) => json!(n),
            other => Value::String(other.to_string()),
        }
    }

    fn values_from_json(&self, value: &Value) -> Option<Vec<String>> {
        match value {
            Value::Null => Some(Vec::new()),
            Value::Number(n) => Some(vec![n.to_string()]),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

/// Choice from the options of the field's configuration.
#[derive(Debug, Clone, Copy)]
pub struct SelectCustomFieldType {
    multiple: bool,
}

impl SelectCustomFieldType {
    #[must_use]
    pub const fn single() -> Self {
        Self { multiple: false }
    }

    #[must_use]
    pub const fn multiple() -> Self {
        Self { multiple: true }
    }
}

impl CustomFieldType for SelectCustomFieldType {
    fn key(&self) -> &str {
        if self.multiple { MULTI_SELECT } else { SELECT }
    }

    fn template_prefix(&self) -> &str {
        if self.multiple { "multiselect" } else { "select" }
    }

    fn validate(
        &self,
        field_id: &str,
        params: &CustomFieldParams,
        config: &FieldConfig,
        i18n: &dyn I18nHelper,
        errors: &mut ErrorCollection,
    ) {
        let values = params.non_blank();
        if !self.multiple && values.len() > 1 {
            errors.add_error(field_id, i18n.text("customfield.error.single.option", &[]));
            return;
        }
        for value in values {
            if !config.options.iter().any(|o| o == value) {
                errors.add_error(field_id, i18n.text("customfield.error.invalid.option", &[value]));
            }
        }
    }

    fn value_from_params(&self, params: &CustomFieldParams) -> Result<Option<CustomFieldValue>> {
        let values: Vec<String> = params.non_blank().into_iter().map(str::to_string).collect();
        if values.is_empty() {
            return Ok(None);
        }
        if !self.multiple && values.len() > 1 {
            return Err(FieldError::FieldValidation("only one option may be selected".into()));
        }
        Ok(Some(CustomFieldValue::Options(values)))
    }

    fn params_from_value(&self, value: &CustomFieldValue) -> CustomFieldParams {
        CustomFieldParams::from_values(self.entries(value))
    }

    fn string_from_value(&self, value: &CustomFieldValue) -> String {
        value.to_string()
    }

    fn json_type(&self, custom_id: i64) -> JsonType {
        if self.multiple {
            JsonType::custom_array("option", MULTI_SELECT, custom_id)
        } else {
            JsonType::custom("option", SELECT, custom_id)
        }
    }

    fn multi_valued(&self) -> Option<&dyn MultiValuedCustomFieldType> {
        if self.multiple { Some(self) } else { None }
    }

    fn rest_aware(&self) -> Option<&dyn RestAwareCustomFieldType> {
        Some(self)
    }
}

impl MultiValuedCustomFieldType for SelectCustomFieldType {
    fn entries(&self, value: &CustomFieldValue) -> Vec<String> {
        match value {
            CustomFieldValue::Options(options) => options.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl RestAwareCustomFieldType for SelectCustomFieldType {
    fn json_from_value(&self, value: &CustomFieldValue) -> Value {
        let options: Vec<Value> = self.entries(value).into_iter().map(|o| json!({"value": o})).collect();
        if self.multiple {
            Value::Array(options)
        } else {
            options.into_iter().next().unwrap_or(Value::Null)
        }
    }

    fn values_from_json(&self, value: &Value) -> Option<Vec<String>> {
        let single = |v: &Value| -> Option<String> {
            match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("value").and_then(Value::as_str).map(str::to_string),
                _ => None,
            }
        };
        match value {
            Value::Null => Some(Vec::new()),
            Value::Array(items) => items.iter().map(single).collect(),
            other => single(other).map(|v| vec![v]),
        }
    }

    fn allowed_values(&self, config: &FieldConfig) -> Option<Vec<Value>> {
        Some(config.options.iter().map(|o| json!({"value": o})).collect())
    }
}

/// Custom field types by key.
#[derive(Clone)]
pub struct CustomFieldTypeRegistry {
    types: BTreeMap<String, Arc<dyn CustomFieldType>>,
}

impl CustomFieldTypeRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self { types: BTreeMap::new() }
    }

    /// The text, number and select types.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with(Arc::new(TextCustomFieldType::single_line()))
            .with(Arc::new(TextCustomFieldType::multi_line()))
            .with(Arc::new(NumberCustomFieldType))
            .with(Arc::new(SelectCustomFieldType::single()))
            .with(Arc::new(SelectCustomFieldType::multiple()))
    }

    #[must_use]
    pub fn with(mut self, field_type: Arc<dyn CustomFieldType>) -> Self {
        self.types.insert(field_type.key().to_string(), field_type);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn CustomFieldType>> {
        self.types.get(key).cloned()
    }
}

impl Default for CustomFieldTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for CustomFieldTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use pretty_assertions::assert_eq;

    fn config(options: &[&str]) -> FieldConfig {
        FieldConfig::new(1).with_options(options.iter().map(|o| (*o).to_string()).collect())
    }

    #[test]
    fn test_number_validation() {
        let number = NumberCustomFieldType;
        let mut errors = ErrorCollection::new();
        number.validate("customfield_1", &CustomFieldParams::from_values(vec!["abc".into()]), &config(&[]), &DefaultI18n, &mut errors);
        assert!(errors.error("customfield_1").unwrap().contains("abc"));

        let value = number.value_from_params(&CustomFieldParams::from_values(vec![" 3.5 ".into()])).unwrap();
        assert_eq!(value, Some(CustomFieldValue::Number(3.5)));
        assert_eq!(number.value_from_params(&CustomFieldParams::new()).unwrap(), None);
    }

    #[test]
    fn test_select_rejects_unknown_and_multiple() {
        let select = SelectCustomFieldType::single();
        let cfg = config(&["Low", "High"]);

        let mut errors = ErrorCollection::new();
        select.validate("cf", &CustomFieldParams::from_values(vec!["Medium".into()]), &cfg, &DefaultI18n, &mut errors);
        assert!(errors.error("cf").is_some());

        let mut errors = ErrorCollection::new();
        select.validate("cf", &CustomFieldParams::from_values(vec!["Low".into(), "High".into()]), &cfg, &DefaultI18n, &mut errors);
        assert!(errors.error("cf").unwrap().contains("one option"));
    }

    #[test]
    fn test_capabilities() {
        let registry = CustomFieldTypeRegistry::builtin();
        let multi = registry.get(MULTI_SELECT).unwrap();
        assert!(multi.multi_valued().is_some());
        assert!(multi.sortable().is_none());

        let text = registry.get(TEXT_AREA).unwrap();
        assert!(text.is_renderable());
        assert!(text.sortable().is_some());
        assert!(registry.get("bogus").is_none());
    }

    #[test]
    fn test_select_json() {
        let multi = SelectCustomFieldType::multiple();
        let value = CustomFieldValue::Options(vec!["A".into(), "B".into()]);
        let rest = multi.rest_aware().unwrap();

        assert_eq!(rest.json_from_value(&value), json!([{"value": "A"}, {"value": "B"}]));
        assert_eq!(rest.values_from_json(&json!([{"value": "A"}, "C"])), Some(vec!["A".to_string(), "C".to_string()]));
    }
}
