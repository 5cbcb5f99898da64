//! REST representation of fields: schema, values and update operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldError, Result};

/// JSON schema descriptor of a field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonType {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(rename = "customId", default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<i64>,
}

impl JsonType {
    #[must_use]
    pub fn system(field_type: &str, system: &str) -> Self {
        Self {
            field_type: field_type.to_string(),
            items: None,
            system: Some(system.to_string()),
            custom: None,
            custom_id: None,
        }
    }

    #[must_use]
    pub fn system_array(items: &str, system: &str) -> Self {
        Self {
            items: Some(items.to_string()),
            ..Self::system("array", system)
        }
    }

    #[must_use]
    pub fn custom(field_type: &str, custom_key: &str, custom_id: i64) -> Self {
        Self {
            field_type: field_type.to_string(),
            items: None,
            system: None,
            custom: Some(custom_key.to_string()),
            custom_id: Some(custom_id),
        }
    }

    #[must_use]
    pub fn custom_array(items: &str, custom_key: &str, custom_id: i64) -> Self {
        Self {
            items: Some(items.to_string()),
            ..Self::custom("array", custom_key, custom_id)
        }
    }
}

/// A field's value as REST JSON, with an optional rendered (HTML) variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldJsonRepresentation {
    pub standard: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Value>,
}

impl FieldJsonRepresentation {
    #[must_use]
    pub const fn new(standard: Value) -> Self {
        Self {
            standard,
            rendered: None,
        }
    }

    #[must_use]
    pub fn with_rendered(mut self, rendered: Value) -> Self {
        self.rendered = Some(rendered);
        self
    }
}

/// Edit metadata for a field: allowed values and picker hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTypeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_complete_url: Option<String>,
}

/// Verbs of the REST `update` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardOperation {
    Set,
    Add,
    Remove,
    Edit,
}

impl StandardOperation {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "set" => Some(Self::Set),
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Edit => "edit",
        }
    }
}

/// One entry of a field's REST update list, e.g. `{"add": {"name": "UI"}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOperation {
    pub operation: StandardOperation,
    pub value: Value,
}

impl FieldOperation {
    #[must_use]
    pub const fn new(operation: StandardOperation, value: Value) -> Self {
        Self { operation, value }
    }

    #[must_use]
    pub const fn set(value: Value) -> Self {
        Self::new(StandardOperation::Set, value)
    }

    /// Parse a JSON update list: `[{"set": ...}, {"add": ...}]`.
    ///
    /// # Errors
    /// Returns [`FieldError::FieldValidation`] for entries that are not
    /// single-key objects naming a known operation.
    pub fn parse_list(value: &Value) -> Result<Vec<Self>> {
        let entries = value
            .as_array()
            .ok_or_else(|| FieldError::FieldValidation("update must be a list of operations".into()))?;
        entries
            .iter()
            .map(|entry| {
                let object = entry
                    .as_object()
                    .filter(|o| o.len() == 1)
                    .ok_or_else(|| FieldError::FieldValidation(format!("malformed operation: {entry}")))?;
                let (name, value) = object
                    .iter()
                    .next()
                    .ok_or_else(|| FieldError::FieldValidation(format!("malformed operation: {entry}")))?;
                let operation = StandardOperation::parse(name)
                    .ok_or_else(|| FieldError::FieldValidation(format!("unknown operation '{name}'")))?;
                Ok(Self::new(operation, value.clone()))
            })
            .collect()
    }
}

/// Read `{"id": ..}` or `{"name": ..}` (or a bare string/number) as a string.
#[must_use]
pub fn id_or_name(value: &Value) -> Option<IdOrName> {
    match value {
        Value::String(s) => Some(IdOrName::Name(s.clone())),
        Value::Number(n) => Some(IdOrName::Id(n.to_string())),
        Value::Object(o) => o
            .get("id")
            .and_then(|id| match id {
                Value::String(s) => Some(IdOrName::Id(s.clone())),
                Value::Number(n) => Some(IdOrName::Id(n.to_string())),
                _ => None,
            })
            .or_else(|| {
                o.get("name")
                    .or_else(|| o.get("key"))
                    .and_then(Value::as_str)
                    .map(|s| IdOrName::Name(s.to_string()))
            }),
        _ => None,
    }
}

/// An entity reference from REST input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOrName {
    Id(String),
    Name(String),
}

/// Field metadata as listed by the field endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    pub id: String,
    pub key: String,
    pub name: String,
    pub custom: bool,
    pub orderable: bool,
    pub navigable: bool,
    pub searchable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<JsonType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clause_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_json_type_serialization() {
        let schema = JsonType::system_array("component", "components");
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"type": "array", "items": "component", "system": "components"})
        );

        let custom = JsonType::custom("number", "com.example:float", 10001);
        assert_eq!(
            serde_json::to_value(&custom).unwrap(),
            json!({"type": "number", "custom": "com.example:float", "customId": 10001})
        );
    }

    #[test]
    fn test_parse_operation_list() {
        let ops = FieldOperation::parse_list(&json!([{"add": {"name": "UI"}}, {"remove": {"id": "10000"}}])).unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation, StandardOperation::Add);
        assert_eq!(id_or_name(&ops[0].value), Some(IdOrName::Name("UI".into())));
        assert_eq!(id_or_name(&ops[1].value), Some(IdOrName::Id("10000".into())));
    }

    #[test]
    fn test_parse_rejects_unknown_operation() {
        assert!(FieldOperation::parse_list(&json!([{"replace": 1}])).is_err());
        assert!(FieldOperation::parse_list(&json!([{"set": 1, "add": 2}])).is_err());
        assert!(FieldOperation::parse_list(&json!({"set": 1})).is_err());
    }
}
