//! Template parameter assembly for field HTML.
//!
//! Fields do not produce markup themselves. They gather named template
//! variables and hand them, with a fixed template file name, to the
//! injected [`TemplateRenderer`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FieldError, Result};
use crate::issue::{Issue, User};
use crate::layout::{FieldLayoutItem, IssueOperation};
use crate::values::FieldValuesHolder;

/// Which HTML a field is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldView {
    Create,
    Edit,
    View,
    BulkEdit,
    Column,
}

impl FieldView {
    /// Template name suffix used by the built-in templates.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Create | Self::Edit | Self::BulkEdit => "edit",
            Self::View => "view",
            Self::Column => "columnview",
        }
    }
}

/// Inputs available when rendering a field.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub issue: &'a Issue,
    pub layout_item: Option<&'a FieldLayoutItem>,
    pub holder: Option<&'a FieldValuesHolder>,
    pub caller: Option<&'a User>,
    pub operation: &'a IssueOperation,
}

impl<'a> RenderRequest<'a> {
    #[must_use]
    pub const fn new(issue: &'a Issue, operation: &'a IssueOperation) -> Self {
        Self {
            issue,
            layout_item: None,
            holder: None,
            caller: None,
            operation,
        }
    }

    #[must_use]
    pub const fn with_layout_item(mut self, item: &'a FieldLayoutItem) -> Self {
        self.layout_item = Some(item);
        self
    }

    #[must_use]
    pub const fn with_holder(mut self, holder: &'a FieldValuesHolder) -> Self {
        self.holder = Some(holder);
        self
    }

    #[must_use]
    pub const fn with_caller(mut self, caller: Option<&'a User>) -> Self {
        self.caller = caller;
        self
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.layout_item.is_some_and(|item| item.required)
    }
}

/// Named template variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateParams(Map<String, Value>);

impl TemplateParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Base parameters every field template receives.
    #[must_use]
    pub fn for_field(field_id: &str, name: &str, request: &RenderRequest<'_>) -> Self {
        let mut params = Self::new();
        params.insert("fieldId", field_id);
        params.insert("fieldName", name);
        params.insert("isRequired", request.is_required());
        params.insert("issueKey", request.issue.key.clone());
        params.insert("isCreateIssue", request.operation.is_create());
        if let Some(item) = request.layout_item {
            params.insert("rendererType", item.renderer());
        }
        params
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Insert any serializable value; values that fail to serialize are
    /// stored as null.
    pub fn insert_serialized<T: Serialize>(&mut self, name: &str, value: &T) {
        self.0
            .insert(name.to_string(), serde_json::to_value(value).unwrap_or(Value::Null));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// Renders a named template with parameters.
pub trait TemplateRenderer: Send + Sync {
    /// # Errors
    /// Returns [`FieldError::Template`] if rendering fails.
    fn render(&self, template: &str, params: &TemplateParams) -> Result<String>;
}

/// Renders templates as an HTML comment naming the template followed by the
/// parameters as JSON. Used by tools and tests in place of real templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTemplateRenderer;

impl TemplateRenderer for JsonTemplateRenderer {
    fn render(&self, template: &str, params: &TemplateParams) -> Result<String> {
        let body = serde_json::to_string(params).map_err(|e| FieldError::Template {
            template: template.to_string(),
            message: e.to_string(),
        })?;
        Ok(format!("<!-- {template} -->{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueType, Project};

    #[test]
    fn test_base_params() {
        let issue = Issue::new(Project::new(1, "HR", "Human Resources"), IssueType::new("1", "Bug"))
            .with_key(10, "HR-1");
        let item = FieldLayoutItem::new("versions").required();
        let operation = IssueOperation::Edit;
        let request = RenderRequest::new(&issue, &operation).with_layout_item(&item);

        let params = TemplateParams::for_field("versions", "Affects Version/s", &request);
        assert_eq!(params.get("isRequired"), Some(&Value::Bool(true)));
        assert_eq!(params.get("issueKey"), Some(&Value::from("HR-1")));
        assert_eq!(params.get("isCreateIssue"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_json_renderer_names_template() {
        let mut params = TemplateParams::new();
        params.insert("unknownVersionId", -1);

        let html = JsonTemplateRenderer.render("versions-edit.vm", &params).unwrap();
        assert!(html.starts_with("<!-- versions-edit.vm -->"));
        assert!(html.contains(r#""unknownVersionId":-1"#));
    }
}
