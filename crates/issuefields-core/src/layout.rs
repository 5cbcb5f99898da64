//! Field layouts and per-operation context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::issue::{Issue, Project, User};
use crate::values::FieldValuesHolder;

/// Renderer used for text-like fields when none is configured.
pub const DEFAULT_RENDERER: &str = "jira-text-renderer";
/// Wiki-style renderer.
pub const WIKI_RENDERER: &str = "atlassian-wiki-renderer";

/// Per-field configuration within a layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayoutItem {
    pub field_id: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer_type: Option<String>,
}

impl FieldLayoutItem {
    /// Visible, optional, default renderer.
    #[must_use]
    pub fn new(field_id: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            hidden: false,
            required: false,
            renderer_type: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer_type = Some(renderer.into());
        self
    }

    #[must_use]
    pub fn renderer(&self) -> &str {
        self.renderer_type.as_deref().unwrap_or(DEFAULT_RENDERER)
    }
}

/// Visibility, requiredness and renderers for every field of a project and
/// issue type combination.
///
/// Fields without an explicit item are visible and optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    /// `None` for the system default layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: BTreeMap<String, FieldLayoutItem>,
}

impl FieldLayout {
    #[must_use]
    pub fn new(id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: FieldLayoutItem) -> Self {
        self.items.insert(item.field_id.clone(), item);
        self
    }

    /// The item for a field, defaulted if the layout does not mention it.
    #[must_use]
    pub fn item(&self, field_id: &str) -> FieldLayoutItem {
        self.items
            .get(field_id)
            .cloned()
            .unwrap_or_else(|| FieldLayoutItem::new(field_id))
    }

    #[must_use]
    pub fn is_field_hidden(&self, field_id: &str) -> bool {
        self.items.get(field_id).is_some_and(|item| item.hidden)
    }

    #[must_use]
    pub fn renderer_type_for_field(&self, field_id: &str) -> String {
        self.item(field_id).renderer().to_string()
    }
}

/// The operation a field is taking part in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueOperation {
    Create,
    #[default]
    Edit,
    /// A workflow transition with optional resolution restrictions.
    Transition {
        #[serde(default)]
        include_resolutions: Vec<String>,
        #[serde(default)]
        exclude_resolutions: Vec<String>,
    },
    Move,
    BulkEdit,
}

impl IssueOperation {
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }

    #[must_use]
    pub const fn is_edit(&self) -> bool {
        matches!(self, Self::Edit)
    }
}

/// Mutable per-operation state handed to validation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub operation: IssueOperation,
    pub caller: Option<User>,
    pub holder: FieldValuesHolder,
}

impl OperationContext {
    #[must_use]
    pub fn new(operation: IssueOperation, caller: Option<User>) -> Self {
        Self {
            operation,
            caller,
            holder: FieldValuesHolder::new(),
        }
    }

    #[must_use]
    pub fn with_holder(mut self, holder: FieldValuesHolder) -> Self {
        self.holder = holder;
        self
    }
}

/// Bulk operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    #[default]
    Edit,
    Move,
    Transition,
}

/// State of a bulk edit or move across selected issues.
#[derive(Debug, Clone, Default)]
pub struct BulkEditBean {
    pub operation: BulkOperation,
    pub caller: Option<User>,
    pub selected_issues: Vec<Issue>,
    /// Layouts of the selected issues; one per distinct project/issue type.
    pub field_layouts: Vec<Arc<FieldLayout>>,
    /// Target project when moving.
    pub target_project: Option<Project>,
}

impl BulkEditBean {
    #[must_use]
    pub fn new(operation: BulkOperation, caller: Option<User>, issues: Vec<Issue>) -> Self {
        Self {
            operation,
            caller,
            selected_issues: issues,
            field_layouts: Vec::new(),
            target_project: None,
        }
    }

    #[must_use]
    pub fn with_layouts(mut self, layouts: Vec<Arc<FieldLayout>>) -> Self {
        self.field_layouts = layouts;
        self
    }

    /// Distinct projects of the selected issues, in first-seen order.
    #[must_use]
    pub fn projects(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = Vec::new();
        for issue in &self.selected_issues {
            if !projects.iter().any(|p| p.id == issue.project.id) {
                projects.push(&issue.project);
            }
        }
        projects
    }

    #[must_use]
    pub fn is_multiple_projects(&self) -> bool {
        self.projects().len() > 1
    }

    #[must_use]
    pub fn single_project(&self) -> Option<&Project> {
        let projects = self.projects();
        if projects.len() == 1 {
            Some(projects[0])
        } else {
            None
        }
    }

    /// Whether any layout of the selection hides the field. A bulk edit
    /// cannot set a value on an issue whose screen does not show it.
    #[must_use]
    pub fn is_hidden_in_any_layout(&self, field_id: &str) -> bool {
        self.field_layouts
            .iter()
            .any(|layout| layout.is_field_hidden(field_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueType;

    #[test]
    fn test_missing_item_defaults_to_visible_optional() {
        let layout = FieldLayout::new(Some(1), "Default")
            .with_item(FieldLayoutItem::new("environment").hidden());

        assert!(layout.is_field_hidden("environment"));
        assert!(!layout.is_field_hidden("summary"));
        let item = layout.item("summary");
        assert!(!item.required);
        assert_eq!(item.renderer(), DEFAULT_RENDERER);
    }

    #[test]
    fn test_bulk_bean_projects() {
        let hr = Project::new(1, "HR", "Human Resources");
        let mkt = Project::new(2, "MKT", "Marketing");
        let bug = IssueType::new("1", "Bug");
        let issues = vec![
            Issue::new(hr.clone(), bug.clone()),
            Issue::new(hr.clone(), bug.clone()),
        ];

        let bean = BulkEditBean::new(BulkOperation::Edit, None, issues);
        assert!(!bean.is_multiple_projects());
        assert_eq!(bean.single_project().map(|p| p.key.as_str()), Some("HR"));

        let mut bean = bean;
        bean.selected_issues.push(Issue::new(mkt, bug));
        assert!(bean.is_multiple_projects());
        assert!(bean.single_project().is_none());
    }

    #[test]
    fn test_hidden_in_any_layout() {
        let a = Arc::new(FieldLayout::new(Some(1), "A").with_item(FieldLayoutItem::new("components").hidden()));
        let b = Arc::new(FieldLayout::new(Some(2), "B"));

        let bean = BulkEditBean::default().with_layouts(vec![a.clone(), b.clone()]);
        assert!(bean.is_hidden_in_any_layout("components"));
        assert!(!bean.is_hidden_in_any_layout("summary"));

        let bean = BulkEditBean::default().with_layouts(vec![b]);
        assert!(!bean.is_hidden_in_any_layout("components"));
        assert!(!BulkEditBean::default().is_hidden_in_any_layout("components"));
    }
}
