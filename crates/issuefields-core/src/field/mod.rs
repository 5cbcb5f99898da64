//! The field contract.
//!
//! Every field implements [`Field`]. Optional capabilities are exposed
//! through typed accessors (`as_orderable`, `as_navigable`,
//! `as_rest_aware`) rather than downcasting: a field that can appear on
//! screens returns `Some(self)` from `as_orderable`, and so on.

pub mod ids;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{FieldError, Result};
use crate::history::IssueChangeHolder;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, Project, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest};
use crate::rest::{FieldJsonRepresentation, FieldOperation, FieldTypeInfo, JsonType, StandardOperation};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{FieldValue, FieldValuesHolder, RequestParams};

/// Static capability flags of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTraits {
    /// Can be hidden in a field layout.
    pub hideable: bool,
    /// Can be made required in a field layout.
    pub requirable: bool,
    /// Text content goes through a configurable renderer.
    pub renderable: bool,
    pub searchable: bool,
    /// Always present on create screens.
    pub mandatory: bool,
    /// Must not be placed on screens.
    pub unscreenable: bool,
}

impl FieldTraits {
    #[must_use]
    pub const fn hideable_requirable() -> Self {
        Self {
            hideable: true,
            requirable: true,
            renderable: false,
            searchable: true,
            mandatory: false,
            unscreenable: false,
        }
    }

    #[must_use]
    pub const fn renderable(mut self) -> Self {
        self.renderable = true;
        self
    }

    #[must_use]
    pub const fn not_searchable(mut self) -> Self {
        self.searchable = false;
        self
    }

    #[must_use]
    pub const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self.hideable = false;
        self
    }

    #[must_use]
    pub const fn unscreenable(mut self) -> Self {
        self.unscreenable = true;
        self
    }

    #[must_use]
    pub const fn not_hideable(mut self) -> Self {
        self.hideable = false;
        self
    }
}

/// Sort direction for navigator columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Identity and capabilities shared by every field.
pub trait Field: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Message key of the field's display name.
    fn name_key(&self) -> &str;

    fn name(&self, i18n: &dyn I18nHelper) -> String {
        i18n.text(self.name_key(), &[])
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::default()
    }

    fn is_custom(&self) -> bool {
        false
    }

    fn as_orderable(&self) -> Option<&dyn OrderableField> {
        None
    }

    fn as_navigable(&self) -> Option<&dyn NavigableField> {
        None
    }

    fn as_rest_aware(&self) -> Option<&dyn RestAwareField> {
        None
    }
}

/// A field that can be shown as an issue navigator column.
pub trait NavigableField: Field {
    fn column_heading_key(&self) -> &str {
        self.name_key()
    }

    fn default_sort_order(&self) -> Option<SortOrder> {
        None
    }

    /// Plain-text column value for an issue.
    fn column_value(&self, issue: &Issue) -> Option<String>;
}

/// A field that can be placed on screens: it renders, validates and
/// updates issues.
///
/// Lifecycle per operation: `populate_*` seeds the holder,
/// `validate_params` checks and may normalize it, `update_issue` records
/// deltas on the patch, and after commit `update_value` / `create_value`
/// write history and call collaborators.
pub trait OrderableField: Field {
    /// Extract this field's entry from raw request parameters.
    fn relevant_params(&self, params: &RequestParams) -> FieldValue;

    fn has_param(&self, params: &RequestParams) -> bool {
        params.contains(self.id())
    }

    fn populate_from_params(&self, holder: &mut FieldValuesHolder, params: &RequestParams) {
        holder.insert(self.id(), self.relevant_params(params));
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue);

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, issue: &Issue);

    /// Seed the holder for moving `original` into `target`'s context.
    fn populate_for_move(&self, holder: &mut FieldValuesHolder, original: &Issue, _target: &Issue) {
        self.populate_from_issue(holder, original);
    }

    /// Import-style population from a single string.
    ///
    /// # Errors
    /// Returns [`FieldError::FieldValidation`] when the string cannot be
    /// mapped onto the field.
    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        let params = RequestParams::new().with(self.id(), value);
        holder.insert(self.id(), self.relevant_params(&params));
        Ok(())
    }

    /// Check this field's holder entry. Adds errors rather than failing and
    /// never modifies the issue; may write a normalized entry back into
    /// `ctx.holder`.
    fn validate_params(
        &self,
        ctx: &mut OperationContext,
        errors: &mut ErrorCollection,
        i18n: &dyn I18nHelper,
        issue: &Issue,
        item: &FieldLayoutItem,
    );

    /// Convert the holder entry to the field's issue value.
    ///
    /// # Errors
    /// Returns an error if the entry cannot be converted.
    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue>;

    /// The field's current value on an issue, in the same shape as
    /// [`OrderableField::value_from_params`] returns.
    fn current_value(&self, issue: &Issue) -> IssueValue;

    fn default_value(&self, issue: &Issue) -> IssueValue;

    /// Record this field's delta on the patch.
    ///
    /// # Errors
    /// Returns an error if a collaborator fails while resolving the value.
    fn update_issue(
        &self,
        item: Option<&FieldLayoutItem>,
        patch: &mut IssuePatch,
        holder: &mut FieldValuesHolder,
    ) -> Result<()>;

    /// Write change history and run side effects for a committed delta.
    ///
    /// # Errors
    /// Returns an error if a required collaborator call fails.
    fn update_value(
        &self,
        caller: Option<&User>,
        item: Option<&FieldLayoutItem>,
        issue: &Issue,
        modified: &ModifiedValue,
        changes: &mut IssueChangeHolder,
    ) -> Result<()>;

    /// Persist the value of a newly created issue.
    ///
    /// # Errors
    /// Returns an error if a required collaborator call fails.
    fn create_value(&self, _caller: Option<&User>, _issue: &Issue, _value: &IssueValue) -> Result<()> {
        Ok(())
    }

    fn has_value(&self, issue: &Issue) -> bool;

    fn can_remove_value_from_issue_object(&self, _issue: &Issue) -> bool {
        false
    }

    /// # Errors
    /// Returns [`FieldError::UnsupportedOperation`] unless the field can be
    /// cleared.
    fn remove_value_from_issue_object(&self, _patch: &mut IssuePatch) -> Result<()> {
        Err(FieldError::unsupported(self.id(), "remove value"))
    }

    fn needs_move(&self, originals: &[Issue], target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult;

    /// `None` if the field can be bulk edited, otherwise a message key.
    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str>;

    fn is_shown(&self, _issue: &Issue, _caller: Option<&User>) -> bool {
        true
    }

    /// # Errors
    /// Returns [`FieldError::UnsupportedOperation`] for views the field does
    /// not offer, or a template error.
    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String>;
}

/// A field that can be read and written through the REST API.
pub trait RestAwareField: Field {
    fn json_schema(&self) -> JsonType;

    fn field_type_info(&self, _project: &Project, _issue: Option<&Issue>) -> FieldTypeInfo {
        FieldTypeInfo::default()
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        render: bool,
        item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation>;

    fn json_default_value(&self, _issue: &Issue) -> Option<Value> {
        None
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[]
    }

    /// Translate REST operations into request parameters for the normal
    /// field lifecycle.
    fn apply_operations(
        &self,
        _issue: &Issue,
        operations: &[FieldOperation],
        _params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        for op in operations {
            errors.add_error(
                self.id(),
                format!("Field '{}' does not support operation '{}'", self.id(), op.operation.as_str()),
            );
        }
    }
}

/// Reject operations the field does not list as supported; returns the
/// ones that remain.
pub fn check_supported<'a>(
    field: &dyn RestAwareField,
    operations: &'a [FieldOperation],
    errors: &mut ErrorCollection,
) -> Vec<&'a FieldOperation> {
    let supported = field.supported_operations();
    operations
        .iter()
        .filter(|op| {
            let ok = supported.contains(&op.operation);
            if !ok {
                errors.add_error(
                    field.id(),
                    format!("Field '{}' does not support operation '{}'", field.id(), op.operation.as_str()),
                );
            }
            ok
        })
        .collect()
}
