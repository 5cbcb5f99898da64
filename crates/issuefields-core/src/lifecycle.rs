//! Running create and edit operations through the field lifecycle.
//!
//! An operation has two phases. `validate_*` seeds a values holder for the
//! fields taking part, lets each of them validate, and returns either every
//! error found or a [`ValidatedOperation`]. [`IssueOperationRunner::apply`]
//! then records each field's delta on one patch, stores the issue and only
//! afterwards runs the per-field side effects (history, comments, work
//! logs, links).

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{FieldError, Result};
use crate::field::Field;
use crate::field::ids::{IS_CREATE_ISSUE, IS_EDIT_ISSUE, ISSUE_TYPE};
use crate::history::{ChangeGroup, IssueChangeHolder};
use crate::issue::{Issue, Project, User};
use crate::layout::{BulkEditBean, IssueOperation, OperationContext};
use crate::manager::FieldManager;
use crate::patch::IssuePatch;
use crate::rest::FieldOperation;
use crate::services::Permission;
use crate::validation::{ErrorCollection, MessagedResult, Reason};
use crate::values::{FieldValuesHolder, RequestParams};

/// An operation that passed validation and can be applied.
#[derive(Debug, Clone)]
pub struct ValidatedOperation {
    operation: IssueOperation,
    caller: Option<User>,
    issue: Issue,
    holder: FieldValuesHolder,
    field_ids: Vec<String>,
}

impl ValidatedOperation {
    #[must_use]
    pub const fn issue(&self) -> &Issue {
        &self.issue
    }

    #[must_use]
    pub const fn holder(&self) -> &FieldValuesHolder {
        &self.holder
    }

    /// Ids of the fields taking part, in canonical order.
    #[must_use]
    pub fn field_ids(&self) -> &[String] {
        &self.field_ids
    }
}

/// Result of an applied operation.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub issue: Issue,
    pub changes: IssueChangeHolder,
    /// History entry for edits that changed something; creates have none.
    pub change_group: Option<ChangeGroup>,
}

/// Bulk edit verdict for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFieldStatus {
    pub field_id: String,
    pub name: String,
    /// Message key explaining why the field cannot be bulk edited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<&'static str>,
}

/// Needs-move verdict for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveFieldStatus {
    pub field_id: String,
    pub name: String,
    pub result: MessagedResult,
}

/// Drives fields through validate, update and commit.
#[derive(Debug, Clone)]
pub struct IssueOperationRunner {
    manager: Arc<FieldManager>,
}

impl IssueOperationRunner {
    #[must_use]
    pub const fn new(manager: Arc<FieldManager>) -> Self {
        Self { manager }
    }

    #[must_use]
    pub fn manager(&self) -> &FieldManager {
        &self.manager
    }

    /// Validate an edit. Only fields with submitted parameters take part;
    /// every other field keeps its value.
    ///
    /// # Errors
    /// Returns every validation error found across the submitted fields.
    pub fn validate_update(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        params: &RequestParams,
    ) -> std::result::Result<ValidatedOperation, ErrorCollection> {
        self.validate_existing(IssueOperation::Edit, caller, issue, params)
    }

    /// Validate a workflow transition screen. Behaves like an edit, with
    /// the transition's resolution restrictions visible to the fields.
    ///
    /// # Errors
    /// Returns every validation error found across the submitted fields.
    pub fn validate_transition(
        &self,
        caller: Option<&User>,
        issue: &Issue,
        params: &RequestParams,
        include_resolutions: Vec<String>,
        exclude_resolutions: Vec<String>,
    ) -> std::result::Result<ValidatedOperation, ErrorCollection> {
        let operation = IssueOperation::Transition {
            include_resolutions,
            exclude_resolutions,
        };
        self.validate_existing(operation, caller, issue, params)
    }

    fn validate_existing(
        &self,
        operation: IssueOperation,
        caller: Option<&User>,
        issue: &Issue,
        params: &RequestParams,
    ) -> std::result::Result<ValidatedOperation, ErrorCollection> {
        let mut params = params.clone();
        if operation.is_edit() {
            self.check_permission(Permission::EditIssue, &issue.project, caller, "editissue.error.no.permission")?;
            params.set(IS_EDIT_ISSUE, vec!["true".to_string()]);
        }
        let mut ctx = OperationContext::new(operation, caller.cloned());
        let mut field_ids = Vec::new();
        let screen = self.manager.screen_fields(issue, caller);
        for field in &screen {
            let Some(orderable) = field.as_orderable() else {
                continue;
            };
            orderable.populate_from_issue(&mut ctx.holder, issue);
            if orderable.has_param(&params) {
                orderable.populate_from_params(&mut ctx.holder, &params);
                field_ids.push(field.id().to_string());
            }
        }

        let mut errors = ErrorCollection::new();
        for field in self.manager.orderable_fields() {
            let id = field.id();
            let off_screen = !screen.iter().any(|f| f.id() == id);
            if off_screen && field.as_orderable().is_some_and(|o| o.has_param(&params)) {
                errors.add_error(
                    id.to_string(),
                    format!("Field '{id}' cannot be set. It is not on the appropriate screen, or unknown."),
                );
            }
        }
        self.validate_fields(ctx, issue.clone(), field_ids, errors)
    }

    /// Validate creating an issue in `project`. The issue type comes from
    /// the `issuetype` parameter, falling back to the project's first type.
    /// Every field on the create screen takes part: submitted values
    /// override the field's default, the rest keep it.
    ///
    /// # Errors
    /// Returns every validation error found.
    pub fn validate_create(
        &self,
        caller: Option<&User>,
        project: &Project,
        params: &RequestParams,
    ) -> std::result::Result<ValidatedOperation, ErrorCollection> {
        self.check_permission(Permission::CreateIssue, project, caller, "createissue.error.no.permission")?;
        let services = self.manager.services();
        let types = services.constants.issue_types_for_project(project.id);
        let issue_type = params
            .first(ISSUE_TYPE)
            .and_then(|id| types.iter().find(|t| t.id == id.trim()))
            .or_else(|| types.first())
            .cloned();
        let Some(issue_type) = issue_type else {
            let mut errors = ErrorCollection::new();
            errors.add_error(ISSUE_TYPE, services.i18n.text("createissue.noissuetype", &[]));
            return Err(errors);
        };
        let issue = Issue::new(project.clone(), issue_type);

        let params = params.clone().with(IS_CREATE_ISSUE, "true");
        let mut ctx = OperationContext::new(IssueOperation::Create, caller.cloned());
        let mut field_ids = Vec::new();
        for field in self.manager.screen_fields(&issue, caller) {
            let Some(orderable) = field.as_orderable() else {
                continue;
            };
            orderable.populate_defaults(&mut ctx.holder, &issue);
            if orderable.has_param(&params) {
                orderable.populate_from_params(&mut ctx.holder, &params);
            }
            field_ids.push(field.id().to_string());
        }
        self.validate_fields(ctx, issue, field_ids, ErrorCollection::new())
    }

    fn check_permission(
        &self,
        permission: Permission,
        project: &Project,
        caller: Option<&User>,
        message_key: &str,
    ) -> std::result::Result<(), ErrorCollection> {
        let services = self.manager.services();
        if services.permissions.has_permission(permission, project, caller) {
            return Ok(());
        }
        let mut errors = ErrorCollection::new();
        errors.add_error_message(services.i18n.text(message_key, &[]));
        errors.add_reason(Reason::Forbidden);
        Err(errors)
    }

    fn validate_fields(
        &self,
        mut ctx: OperationContext,
        issue: Issue,
        field_ids: Vec<String>,
        mut errors: ErrorCollection,
    ) -> std::result::Result<ValidatedOperation, ErrorCollection> {
        let i18n = self.manager.services().i18n.clone();
        let layout = self.manager.field_layout(&issue);
        for id in &field_ids {
            let Some(field) = self.manager.field(id) else {
                continue;
            };
            if let Some(orderable) = field.as_orderable() {
                orderable.validate_params(&mut ctx, &mut errors, i18n.as_ref(), &issue, &layout.item(id));
            }
        }
        if errors.has_any_errors() {
            debug!(issue = issue.display_key(), errors = %errors, "Validation failed");
            if errors.reasons().is_empty() {
                errors.add_reason(Reason::ValidationFailed);
            }
            return Err(errors);
        }
        debug!(issue = issue.display_key(), fields = field_ids.len(), "Validated operation");
        Ok(ValidatedOperation {
            operation: ctx.operation,
            caller: ctx.caller,
            issue,
            holder: ctx.holder,
            field_ids,
        })
    }

    /// Apply a validated operation: patch, store, then side effects.
    ///
    /// # Errors
    /// Returns an error if a field cannot resolve its value or the issue
    /// cannot be stored. Side effects that fail after the store are logged
    /// by the fields themselves.
    pub fn apply(&self, validated: ValidatedOperation) -> Result<OperationOutcome> {
        let ValidatedOperation {
            operation,
            caller,
            issue,
            mut holder,
            field_ids,
        } = validated;
        let caller = caller.as_ref();
        let layout = self.manager.field_layout(&issue);
        let fields: Vec<Arc<dyn Field>> = field_ids
            .iter()
            .map(|id| self.manager.field(id).ok_or_else(|| FieldError::UnknownField(id.clone())))
            .collect::<Result<_>>()?;

        let mut patch = IssuePatch::new(issue);
        for field in &fields {
            if let Some(orderable) = field.as_orderable() {
                orderable.update_issue(Some(&layout.item(field.id())), &mut patch, &mut holder)?;
            }
        }
        let (patched, modified) = patch.commit();
        let stored = self.manager.services().issues.store(patched)?;

        let mut changes = IssueChangeHolder::new();
        if operation.is_create() {
            for (id, value) in &modified {
                if let Some(orderable) = self.manager.orderable_field(id).as_deref().and_then(Field::as_orderable) {
                    orderable.create_value(caller, &stored, &value.new)?;
                }
            }
            info!(issue = stored.display_key(), "Created issue");
            return Ok(OperationOutcome {
                issue: stored,
                changes,
                change_group: None,
            });
        }

        for (id, value) in &modified {
            let Some(field) = self.manager.orderable_field(id) else {
                continue;
            };
            if let Some(orderable) = field.as_orderable() {
                orderable.update_value(caller, Some(&layout.item(id)), &stored, value, &mut changes)?;
            }
        }
        let change_group = (!changes.is_empty()).then(|| {
            ChangeGroup::new(stored.display_key(), caller.map(|u| u.name.clone()), &changes)
        });
        info!(
            issue = stored.display_key(),
            fields = modified.len(),
            items = changes.items.len(),
            "Updated issue"
        );
        Ok(OperationOutcome {
            issue: stored,
            changes,
            change_group,
        })
    }

    /// Translate a REST body (`{"fields": {...}, "update": {...}}`) into
    /// request parameters. `fields` entries are shorthand for a single
    /// `set`.
    ///
    /// # Errors
    /// Returns the errors for unknown fields, malformed operation lists
    /// and operations the fields reject.
    pub fn rest_params(&self, issue: &Issue, body: &Value) -> std::result::Result<RequestParams, ErrorCollection> {
        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        if let Some(fields) = body.get("fields").and_then(Value::as_object) {
            for (id, value) in fields {
                self.apply_rest(issue, id, &[FieldOperation::set(value.clone())], &mut params, &mut errors);
            }
        }
        if let Some(update) = body.get("update").and_then(Value::as_object) {
            for (id, list) in update {
                match FieldOperation::parse_list(list) {
                    Ok(operations) => self.apply_rest(issue, id, &operations, &mut params, &mut errors),
                    Err(e) => errors.add_error(id.clone(), e.to_string()),
                }
            }
        }
        if errors.has_any_errors() {
            errors.add_reason(Reason::ValidationFailed);
            return Err(errors);
        }
        Ok(params)
    }

    fn apply_rest(
        &self,
        issue: &Issue,
        id: &str,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        let rest = self.manager.field(id);
        match rest.as_deref().and_then(Field::as_rest_aware) {
            Some(field) => field.apply_operations(issue, operations, params, errors),
            None => errors.add_error(
                id.to_string(),
                format!("Field '{id}' cannot be set. It is not on the appropriate screen, or unknown."),
            ),
        }
    }

    /// Which orderable fields the selection can be bulk edited with.
    #[must_use]
    pub fn bulk_edit_fields(&self, bean: &BulkEditBean) -> Vec<BulkFieldStatus> {
        let i18n = self.manager.services().i18n.clone();
        let unavailable = self.manager.unavailable_fields();
        self.manager
            .orderable_fields()
            .into_iter()
            .filter(|f| !unavailable.contains(f.id()))
            .filter_map(|field| {
                let orderable = field.as_orderable()?;
                Some(BulkFieldStatus {
                    field_id: field.id().to_string(),
                    name: field.name(i18n.as_ref()),
                    unavailable: orderable.available_for_bulk_edit(bean),
                })
            })
            .collect()
    }

    /// Fields that need attention when moving `originals` into `target`'s
    /// project and issue type: those needing input and those with warnings.
    #[must_use]
    pub fn move_fields(&self, originals: &[Issue], target: &Issue) -> Vec<MoveFieldStatus> {
        let i18n = self.manager.services().i18n.clone();
        let layout = self.manager.field_layout(target);
        let unavailable = self.manager.unavailable_fields();
        self.manager
            .orderable_fields()
            .into_iter()
            .filter(|f| !unavailable.contains(f.id()) && !layout.is_field_hidden(f.id()))
            .filter(|f| {
                self.manager
                    .custom_field(f.id())
                    .is_none_or(|c| c.is_in_scope(target.project.id, &target.issue_type.id))
            })
            .filter_map(|field| {
                let orderable = field.as_orderable()?;
                let result = orderable.needs_move(originals, target, &layout.item(field.id()));
                (result.needs_input || result.message.is_some()).then(|| MoveFieldStatus {
                    field_id: field.id().to_string(),
                    name: field.name(i18n.as_ref()),
                    result,
                })
            })
            .collect()
    }
}
