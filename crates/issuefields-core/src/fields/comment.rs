//! Comments added, edited or removed alongside an issue operation.
//!
//! The comment never lives on the issue row: `update_issue` stashes the
//! submitted parameters as an external value and `update_value` calls the
//! comment service once the rest of the update has been committed.

use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::Result;
use crate::field::ids::COMMENT;
use crate::field::{Field, FieldTraits, OrderableField, RestAwareField, check_supported};
use crate::fields::common::{BULK_UNAVAILABLE_HIDDEN, BULK_UNAVAILABLE_PERMISSION, render};
use crate::fields::text::to_html;
use crate::custom::BULK_DIFFERENT_RENDERERS;
use crate::history::IssueChangeHolder;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, JsonType, StandardOperation};
use crate::services::{Comment, FieldServices, Permission};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{CommentAction, CommentParameters, CommentProperty, FieldValue, FieldValuesHolder, RequestParams, Visibility};

pub const COMMENT_LEVEL: &str = "commentLevel";
pub const COMMENT_ID: &str = "comment:id";
pub const COMMENT_PROPERTY: &str = "commentProperty";
pub const CREATE_COMMENT: &str = "comment:create";
pub const EDIT_COMMENT: &str = "comment:edit";
pub const REMOVE_COMMENT: &str = "comment:remove";

/// Parse the `commentProperty` JSON: an array of `{"key", "value"}` pairs
/// whose values are objects.
fn parse_properties(raw: &str) -> std::result::Result<Vec<CommentProperty>, String> {
    let properties: Vec<CommentProperty> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    match properties.iter().find(|p| !p.value.is_object()) {
        Some(bad) => Err(format!("value of property '{}' is not an object", bad.key)),
        None => Ok(properties),
    }
}

#[derive(Debug)]
pub struct CommentSystemField {
    services: FieldServices,
}

impl CommentSystemField {
    #[must_use]
    pub const fn new(services: FieldServices) -> Self {
        Self { services }
    }

    fn comment_json(comment: &Comment, rendered: bool) -> Value {
        let body = if rendered {
            to_html(&comment.body)
        } else {
            comment.body.clone()
        };
        let mut json = json!({
            "id": comment.id.to_string(),
            "author": comment.author,
            "body": body,
            "created": comment.created.to_rfc3339(),
            "updated": comment.updated.to_rfc3339(),
        });
        if comment.visibility != Visibility::Public {
            json["visibility"] = serde_json::to_value(&comment.visibility).unwrap_or(Value::Null);
        }
        json
    }

    fn comments_page(comments: &[Comment], rendered: bool) -> Value {
        json!({
            "comments": comments.iter().map(|c| Self::comment_json(c, rendered)).collect::<Vec<_>>(),
            "maxResults": comments.len(),
            "total": comments.len(),
            "startAt": 0,
        })
    }

    /// Parse `comment:id`, adding the matching error when it is missing or
    /// malformed.
    fn comment_id(params: &CommentParameters, errors: &mut ErrorCollection, i18n: &dyn I18nHelper) -> Option<i64> {
        let Some(raw) = params.comment_id.as_deref() else {
            errors.add_error(COMMENT, i18n.text("comment.service.error.no.comment.id", &[]));
            return None;
        };
        raw.trim().parse().map_or_else(
            |_| {
                errors.add_error(COMMENT, i18n.text("comment.service.error.invalid.comment.id", &[]));
                None
            },
            Some,
        )
    }

    fn validate_properties(params: &mut CommentParameters, errors: &mut ErrorCollection, i18n: &dyn I18nHelper) {
        let Some(raw) = params.raw_properties.as_deref() else {
            return;
        };
        match parse_properties(raw) {
            Ok(properties) => params.properties = properties,
            Err(reason) => {
                debug!(%reason, "Rejected comment properties");
                errors.add_error_message(i18n.text("jira.properties.service.invalid.json", &[raw]));
            }
        }
    }

    fn create_comment(&self, caller: Option<&User>, issue: &Issue, params: &CommentParameters, changes: &mut IssueChangeHolder) {
        match self.services.comments.create(caller, issue, params) {
            Ok(comment) => {
                debug!(issue = issue.display_key(), comment_id = comment.id, "Created comment");
                changes.set_comment(comment);
            }
            Err(e) => error!(issue = issue.display_key(), error = %e, "There was an error creating a comment"),
        }
    }

    fn edit_comment(&self, caller: Option<&User>, id: i64, params: &CommentParameters, changes: &mut IssueChangeHolder) {
        match self.services.comments.update(caller, id, params) {
            Ok(comment) => changes.set_comment(comment),
            Err(e) => error!(comment_id = id, error = %e, "Error updating comment"),
        }
    }

    fn remove_comment(&self, caller: Option<&User>, id: i64, changes: &mut IssueChangeHolder) {
        match self.services.comments.delete(caller, id) {
            Ok(comment) => changes.set_comment(comment),
            Err(e) => error!(comment_id = id, error = %e, "Error removing comment"),
        }
    }
}

impl Field for CommentSystemField {
    fn id(&self) -> &str {
        COMMENT
    }

    fn name_key(&self) -> &str {
        "issue.field.comment"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable().renderable().unscreenable()
    }

    fn as_orderable(&self) -> Option<&dyn OrderableField> {
        Some(self)
    }

    fn as_rest_aware(&self) -> Option<&dyn RestAwareField> {
        Some(self)
    }
}

impl OrderableField for CommentSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        let action = if params.contains(CREATE_COMMENT) {
            CommentAction::Create
        } else if params.contains(EDIT_COMMENT) {
            CommentAction::Edit
        } else if params.contains(REMOVE_COMMENT) {
            CommentAction::Remove
        } else {
            CommentAction::Implicit
        };
        FieldValue::Comment(CommentParameters {
            body: params.first(COMMENT).map(str::to_string),
            visibility: Visibility::parse(params.first(COMMENT_LEVEL)),
            action,
            comment_id: params.first(COMMENT_ID).map(str::to_string),
            raw_properties: params.first(COMMENT_PROPERTY).map(str::to_string),
            properties: Vec::new(),
        })
    }

    fn has_param(&self, params: &RequestParams) -> bool {
        params.contains(COMMENT) || params.contains(COMMENT_ID)
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(COMMENT, FieldValue::Comment(CommentParameters::default()));
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(COMMENT, FieldValue::Comment(CommentParameters::default()));
    }

    fn populate_for_move(&self, _holder: &mut FieldValuesHolder, _original: &Issue, _target: &Issue) {}

    fn populate_from_string(&self, holder: &mut FieldValuesHolder, value: &str, _issue: &Issue) -> Result<()> {
        holder.insert(COMMENT, FieldValue::Comment(CommentParameters::body(value)));
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
        let Some(mut params) = ctx.holder.comment(COMMENT).cloned() else {
            return;
        };
        let caller = ctx.caller.as_ref();
        let comments = self.services.comments.as_ref();
        match params.action {
            CommentAction::Remove => {
                if let Some(id) = Self::comment_id(&params, errors, i18n) {
                    comments.has_permission_to_delete(caller, id, errors);
                }
            }
            CommentAction::Edit => {
                let Some(id) = Self::comment_id(&params, errors, i18n) else {
                    return;
                };
                if !params.has_body() {
                    errors.add_error(COMMENT, i18n.text("comment.service.error.body.empty", &[]));
                }
                comments.has_permission_to_edit(caller, id, errors);
                comments.is_valid_visibility(caller, issue, &params.visibility, errors);
                Self::validate_properties(&mut params, errors, i18n);
            }
            CommentAction::Create | CommentAction::Implicit => {
                if params.has_body() {
                    comments.has_permission_to_create(caller, issue, errors);
                } else if params.action == CommentAction::Create {
                    errors.add_error(COMMENT, i18n.text("comment.service.error.body.empty", &[]));
                }
                comments.is_valid_visibility(caller, issue, &params.visibility, errors);
                Self::validate_properties(&mut params, errors, i18n);
            }
        }
        ctx.holder.insert(COMMENT, FieldValue::Comment(params));
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        Ok(holder
            .comment(COMMENT)
            .cloned()
            .map_or(IssueValue::Empty, IssueValue::Comment))
    }

    fn current_value(&self, _issue: &Issue) -> IssueValue {
        IssueValue::Empty
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
        let Some(params) = holder.comment(COMMENT) else {
            return Ok(());
        };
        let acts = params.has_body() || matches!(params.action, CommentAction::Edit | CommentAction::Remove);
        if acts {
            patch.set_external_field_value(COMMENT, IssueValue::Empty, IssueValue::Comment(params.clone()));
        }
        Ok(())
    }

    /// Failures here are logged and swallowed: the issue itself has already
    /// been updated.
    fn update_value(
        &self,
        caller: Option<&User>,
        _item: Option<&FieldLayoutItem>,
        issue: &Issue,
        modified: &ModifiedValue,
        changes: &mut IssueChangeHolder,
    ) -> Result<()> {
        let IssueValue::Comment(params) = &modified.new else {
            return Ok(());
        };
        let id = params.comment_id.as_deref().and_then(|id| id.trim().parse::<i64>().ok());
        match (params.action, id) {
            (CommentAction::Edit, Some(id)) => self.edit_comment(caller, id, params, changes),
            (CommentAction::Remove, Some(id)) => self.remove_comment(caller, id, changes),
            (CommentAction::Edit | CommentAction::Remove, None) => {
                error!(issue = issue.display_key(), "Comment update without a valid comment id");
            }
            (CommentAction::Create | CommentAction::Implicit, _) => {
                if params.has_body() {
                    self.create_comment(caller, issue, params, changes);
                }
            }
        }
        Ok(())
    }

    fn create_value(&self, caller: Option<&User>, issue: &Issue, value: &IssueValue) -> Result<()> {
        if let IssueValue::Comment(params) = value {
            if params.has_body() {
                self.create_comment(caller, issue, params, &mut IssueChangeHolder::new());
            }
        }
        Ok(())
    }

    /// Comments are not carried by the issue, so moves never see a value.
    fn has_value(&self, _issue: &Issue) -> bool {
        false
    }

    fn needs_move(&self, originals: &[Issue], _target: &Issue, target_item: &FieldLayoutItem) -> MessagedResult {
        if originals.len() <= 1 {
            return MessagedResult::no_input();
        }
        let target_renderer = target_item.renderer();
        let differs = originals.iter().any(|original| {
            self.services
                .layouts
                .field_layout(original.project.id, &original.issue_type.id)
                .renderer_type_for_field(COMMENT)
                != target_renderer
        });
        if differs {
            return MessagedResult::warning(self.services.i18n.text("comment.bulk.move.renderer.warning", &[]));
        }
        MessagedResult::no_input()
    }

    fn available_for_bulk_edit(&self, bean: &BulkEditBean) -> Option<&'static str> {
        let mut renderer: Option<String> = None;
        for layout in &bean.field_layouts {
            if layout.is_field_hidden(COMMENT) {
                return Some(BULK_UNAVAILABLE_HIDDEN);
            }
            let current = layout.renderer_type_for_field(COMMENT);
            match &renderer {
                None => renderer = Some(current),
                Some(first) if *first != current => return Some(BULK_DIFFERENT_RENDERERS),
                Some(_) => {}
            }
        }
        let caller = bean.caller.as_ref();
        bean.selected_issues
            .iter()
            .any(|issue| !self.is_shown(issue, caller))
            .then_some(BULK_UNAVAILABLE_PERMISSION)
    }

    fn is_shown(&self, issue: &Issue, caller: Option<&User>) -> bool {
        self.services
            .permissions
            .has_permission(Permission::CommentIssue, &issue.project, caller)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(COMMENT, &self.name(i18n), request);
        let renderer = request.layout_item.map(|item| item.renderer().to_string());
        params.insert("rendererType", renderer);
        match view {
            FieldView::View | FieldView::Column => {
                let comments = request
                    .issue
                    .id
                    .map(|id| self.services.comments.comments(id))
                    .unwrap_or_default();
                params.insert_serialized("comments", &comments);
            }
            FieldView::Create | FieldView::Edit | FieldView::BulkEdit => {
                let submitted = request.holder.and_then(|h| h.comment(COMMENT)).cloned().unwrap_or_default();
                params.insert("comment", submitted.body.clone());
                params.insert(COMMENT_LEVEL, submitted.visibility.to_level());
                params.insert(COMMENT_PROPERTY, submitted.raw_properties.clone());
                params.insert("groupLevelsAllowed", self.services.settings.comment_group_visibility);
                params.insert("roleLevelsAllowed", self.services.settings.comment_role_visibility);
            }
        }
        render(self.services.renderer.as_ref(), &format!("comment-{}.vm", view.suffix()), &params)
    }
}

impl RestAwareField for CommentSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system("comments-page", COMMENT)
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        let comments = issue.id.map(|id| self.services.comments.comments(id)).unwrap_or_default();
        let json = FieldJsonRepresentation::new(Self::comments_page(&comments, false));
        Some(if render {
            json.with_rendered(Self::comments_page(&comments, true))
        } else {
            json
        })
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Add, StandardOperation::Edit, StandardOperation::Remove]
    }

    fn apply_operations(
        &self,
        _issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        for op in check_supported(self, operations, errors) {
            let body = op.value.get("body").and_then(Value::as_str);
            let id = op.value.get("id").and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            if let Some(visibility) = op.value.get("visibility") {
                match serde_json::from_value::<Visibility>(visibility.clone()) {
                    Ok(v) => params.set(COMMENT_LEVEL, v.to_level().into_iter().collect()),
                    Err(e) => errors.add_error(COMMENT_LEVEL, format!("Invalid visibility: {e}")),
                }
            }
            match op.operation {
                StandardOperation::Add => {
                    params.set(COMMENT, body.map(str::to_string).into_iter().collect());
                    params.set(CREATE_COMMENT, vec!["true".to_string()]);
                }
                StandardOperation::Edit => {
                    params.set(COMMENT, body.map(str::to_string).into_iter().collect());
                    params.set(COMMENT_ID, id.into_iter().collect());
                    params.set(EDIT_COMMENT, vec!["true".to_string()]);
                }
                StandardOperation::Remove => {
                    params.set(COMMENT_ID, id.into_iter().collect());
                    params.set(REMOVE_COMMENT, vec!["true".to_string()]);
                }
                StandardOperation::Set => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::DefaultI18n;
    use crate::layout::{BulkOperation, FieldLayout, IssueOperation, WIKI_RENDERER};
    use crate::services::CommentService;
    use crate::testing;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn validate(services: FieldServices, params: &RequestParams, caller: &str) -> (ErrorCollection, FieldValuesHolder) {
        let field = CommentSystemField::new(services);
        let mut ctx = OperationContext::new(IssueOperation::Edit, Some(testing::user(caller)));
        field.populate_from_params(&mut ctx.holder, params);
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &testing::issue(), &FieldLayoutItem::new(COMMENT));
        (errors, ctx.holder)
    }

    #[test]
    fn test_relevant_params() {
        let field = CommentSystemField::new(testing::services());
        let params = RequestParams::new()
            .with(COMMENT, "Fixed on trunk")
            .with(COMMENT_LEVEL, "group:developers")
            .with(COMMENT_ID, "100")
            .with(EDIT_COMMENT, "true");

        let FieldValue::Comment(value) = field.relevant_params(&params) else {
            panic!("expected comment params");
        };
        assert_eq!(value.body.as_deref(), Some("Fixed on trunk"));
        assert_eq!(value.visibility, Visibility::Group("developers".into()));
        assert_eq!(value.action, CommentAction::Edit);
        assert_eq!(value.comment_id.as_deref(), Some("100"));
    }

    #[test]
    fn test_empty_implicit_comment_is_fine() {
        let (errors, _) = validate(testing::services(), &RequestParams::new().with(COMMENT, ""), "bob");
        assert!(!errors.has_any_errors());
    }

    #[test]
    fn test_explicit_create_needs_body() {
        let params = RequestParams::new().with(COMMENT, " ").with(CREATE_COMMENT, "true");
        let (errors, _) = validate(testing::services(), &params, "fred");
        assert_eq!(errors.error(COMMENT), Some("Comment body can not be empty!"));
    }

    #[test]
    fn test_create_needs_permission() {
        let (errors, _) = validate(testing::services(), &RequestParams::new().with(COMMENT, "Hello"), "bob");
        assert!(errors.has_any_errors());
    }

    #[test]
    fn test_visibility_checked() {
        let group = RequestParams::new().with(COMMENT, "Internal").with(COMMENT_LEVEL, "group:developers");
        assert!(!validate(testing::services(), &group, "fred").0.has_any_errors());

        let role = RequestParams::new().with(COMMENT, "Internal").with(COMMENT_LEVEL, "role:10002");
        let (errors, _) = validate(testing::services(), &role, "fred");
        assert!(errors.error(COMMENT_LEVEL).is_some());
    }

    #[test]
    fn test_remove_needs_valid_id() {
        let missing = RequestParams::new().with(REMOVE_COMMENT, "true");
        let (errors, _) = validate(testing::services(), &missing, "admin");
        assert_eq!(errors.error(COMMENT), Some("No comment id specified."));

        let garbage = RequestParams::new().with(REMOVE_COMMENT, "true").with(COMMENT_ID, "abc");
        let (errors, _) = validate(testing::services(), &garbage, "admin");
        assert_eq!(errors.error(COMMENT), Some("Invalid comment id specified."));
    }

    #[test]
    fn test_properties_parsed_during_validation() {
        let params = RequestParams::new()
            .with(COMMENT, "With metadata")
            .with(COMMENT_PROPERTY, r#"[{"key":"sd.public","value":{"internal":false}}]"#);
        let (errors, holder) = validate(testing::services(), &params, "fred");

        assert!(!errors.has_any_errors());
        let value = holder.comment(COMMENT).unwrap();
        assert_eq!(value.properties.len(), 1);
        assert_eq!(value.properties[0].key, "sd.public");

        let broken = RequestParams::new().with(COMMENT, "x").with(COMMENT_PROPERTY, "[{");
        let (errors, _) = validate(testing::services(), &broken, "fred");
        assert_eq!(errors.error_messages().len(), 1);
    }

    #[test]
    fn test_update_value_creates_comment() {
        let site = testing::site();
        let field = CommentSystemField::new(site.services());
        let fred = testing::user("fred");
        let modified = ModifiedValue::new(IssueValue::Empty, IssueValue::Comment(CommentParameters::body("Reproduced")));
        let mut changes = IssueChangeHolder::new();

        field
            .update_value(Some(&fred), None, &testing::issue(), &modified, &mut changes)
            .unwrap();

        assert_eq!(changes.comment.as_ref().map(|c| c.body.as_str()), Some("Reproduced"));
        assert_eq!(site.comments(1).len(), 2);
    }

    #[test]
    fn test_update_value_swallows_failures() {
        let field = CommentSystemField::new(testing::services());
        let unsaved = Issue::new(testing::hr(), testing::issue().issue_type);
        let modified = ModifiedValue::new(IssueValue::Empty, IssueValue::Comment(CommentParameters::body("Lost")));
        let mut changes = IssueChangeHolder::new();

        assert!(field.update_value(None, None, &unsaved, &modified, &mut changes).is_ok());
        assert!(changes.comment.is_none());
    }

    #[test]
    fn test_edit_and_remove() {
        let site = testing::site();
        let field = CommentSystemField::new(site.services());
        let admin = testing::user("admin");
        let edit = CommentParameters::body("Seen on production too.")
            .with_action(CommentAction::Edit)
            .with_comment_id("100");
        let mut changes = IssueChangeHolder::new();
        field
            .update_value(Some(&admin), None, &testing::issue(), &ModifiedValue::new(IssueValue::Empty, IssueValue::Comment(edit)), &mut changes)
            .unwrap();
        assert_eq!(site.comments(1)[0].body, "Seen on production too.");

        let remove = CommentParameters::default()
            .with_action(CommentAction::Remove)
            .with_comment_id("100");
        field
            .update_value(Some(&admin), None, &testing::issue(), &ModifiedValue::new(IssueValue::Empty, IssueValue::Comment(remove)), &mut changes)
            .unwrap();
        assert!(site.comments(1).is_empty());
    }

    #[test]
    fn test_update_issue_skips_blank_comments() {
        let field = CommentSystemField::new(testing::services());
        let mut patch = IssuePatch::new(testing::issue());
        let mut holder = FieldValuesHolder::new();
        field.populate_defaults(&mut holder, &testing::issue());
        field.update_issue(None, &mut patch, &mut holder).unwrap();
        assert!(patch.modified(COMMENT).is_none());

        field.populate_from_string(&mut holder, "Imported note", &testing::issue()).unwrap();
        field.update_issue(None, &mut patch, &mut holder).unwrap();
        assert!(patch.modified(COMMENT).is_some());
    }

    #[test]
    fn test_bulk_edit_renderers() {
        let field = CommentSystemField::new(testing::services());
        let fred = Some(testing::user("fred"));
        let mixed = BulkEditBean::new(BulkOperation::Edit, fred.clone(), vec![testing::issue()]).with_layouts(vec![
            Arc::new(FieldLayout::new(None, "Default")),
            Arc::new(FieldLayout::new(Some(1), "Wiki").with_item(FieldLayoutItem::new(COMMENT).with_renderer(WIKI_RENDERER))),
        ]);
        assert_eq!(field.available_for_bulk_edit(&mixed), Some(BULK_DIFFERENT_RENDERERS));

        let plain = BulkEditBean::new(BulkOperation::Edit, fred, vec![testing::issue()]);
        assert_eq!(field.available_for_bulk_edit(&plain), None);

        let visitor = BulkEditBean::new(BulkOperation::Edit, Some(testing::user("bob")), vec![testing::issue()]);
        assert_eq!(field.available_for_bulk_edit(&visitor), Some(BULK_UNAVAILABLE_PERMISSION));
    }

    #[test]
    fn test_bulk_move_warns_on_renderer_change() {
        let field = CommentSystemField::new(testing::services());
        let originals = vec![testing::issue(), testing::stored("HR-2")];
        let wiki = FieldLayoutItem::new(COMMENT).with_renderer(WIKI_RENDERER);

        let result = field.needs_move(&originals, &testing::stored("MKT-1"), &wiki);
        assert!(!result.needs_input);
        assert!(result.message.is_some());
        assert!(field.needs_move(&originals[..1], &testing::stored("MKT-1"), &wiki).message.is_none());
    }

    #[test]
    fn test_rest_json_and_operations() {
        let field = CommentSystemField::new(testing::services());
        let json = field.json_from_issue(&testing::issue(), true, None).unwrap();
        assert_eq!(json.standard["total"], 1);
        assert_eq!(json.standard["comments"][0]["body"], "Seen on staging as well.");
        assert_eq!(json.rendered.unwrap()["comments"][0]["body"], "<p>Seen on staging as well.</p>");

        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        let ops = [FieldOperation::new(
            StandardOperation::Add,
            json!({"body": "From REST", "visibility": {"type": "group", "value": "developers"}}),
        )];
        field.apply_operations(&testing::issue(), &ops, &mut params, &mut errors);
        assert!(!errors.has_any_errors());
        assert_eq!(params.first(COMMENT), Some("From REST"));
        assert_eq!(params.first(COMMENT_LEVEL), Some("group:developers"));
        assert!(params.flag(CREATE_COMMENT));
    }
}
