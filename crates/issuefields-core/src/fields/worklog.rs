//! Logging work while creating, editing or transitioning an issue.
//!
//! Work is only validated when the user activated the log-work section;
//! the validated result rides along as an external patch value and the
//! entry is created after the issue update commits.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::{FieldError, Result};
use crate::field::ids::{COMMENT, IS_CREATE_ISSUE, IS_EDIT_ISSUE, TIMETRACKING, WORKLOG};
use crate::field::{Field, FieldTraits, OrderableField, RestAwareField, check_supported};
use crate::fields::comment::COMMENT_LEVEL;
use crate::fields::common::{BULK_UNAVAILABLE, render};
use crate::fields::time_tracking::{LOG_WORK_ACTIVATE, REMAINING_ESTIMATE, TimeTrackingQuery};
use crate::history::IssueChangeHolder;
use crate::i18n::I18nHelper;
use crate::issue::{Issue, User};
use crate::layout::{BulkEditBean, FieldLayoutItem, OperationContext};
use crate::patch::{IssuePatch, IssueValue, ModifiedValue};
use crate::render::{FieldView, RenderRequest, TemplateParams};
use crate::rest::{FieldJsonRepresentation, FieldOperation, JsonType, StandardOperation};
use crate::services::{FieldServices, Permission, Worklog, WorklogInput};
use crate::validation::{ErrorCollection, MessagedResult};
use crate::values::{AdjustEstimate, FieldValue, FieldValuesHolder, RequestParams, Visibility, WorklogValue};

/// Prefix shared by every work log parameter; service errors are keyed
/// with it so they land on the form inputs.
pub const PREFIX: &str = "worklog_";
pub const WORKLOG_ACTIVATE: &str = LOG_WORK_ACTIVATE;
pub const WORKLOG_TIME_LOGGED: &str = "worklog_timeLogged";
pub const WORKLOG_START_DATE: &str = "worklog_startDate";
pub const WORKLOG_ADJUST_ESTIMATE: &str = "worklog_adjustEstimate";
pub const WORKLOG_NEW_ESTIMATE: &str = "worklog_newEstimate";
pub const WORKLOG_ADJUSTMENT_AMOUNT: &str = "worklog_adjustmentAmount";
pub const WORKLOG_DESCRIPTION: &str = "worklog_description";
pub const WORKLOG_VISIBILITY_LEVEL: &str = "worklog_visibilityLevel";
pub const WORKLOG_ID: &str = "worklog_id";

const START_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Parse a work start date: RFC 3339, `YYYY-MM-DD HH:MM` or a bare date
/// (midnight UTC). Blank means "now".
pub fn parse_start_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Some(Utc::now());
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    START_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

#[derive(Debug)]
pub struct WorklogSystemField {
    services: FieldServices,
    time_tracking: Arc<dyn TimeTrackingQuery>,
}

impl WorklogSystemField {
    #[must_use]
    pub fn new(services: FieldServices, time_tracking: Arc<dyn TimeTrackingQuery>) -> Self {
        Self { services, time_tracking }
    }

    fn worklog_json(&self, worklog: &Worklog) -> Value {
        json!({
            "id": worklog.id.to_string(),
            "author": worklog.author,
            "comment": worklog.comment,
            "started": worklog.start_date.to_rfc3339(),
            "timeSpent": self.services.durations().short_format(worklog.time_spent),
            "timeSpentSeconds": worklog.time_spent / 1000,
        })
    }

    fn input(value: &WorklogValue, start_date: Option<DateTime<Utc>>) -> WorklogInput {
        WorklogInput {
            worklog_id: value.worklog_id.as_deref().and_then(|id| id.trim().parse().ok()),
            time_spent: value.time_logged.clone(),
            start_date,
            comment: value.comment.clone(),
            visibility: value.visibility.clone(),
            error_field_prefix: PREFIX.to_string(),
        }
    }

    fn create_worklog(&self, caller: Option<&User>, issue: &Issue, value: &WorklogValue) {
        let Some(result) = &value.result else {
            return;
        };
        match self.services.worklogs.create(caller, issue, result) {
            Ok(worklog) => debug!(
                issue = issue.display_key(),
                worklog_id = worklog.id,
                mode = value.adjust_estimate.as_str(),
                "Created work log"
            ),
            Err(e) => error!(issue = issue.display_key(), error = %e, "Could not create work log"),
        }
    }
}

impl Field for WorklogSystemField {
    fn id(&self) -> &str {
        WORKLOG
    }

    fn name_key(&self) -> &str {
        "issue.field.worklog"
    }

    fn traits(&self) -> FieldTraits {
        FieldTraits::hideable_requirable().renderable().not_searchable()
    }

    fn as_orderable(&self) -> Option<&dyn OrderableField> {
        Some(self)
    }

    fn as_rest_aware(&self) -> Option<&dyn RestAwareField> {
        Some(self)
    }
}

impl OrderableField for WorklogSystemField {
    fn relevant_params(&self, params: &RequestParams) -> FieldValue {
        let create_issue = params.flag(IS_CREATE_ISSUE);
        let copy_comment = create_issue || self.services.settings.copy_comment_to_work_description;
        let pick = |specific: &str, fallback: &str| {
            params
                .first(specific)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| if copy_comment { params.first(fallback) } else { None })
                .map(str::to_string)
        };
        let level = pick(WORKLOG_VISIBILITY_LEVEL, COMMENT_LEVEL);
        FieldValue::Worklog(WorklogValue {
            activated: params.flag(WORKLOG_ACTIVATE),
            create_issue,
            edit_issue: params.flag(IS_EDIT_ISSUE),
            worklog_id: params.first(WORKLOG_ID).map(str::to_string),
            time_logged: params.first(WORKLOG_TIME_LOGGED).map(str::to_string),
            start_date: params.first(WORKLOG_START_DATE).map(str::to_string),
            adjust_estimate: AdjustEstimate::parse(params.first(WORKLOG_ADJUST_ESTIMATE)),
            new_estimate: params.first(WORKLOG_NEW_ESTIMATE).map(str::to_string),
            adjustment_amount: params.first(WORKLOG_ADJUSTMENT_AMOUNT).map(str::to_string),
            comment: pick(WORKLOG_DESCRIPTION, COMMENT),
            visibility: Visibility::parse(level.as_deref()),
            result: None,
        })
    }

    fn has_param(&self, params: &RequestParams) -> bool {
        params.with_prefix(PREFIX).next().is_some()
    }

    fn populate_from_issue(&self, holder: &mut FieldValuesHolder, issue: &Issue) {
        self.populate_defaults(holder, issue);
    }

    fn populate_defaults(&self, holder: &mut FieldValuesHolder, _issue: &Issue) {
        holder.insert(WORKLOG, FieldValue::Worklog(WorklogValue::default()));
    }

    fn populate_for_move(&self, _holder: &mut FieldValuesHolder, _original: &Issue, _target: &Issue) {}

    fn populate_from_string(&self, _holder: &mut FieldValuesHolder, _value: &str, _issue: &Issue) -> Result<()> {
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
        let Some(mut value) = ctx.holder.worklog(WORKLOG).cloned() else {
            return;
        };
        if !value.activated {
            ctx.holder.insert(
                WORKLOG,
                FieldValue::Worklog(WorklogValue::inactive(value.create_issue, value.edit_issue)),
            );
            return;
        }
        if !item.required && !value.is_set() {
            return;
        }

        let start_date = parse_start_date(value.start_date.as_deref());
        if start_date.is_none() {
            let raw = value.start_date.clone().unwrap_or_default();
            errors.add_error(WORKLOG_START_DATE, i18n.text("worklog.service.error.invalid.date", &[&raw]));
        }
        let input = Self::input(&value, start_date);
        let caller = ctx.caller.as_ref();
        let worklogs = self.services.worklogs.as_ref();
        let result = match value.adjust_estimate {
            AdjustEstimate::New => {
                // The remaining estimate typed into time tracking stands in
                // for a blank new estimate.
                let new_estimate = value
                    .new_estimate
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .or_else(|| self.time_tracking.remaining_estimate_input(&ctx.holder));
                worklogs.validate_create_with_new_estimate(caller, issue, &input, new_estimate.as_deref(), errors)
            }
            AdjustEstimate::Manual => worklogs.validate_create_with_manual_adjustment(
                caller,
                issue,
                &input,
                value.adjustment_amount.as_deref(),
                errors,
            ),
            AdjustEstimate::Auto | AdjustEstimate::Leave => worklogs
                .validate_create(caller, issue, &input, errors)
                .map(|result| crate::values::WorklogResult {
                    adjust_estimate: value.adjust_estimate,
                    ..result
                }),
        };
        value.result = if start_date.is_some() { result } else { None };
        ctx.holder.insert(WORKLOG, FieldValue::Worklog(value));
    }

    fn value_from_params(&self, holder: &FieldValuesHolder) -> Result<IssueValue> {
        Ok(holder
            .worklog(WORKLOG)
            .cloned()
            .map_or(IssueValue::Empty, IssueValue::Worklog))
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
        if let Some(value) = holder.worklog(WORKLOG).filter(|v| v.result.is_some()) {
            patch.set_external_field_value(WORKLOG, IssueValue::Empty, IssueValue::Worklog(value.clone()));
        }
        Ok(())
    }

    /// Creation failures are logged; the issue update itself stands.
    fn update_value(
        &self,
        caller: Option<&User>,
        _item: Option<&FieldLayoutItem>,
        issue: &Issue,
        modified: &ModifiedValue,
        _changes: &mut IssueChangeHolder,
    ) -> Result<()> {
        if let IssueValue::Worklog(value) = &modified.new {
            self.create_worklog(caller, issue, value);
        }
        Ok(())
    }

    fn create_value(&self, caller: Option<&User>, issue: &Issue, value: &IssueValue) -> Result<()> {
        if let IssueValue::Worklog(value) = value {
            self.create_worklog(caller, issue, value);
        }
        Ok(())
    }

    fn has_value(&self, _issue: &Issue) -> bool {
        false
    }

    fn needs_move(&self, _originals: &[Issue], _target: &Issue, _target_item: &FieldLayoutItem) -> MessagedResult {
        MessagedResult::no_input()
    }

    fn available_for_bulk_edit(&self, _bean: &BulkEditBean) -> Option<&'static str> {
        Some(BULK_UNAVAILABLE)
    }

    fn is_shown(&self, issue: &Issue, caller: Option<&User>) -> bool {
        self.services.settings.time_tracking
            && self
                .services
                .permissions
                .has_permission(Permission::WorkIssue, &issue.project, caller)
    }

    fn render_html(&self, view: FieldView, request: &RenderRequest<'_>) -> Result<String> {
        if !matches!(view, FieldView::Create | FieldView::Edit) {
            return Err(FieldError::unsupported(WORKLOG, view.suffix()));
        }
        let i18n = self.services.i18n.as_ref();
        let mut params = TemplateParams::for_field(WORKLOG, &self.name(i18n), request);
        let issue = request.issue;
        let value = request.holder.and_then(|h| h.worklog(WORKLOG)).cloned().unwrap_or_default();
        let start_date = value
            .start_date
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d %H:%M").to_string());
        let settings = &self.services.settings;

        params.insert_serialized(WORKLOG, &value);
        params.insert("isLogWorkActivated", value.activated);
        params.insert("adjustEstimate", value.adjust_estimate.as_str());
        params.insert("startDate", start_date);
        params.insert("currentEstimate", self.services.durations().format_opt(issue.estimate));
        params.insert("hoursPerDay", settings.working_time.hours_per_day);
        params.insert("daysPerWeek", settings.working_time.days_per_week);
        params.insert("isCreateIssue", view == FieldView::Create);
        params.insert("isEditIssue", request.operation.is_edit());
        params.insert("rendererType", request.layout_item.map(|i| i.renderer().to_string()));

        let required = request.layout_item.is_some_and(|i| i.required);
        let proxy = request.holder.filter(|h| !required && h.contains(TIMETRACKING)).and_then(|holder| {
            if self.time_tracking.is_legacy_input(holder) {
                self.services
                    .worklogs
                    .has_work_started(issue)
                    .then(|| (TIMETRACKING, self.time_tracking.remaining_estimate_input(holder)))
            } else {
                Some((REMAINING_ESTIMATE, self.time_tracking.remaining_estimate_input(holder)))
            }
        });
        params.insert("isTimeTrackingPresentAndShouldBeRendered", proxy.is_some());
        if let Some((field_id, display)) = proxy {
            params.insert("timeTrackingFieldId", field_id);
            params.insert("remainingEstimateDisplayValue", display);
        }
        render(self.services.renderer.as_ref(), "worklog-edit.vm", &params)
    }
}

impl RestAwareField for WorklogSystemField {
    fn json_schema(&self) -> JsonType {
        JsonType::system_array("worklog", WORKLOG)
    }

    fn json_from_issue(
        &self,
        issue: &Issue,
        _render: bool,
        _item: Option<&FieldLayoutItem>,
    ) -> Option<FieldJsonRepresentation> {
        let worklogs = issue.id.map(|id| self.services.worklogs.worklogs(id)).unwrap_or_default();
        Some(FieldJsonRepresentation::new(json!({
            "worklogs": worklogs.iter().map(|w| self.worklog_json(w)).collect::<Vec<_>>(),
            "maxResults": worklogs.len(),
            "total": worklogs.len(),
            "startAt": 0,
        })))
    }

    fn supported_operations(&self) -> &'static [StandardOperation] {
        &[StandardOperation::Add]
    }

    fn apply_operations(
        &self,
        _issue: &Issue,
        operations: &[FieldOperation],
        params: &mut RequestParams,
        errors: &mut ErrorCollection,
    ) {
        for op in check_supported(self, operations, errors) {
            let text = |name: &str| op.value.get(name).and_then(Value::as_str).map(str::to_string);
            let Some(time_spent) = text("timeSpent") else {
                errors.add_error(WORKLOG_TIME_LOGGED, "timeSpent is required");
                continue;
            };
            params.set(WORKLOG_ACTIVATE, vec!["true".to_string()]);
            params.set(WORKLOG_TIME_LOGGED, vec![time_spent]);
            for (json_name, param) in [
                ("started", WORKLOG_START_DATE),
                ("comment", WORKLOG_DESCRIPTION),
                ("adjustEstimate", WORKLOG_ADJUST_ESTIMATE),
                ("newEstimate", WORKLOG_NEW_ESTIMATE),
                ("reduceBy", WORKLOG_ADJUSTMENT_AMOUNT),
            ] {
                params.set(param, text(json_name).into_iter().collect());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::time_tracking::TimeTrackingSystemField;
    use crate::i18n::DefaultI18n;
    use crate::layout::IssueOperation;
    use crate::services::{IssueManager, WorklogService};
    use crate::testing;
    use crate::values::{TimeTrackingValue, WorklogResult};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts validation calls and never accepts anything.
    #[derive(Debug, Default)]
    struct CountingWorklogs(AtomicUsize);

    impl CountingWorklogs {
        fn bump(&self) -> Option<WorklogResult> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    impl WorklogService for CountingWorklogs {
        fn has_work_started(&self, _issue: &Issue) -> bool {
            false
        }

        fn validate_create(&self, _: Option<&User>, _: &Issue, _: &WorklogInput, _: &mut ErrorCollection) -> Option<WorklogResult> {
            self.bump()
        }

        fn validate_create_with_new_estimate(
            &self,
            _: Option<&User>,
            _: &Issue,
            _: &WorklogInput,
            _: Option<&str>,
            _: &mut ErrorCollection,
        ) -> Option<WorklogResult> {
            self.bump()
        }

        fn validate_create_with_manual_adjustment(
            &self,
            _: Option<&User>,
            _: &Issue,
            _: &WorklogInput,
            _: Option<&str>,
            _: &mut ErrorCollection,
        ) -> Option<WorklogResult> {
            self.bump()
        }

        fn create(&self, _: Option<&User>, _: &Issue, _: &WorklogResult) -> Result<Worklog> {
            Err(FieldError::DataAccess("not stored".into()))
        }

        fn worklogs(&self, _issue_id: i64) -> Vec<Worklog> {
            Vec::new()
        }
    }

    fn field(services: FieldServices) -> WorklogSystemField {
        let time_tracking = Arc::new(TimeTrackingSystemField::new(services.clone()));
        WorklogSystemField::new(services, time_tracking)
    }

    fn validate_with(
        field: &WorklogSystemField,
        params: &RequestParams,
        caller: &str,
        extra: Option<TimeTrackingValue>,
    ) -> (ErrorCollection, FieldValuesHolder) {
        let mut ctx = OperationContext::new(IssueOperation::Edit, Some(testing::user(caller)));
        field.populate_from_params(&mut ctx.holder, params);
        if let Some(tt) = extra {
            ctx.holder.insert(TIMETRACKING, FieldValue::TimeTracking(tt));
        }
        let mut errors = ErrorCollection::new();
        field.validate_params(&mut ctx, &mut errors, &DefaultI18n, &testing::issue(), &FieldLayoutItem::new(WORKLOG));
        (errors, ctx.holder)
    }

    fn logging(time: &str) -> RequestParams {
        RequestParams::new()
            .with(WORKLOG_ACTIVATE, "true")
            .with(WORKLOG_TIME_LOGGED, time)
            .with(WORKLOG_START_DATE, "2024-03-05 10:00")
    }

    #[test]
    fn test_inactive_value_is_replaced_without_validation() {
        let counting = Arc::new(CountingWorklogs::default());
        let services = FieldServices {
            worklogs: counting.clone(),
            ..testing::services()
        };
        let params = RequestParams::new()
            .with(WORKLOG_TIME_LOGGED, "not a duration")
            .with(IS_CREATE_ISSUE, "true");

        let (errors, holder) = validate_with(&field(services), &params, "fred", None);

        assert!(!errors.has_any_errors());
        assert_eq!(holder.worklog(WORKLOG), Some(&WorklogValue::inactive(true, false)));
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_activated_but_empty_is_skipped() {
        let params = RequestParams::new().with(WORKLOG_ACTIVATE, "true");
        let (errors, holder) = validate_with(&field(testing::services()), &params, "fred", None);
        assert!(!errors.has_any_errors());
        assert!(holder.worklog(WORKLOG).unwrap().result.is_none());
    }

    #[test]
    fn test_valid_entry_keeps_result() {
        let (errors, holder) = validate_with(&field(testing::services()), &logging("30m"), "fred", None);

        assert!(!errors.has_any_errors());
        let result = holder.worklog(WORKLOG).unwrap().result.clone().unwrap();
        assert_eq!(result.time_spent, 1_800_000);
        assert_eq!(result.adjust_estimate, AdjustEstimate::Auto);
    }

    #[test]
    fn test_errors_are_prefixed() {
        let (errors, _) = validate_with(&field(testing::services()), &logging("soon"), "fred", None);
        assert_eq!(errors.error(WORKLOG_TIME_LOGGED), Some("Invalid time duration entered."));

        let bad_date = logging("1h").with(WORKLOG_START_DATE, "yesterday");
        let (errors, holder) = validate_with(&field(testing::services()), &bad_date, "fred", None);
        assert!(errors.error(WORKLOG_START_DATE).is_some());
        assert!(holder.worklog(WORKLOG).unwrap().result.is_none());
    }

    #[test]
    fn test_permission_required() {
        let (errors, _) = validate_with(&field(testing::services()), &logging("1h"), "bob", None);
        assert!(errors.has_any_errors());
    }

    #[test]
    fn test_new_estimate_falls_back_to_time_tracking_input() {
        let params = logging("1h").with(WORKLOG_ADJUST_ESTIMATE, "new");
        let remaining = TimeTrackingValue::modern(None, Some("3h".into()));

        let (errors, holder) = validate_with(&field(testing::services()), &params, "fred", Some(remaining));

        assert!(!errors.has_any_errors());
        let result = holder.worklog(WORKLOG).unwrap().result.clone().unwrap();
        assert_eq!(result.new_estimate, Some(3 * 3_600_000));
    }

    #[test]
    fn test_description_copied_from_comment() {
        let field = field(testing::services());
        let params = logging("1h").with(COMMENT, "Paired on the export");
        let FieldValue::Worklog(value) = field.relevant_params(&params) else {
            panic!("expected a work log value");
        };
        assert_eq!(value.comment.as_deref(), Some("Paired on the export"));

        let specific = params.with(WORKLOG_DESCRIPTION, "Debugging");
        let FieldValue::Worklog(value) = field.relevant_params(&specific) else {
            panic!("expected a work log value");
        };
        assert_eq!(value.comment.as_deref(), Some("Debugging"));
    }

    #[test]
    fn test_update_value_logs_work() {
        let site = testing::site();
        let field = field(site.services());
        let (_, mut holder) = validate_with(&field, &logging("30m"), "fred", None);
        let mut patch = IssuePatch::new(testing::issue());
        field.update_issue(None, &mut patch, &mut holder).unwrap();
        let modified = patch.modified(WORKLOG).cloned().unwrap();

        field
            .update_value(Some(&testing::user("fred")), None, &testing::issue(), &modified, &mut IssueChangeHolder::new())
            .unwrap();

        let stored = site.issue_by_key("HR-1").unwrap();
        assert_eq!(stored.estimate, Some(1_800_000));
        assert_eq!(stored.time_spent, Some(1_800_000));
        assert_eq!(site.worklogs(1).len(), 1);
    }

    #[test]
    fn test_parse_start_date() {
        assert!(parse_start_date(Some("2024-03-05T10:00:00Z")).is_some());
        assert!(parse_start_date(Some("2024-03-05")).is_some());
        assert!(parse_start_date(None).is_some());
        assert!(parse_start_date(Some("05/03/2024")).is_none());
    }

    #[test]
    fn test_not_shown_without_time_tracking() {
        let services = testing::site_with(crate::settings::SiteSettings::default().with_time_tracking(false)).services();
        let fred = testing::user("fred");
        assert!(!field(services).is_shown(&testing::issue(), Some(&fred)));
        assert!(field(testing::services()).is_shown(&testing::issue(), Some(&fred)));
    }

    #[test]
    fn test_rest_add() {
        let field = field(testing::services());
        let mut params = RequestParams::new();
        let mut errors = ErrorCollection::new();
        let ops = [FieldOperation::new(StandardOperation::Add, json!({"timeSpent": "2h", "comment": "Review"}))];

        field.apply_operations(&testing::issue(), &ops, &mut params, &mut errors);

        assert!(!errors.has_any_errors());
        assert!(params.flag(WORKLOG_ACTIVATE));
        assert_eq!(params.first(WORKLOG_TIME_LOGGED), Some("2h"));
        assert_eq!(params.first(WORKLOG_DESCRIPTION), Some("Review"));
        assert!(!params.contains(WORKLOG_START_DATE));
    }
}
