//! System field ids. These are a wire contract shared with request
//! parameters, layouts and REST payloads.

pub const PROJECT: &str = "project";
pub const ISSUE_KEY: &str = "issuekey";
pub const SUMMARY: &str = "summary";
pub const ISSUE_TYPE: &str = "issuetype";
pub const STATUS: &str = "status";
pub const PRIORITY: &str = "priority";
pub const RESOLUTION: &str = "resolution";
pub const ASSIGNEE: &str = "assignee";
pub const REPORTER: &str = "reporter";
pub const CREATOR: &str = "creator";
pub const CREATED: &str = "created";
pub const LAST_VIEWED: &str = "lastViewed";
pub const UPDATED: &str = "updated";
pub const RESOLUTION_DATE: &str = "resolutiondate";
pub const AFFECTED_VERSIONS: &str = "versions";
pub const FIX_VERSIONS: &str = "fixVersions";
pub const COMPONENTS: &str = "components";
pub const DUE_DATE: &str = "duedate";
pub const VOTES: &str = "votes";
pub const WATCHES: &str = "watches";
pub const THUMBNAIL: &str = "thumbnail";
pub const TIME_ORIGINAL_ESTIMATE: &str = "timeoriginalestimate";
pub const TIME_ESTIMATE: &str = "timeestimate";
pub const TIME_SPENT: &str = "timespent";
pub const WORK_RATIO: &str = "workratio";
pub const SUBTASKS: &str = "subtasks";
pub const ISSUE_LINKS: &str = "issuelinks";
pub const ATTACHMENT: &str = "attachment";
pub const ENVIRONMENT: &str = "environment";
pub const DESCRIPTION: &str = "description";
pub const TIMETRACKING: &str = "timetracking";
pub const SECURITY: &str = "security";
pub const COMMENT: &str = "comment";
pub const PROGRESS: &str = "progress";
pub const AGGREGATE_PROGRESS: &str = "aggregateprogress";
pub const AGGREGATE_TIME_SPENT: &str = "aggregatetimespent";
pub const AGGREGATE_TIME_ESTIMATE: &str = "aggregatetimeestimate";
pub const AGGREGATE_TIME_ORIGINAL_ESTIMATE: &str = "aggregatetimeoriginalestimate";
pub const LABELS: &str = "labels";
pub const WORKLOG: &str = "worklog";

/// Prefix of custom field ids (`customfield_10000`).
pub const CUSTOM_FIELD_PREFIX: &str = "customfield_";

/// Shared parameter flagging the create-issue operation.
pub const IS_CREATE_ISSUE: &str = "isCreateIssue";
/// Shared parameter flagging the edit-issue operation.
pub const IS_EDIT_ISSUE: &str = "isEditIssue";
