//! CLI command implementations.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use console::style;
use issuefields_core::services::{IssueManager, Permission, ProjectManager, UserManager};
use issuefields_core::{
    BulkEditBean, BulkOperation, ErrorCollection, FieldManager, InMemorySite, Issue, IssueOperationRunner,
    OperationOutcome, RequestParams, SiteActivity, SiteData, User, ValidatedOperation,
};
use issuefields_store::{SiteConfig, SiteStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Where and as whom a command runs.
pub struct Session<'a> {
    pub path: &'a Path,
    pub user: Option<&'a str>,
    pub format: OutputFormat,
}

/// A loaded site ready for field operations.
struct Loaded {
    store: SiteStore,
    site: Arc<InMemorySite>,
    runner: IssueOperationRunner,
    caller: Option<User>,
}

impl Loaded {
    fn manager(&self) -> &FieldManager {
        self.runner.manager()
    }

    fn browsable(&self, caller: Option<&User>, issue: &Issue) -> bool {
        self.manager()
            .services()
            .permissions
            .has_permission(Permission::Browse, &issue.project, caller)
    }

    /// The issue, if it exists and the caller may browse it.
    fn issue(&self, key: &str) -> Result<Issue> {
        self.site
            .issue_by_key(key)
            .filter(|issue| self.browsable(self.caller.as_ref(), issue))
            .with_context(|| format!("Issue not found: {key}"))
    }
}

fn load(session: &Session) -> Result<Loaded> {
    let store = SiteStore::open(session.path).context("Failed to open site")?;
    let site = store.load().context("Failed to load site")?;
    let caller = match session.user {
        Some(name) => Some(site.user_by_name(name).with_context(|| format!("Unknown user: {name}"))?),
        None => None,
    };
    let runner = IssueOperationRunner::new(Arc::new(FieldManager::new(site.services())));
    debug!(site = %session.path.display(), user = ?session.user, "Loaded site");
    Ok(Loaded {
        store,
        site,
        runner,
        caller,
    })
}

/// Parse `name=value` pairs into request parameters; repeated names
/// accumulate values.
fn parse_params(pairs: &[String]) -> Result<RequestParams> {
    let mut params = RequestParams::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("Invalid parameter '{pair}', expected name=value");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Invalid parameter '{pair}', name is empty");
        }
        params.append(name, value);
    }
    Ok(params)
}

/// Initialize a new site with the demo catalog.
pub fn init(session: &Session, name: Option<String>) -> Result<()> {
    let config = name.map(SiteConfig::new).unwrap_or_default();
    SiteStore::init_with(session.path, config, &SiteData::demo(), &SiteActivity::demo())
        .context("Failed to initialize site")?;
    output::print_success(&format!("Initialized site at {}", session.path.display()), session.format)
}

/// List available fields, or the navigator columns the caller can see.
pub fn fields(session: &Session, navigable: bool, projects: &[String], issue_types: &[String]) -> Result<()> {
    let loaded = load(session)?;
    let manager = loaded.manager();

    let fields = if navigable {
        let project_ids = projects
            .iter()
            .map(|key| {
                loaded
                    .site
                    .project_by_key(key)
                    .map(|p| p.id)
                    .with_context(|| format!("Project not found: {key}"))
            })
            .collect::<Result<Vec<_>>>()?;
        manager.available_navigable_fields_with_scope(loaded.caller.as_ref(), &project_ids, issue_types)
    } else {
        manager
            .all_fields()
            .into_iter()
            .filter(|f| manager.is_field_available(f.id()))
            .collect()
    };

    let metas: Vec<_> = fields.iter().map(|f| manager.field_meta(f.as_ref())).collect();
    output::print_list(&metas, session.format)
}

/// Tabulate the issues the caller can browse by navigator column.
pub fn list(session: &Session, columns: &[String]) -> Result<()> {
    let loaded = load(session)?;
    let manager = loaded.manager();

    let fields = columns
        .iter()
        .map(|id| {
            manager
                .field(id.trim())
                .filter(|f| f.as_navigable().is_some())
                .with_context(|| format!("Not a navigable field: {id}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let issues: Vec<_> = loaded
        .site
        .issues()
        .into_iter()
        .filter(|issue| loaded.browsable(loaded.caller.as_ref(), issue))
        .collect();

    let mut headings: Vec<String> = fields.iter().map(|f| f.id().to_string()).collect();
    let mut rows = Vec::with_capacity(issues.len());
    for issue in &issues {
        let mut row = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let (heading, value) = manager.column(field.as_ref(), issue).unwrap_or_default();
            headings[i] = heading;
            row.push(value.unwrap_or_default());
        }
        rows.push(row);
    }

    output::print_table(&headings, &rows, session.format)
}

/// Show an issue through its fields' JSON representations.
pub fn show(session: &Session, key: &str, rendered: bool) -> Result<()> {
    let loaded = load(session)?;
    let issue = loaded.issue(key)?;
    let json = issuefields_rest::json::issue_json(loaded.manager(), &issue, rendered);
    output::print_issue(&json, session.format)
}

/// Edit an issue's fields.
pub fn edit(session: &Session, key: &str, params: &[String]) -> Result<()> {
    let loaded = load(session)?;
    let issue = loaded.issue(key)?;
    let params = parse_params(params)?;
    let validated = loaded.runner.validate_update(loaded.caller.as_ref(), &issue, &params);
    run(session, &loaded, validated)
}

/// Edit an issue on a transition screen.
pub fn transition(
    session: &Session,
    key: &str,
    params: &[String],
    include_resolutions: Vec<String>,
    exclude_resolutions: Vec<String>,
) -> Result<()> {
    let loaded = load(session)?;
    let issue = loaded.issue(key)?;
    let params = parse_params(params)?;
    let validated = loaded.runner.validate_transition(
        loaded.caller.as_ref(),
        &issue,
        &params,
        include_resolutions,
        exclude_resolutions,
    );
    run(session, &loaded, validated)
}

/// Create an issue in a project.
pub fn create(session: &Session, project_key: &str, params: &[String]) -> Result<()> {
    let loaded = load(session)?;
    let project = loaded
        .site
        .project_by_key(project_key)
        .with_context(|| format!("Project not found: {project_key}"))?;
    let params = parse_params(params)?;
    let validated = loaded.runner.validate_create(loaded.caller.as_ref(), &project, &params);
    run(session, &loaded, validated)
}

/// Apply a validated operation and write the site back, or report why it
/// was refused.
fn run(
    session: &Session,
    loaded: &Loaded,
    validated: std::result::Result<ValidatedOperation, ErrorCollection>,
) -> Result<()> {
    let validated = match validated {
        Ok(validated) => validated,
        Err(errors) => {
            output::print_errors(&errors, session.format)?;
            bail!("Validation failed");
        }
    };

    let outcome = loaded.runner.apply(validated).context("Failed to apply changes")?;
    save(loaded, &outcome)?;

    let json = issuefields_rest::json::issue_json(loaded.manager(), &outcome.issue, false);
    if let OutputFormat::Human = session.format {
        let changed = outcome.change_group.as_ref().map_or(0, |g| g.items.len());
        println!(
            "{} {} ({changed} change{})",
            style("Saved").green(),
            style(outcome.issue.display_key()).bold(),
            if changed == 1 { "" } else { "s" }
        );
    }
    output::print_issue(&json, session.format)
}

fn save(loaded: &Loaded, outcome: &OperationOutcome) -> Result<()> {
    loaded.store.save(&loaded.site).context("Failed to save site")?;
    if let Some(group) = &outcome.change_group {
        loaded.store.append_history(group).context("Failed to record history")?;
    }
    Ok(())
}

fn issues_by_key(loaded: &Loaded, keys: &[String]) -> Result<Vec<Issue>> {
    keys.iter().map(|key| loaded.issue(key)).collect()
}

/// Report which fields the selected issues can be bulk edited with.
pub fn bulk_check(session: &Session, keys: &[String]) -> Result<()> {
    let loaded = load(session)?;
    let issues = issues_by_key(&loaded, keys)?;
    let layouts = issues.iter().map(|issue| loaded.manager().field_layout(issue)).collect();
    let bean = BulkEditBean::new(BulkOperation::Edit, loaded.caller.clone(), issues).with_layouts(layouts);

    let statuses = loaded.runner.bulk_edit_fields(&bean);
    output::print_list(&statuses, session.format)
}

/// Report which fields need input to move the selected issues.
pub fn move_check(session: &Session, keys: &[String], project_key: &str, issue_type_id: &str) -> Result<()> {
    let loaded = load(session)?;
    let originals = issues_by_key(&loaded, keys)?;
    let services = loaded.manager().services();

    let project = loaded
        .site
        .project_by_key(project_key)
        .with_context(|| format!("Project not found: {project_key}"))?;
    let issue_type = services
        .constants
        .issue_types_for_project(project.id)
        .into_iter()
        .find(|t| t.id == issue_type_id)
        .with_context(|| format!("Issue type {issue_type_id} is not used by {project_key}"))?;

    let Some(mut target) = originals.first().cloned() else {
        bail!("No issues selected");
    };
    target.project = project;
    target.issue_type = issue_type;

    let statuses = loaded.runner.move_fields(&originals, &target);
    if statuses.is_empty() && matches!(session.format, OutputFormat::Human) {
        return output::print_success("No fields need input", session.format);
    }
    output::print_list(&statuses, session.format)
}

/// Show change history for an issue.
pub fn history(session: &Session, key: &str, since_days: Option<u32>) -> Result<()> {
    let loaded = load(session)?;
    let issue = loaded.issue(key)?;
    let since = since_days.map(|days| Utc::now() - Duration::days(i64::from(days)));
    let groups = loaded
        .store
        .read_history(&issue.display_key(), since)
        .context("Failed to read history")?;

    if groups.is_empty() && matches!(session.format, OutputFormat::Human) {
        println!("{}", style("No history.").dim());
        return Ok(());
    }
    output::print_list(&groups, session.format)
}

/// Start the REST server.
pub fn serve(session: &Session, host: &str, port: u16) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(issuefields_rest::serve(session.path, host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_params_accumulates_values() {
        let params = parse_params(&[
            "summary=New summary".to_string(),
            "components=10000".to_string(),
            "components=10001".to_string(),
            "environment=".to_string(),
            "description=a=b".to_string(),
        ])
        .unwrap();

        assert_eq!(params.first("summary"), Some("New summary"));
        assert_eq!(params.first("environment"), Some(""));
        assert_eq!(params.first("description"), Some("a=b"));
        assert!(params.contains("components"));
    }

    #[test]
    fn test_parse_params_rejects_bare_words() {
        assert!(parse_params(&["summary".to_string()]).is_err());
        assert!(parse_params(&["=value".to_string()]).is_err());
    }
}
