//! Local HTTP server exposing issue fields over REST.
//!
//! Issues are read through each field's JSON representation and written
//! through the same field lifecycle the CLI uses: request bodies are turned
//! into request parameters, validated, applied and saved back to the site
//! directory.

pub mod error;
pub mod json;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use issuefields_core::rest::{IdOrName, id_or_name};
use issuefields_core::services::Permission;
use issuefields_core::{
    ChangeGroup, FieldManager, FieldMeta, InMemorySite, Issue, IssueOperationRunner, OperationOutcome, Project,
    User,
};
use issuefields_store::SiteStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub use error::AppError;

/// Header naming the acting user; requests without it are anonymous.
pub const USER_HEADER: &str = "x-issuefields-user";

/// Server state shared across handlers.
pub struct AppState {
    store: SiteStore,
    site: Arc<InMemorySite>,
    runner: IssueOperationRunner,
    /// Held from reading an issue until its update is saved.
    writes: Mutex<()>,
}

impl AppState {
    #[must_use]
    pub fn new(store: SiteStore, site: Arc<InMemorySite>) -> Self {
        let manager = Arc::new(FieldManager::new(site.services()));
        Self {
            store,
            site,
            runner: IssueOperationRunner::new(manager),
            writes: Mutex::new(()),
        }
    }

    /// Load the site stored at `path`.
    ///
    /// # Errors
    /// Returns error if there is no readable site at `path`.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let store = SiteStore::open(path).context("Failed to open site")?;
        let site = store.load().context("Failed to load site")?;
        Ok(Self::new(store, site))
    }

    fn manager(&self) -> &FieldManager {
        self.runner.manager()
    }

    fn caller(&self, headers: &HeaderMap) -> Result<Option<User>, AppError> {
        let Some(name) = headers.get(USER_HEADER) else {
            return Ok(None);
        };
        let name = name
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{USER_HEADER} must be ASCII")))?;
        self.manager()
            .services()
            .users
            .user_by_name(name)
            .map(Some)
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown user '{name}'")))
    }

    /// The issue, if it exists and the caller may browse its project.
    fn browsable_issue(&self, key: &str, caller: Option<&User>) -> Result<Issue, AppError> {
        let services = self.manager().services();
        services
            .issues
            .issue_by_key(key)
            .filter(|issue| services.permissions.has_permission(Permission::Browse, &issue.project, caller))
            .ok_or_else(|| AppError::NotFound(format!("Issue Does Not Exist: {key}")))
    }

    fn save(&self, outcome: &OperationOutcome) -> Result<(), AppError> {
        self.store.save(&self.site)?;
        if let Some(group) = &outcome.change_group {
            self.store.append_history(group)?;
        }
        Ok(())
    }
}

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rest/api/2/field", get(list_fields))
        .route("/rest/api/2/issue", post(create_issue))
        .route("/rest/api/2/issue/{key}", get(get_issue).put(update_issue))
        .route("/rest/api/2/issue/{key}/editmeta", get(edit_meta))
        .route("/rest/api/2/issue/{key}/changelog", get(changelog))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server on the site stored at `site_path`.
///
/// # Errors
/// Returns error if the site cannot be loaded, binding fails or the server
/// encounters an error.
pub async fn serve(site_path: &std::path::Path, host: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState::open(site_path)?);
    let app = router(state);

    let addr = format!("{host}:{port}");
    info!(address = %addr, site = %site_path.display(), "Starting REST server");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Request/Response types ---

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct IssueQuery {
    /// Comma-separated expansions; `renderedFields` adds rendered values.
    #[serde(default)]
    expand: Option<String>,
}

impl IssueQuery {
    fn expands(&self, name: &str) -> bool {
        self.expand
            .as_deref()
            .is_some_and(|e| e.split(',').any(|part| part.trim() == name))
    }
}

#[derive(Debug, Serialize)]
struct CreatedIssue {
    id: String,
    key: String,
}

#[derive(Debug, Serialize)]
struct ChangelogResponse {
    total: usize,
    histories: Vec<ChangeGroup>,
}

// --- Handlers ---

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_fields(State(state): State<Arc<AppState>>) -> Json<Vec<FieldMeta>> {
    let manager = state.manager();
    let fields = manager
        .all_fields()
        .iter()
        .filter(|f| manager.is_field_available(f.id()))
        .map(|f| manager.field_meta(f.as_ref()))
        .collect();
    Json(fields)
}

async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<IssueQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let caller = state.caller(&headers)?;
    let issue = state.browsable_issue(&key, caller.as_ref())?;
    Ok(Json(json::issue_json(state.manager(), &issue, query.expands("renderedFields"))))
}

async fn edit_meta(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let caller = state.caller(&headers)?;
    let issue = state.browsable_issue(&key, caller.as_ref())?;
    Ok(Json(json::edit_meta(state.manager(), &issue, caller.as_ref())))
}

async fn update_issue(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<StatusCode, AppError> {
    let caller = state.caller(&headers)?;
    let _guard = state.writes.lock().await;
    let issue = state.browsable_issue(&key, caller.as_ref())?;

    let params = state.runner.rest_params(&issue, &body).map_err(AppError::Validation)?;
    let validated = state
        .runner
        .validate_update(caller.as_ref(), &issue, &params)
        .map_err(AppError::Validation)?;

    let outcome = state.runner.apply(validated)?;
    state.save(&outcome)?;

    debug!(issue = %key, "Updated issue over REST");
    Ok(StatusCode::NO_CONTENT)
}

async fn create_issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let caller = state.caller(&headers)?;
    let project_ref = body
        .get_mut("fields")
        .and_then(Value::as_object_mut)
        .and_then(|fields| fields.remove("project"))
        .ok_or_else(|| AppError::BadRequest("fields.project is required".to_string()))?;
    let project = resolve_project(&state, &project_ref)?;

    let issue_types = state.manager().services().constants.issue_types_for_project(project.id);
    let issue_type = issue_types
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest(format!("Project {} has no issue types", project.key)))?;
    let template = Issue::new(project.clone(), issue_type);

    let params = state.runner.rest_params(&template, &body).map_err(AppError::Validation)?;
    let validated = state
        .runner
        .validate_create(caller.as_ref(), &project, &params)
        .map_err(AppError::Validation)?;

    let _guard = state.writes.lock().await;
    let outcome = state.runner.apply(validated)?;
    state.save(&outcome)?;

    let created = CreatedIssue {
        id: outcome.issue.id.map(|id| id.to_string()).unwrap_or_default(),
        key: outcome.issue.key.clone().unwrap_or_default(),
    };
    Ok((StatusCode::CREATED, Json(created)))
}

fn resolve_project(state: &AppState, reference: &Value) -> Result<Project, AppError> {
    let projects = &state.manager().services().projects;
    let key = reference.get("key").and_then(Value::as_str);
    let found = match (key, id_or_name(reference)) {
        (Some(key), _) => projects.project_by_key(key),
        (None, Some(IdOrName::Id(id))) => id.parse().ok().and_then(|id| projects.project(id)),
        (None, Some(IdOrName::Name(name))) => projects.project_by_key(&name),
        (None, None) => None,
    };
    found.ok_or_else(|| AppError::BadRequest(format!("Unknown project: {reference}")))
}

async fn changelog(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ChangelogResponse>, AppError> {
    let caller = state.caller(&headers)?;
    let issue = state.browsable_issue(&key, caller.as_ref())?;
    let histories = state.store.read_history(issue.display_key(), None)?;
    Ok(Json(ChangelogResponse {
        total: histories.len(),
        histories,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn setup() -> (TempDir, Arc<AppState>) {
        let tmp = TempDir::new().unwrap();
        SiteStore::init(tmp.path()).unwrap();
        let state = Arc::new(AppState::open(tmp.path()).unwrap());
        (tmp, state)
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_as(uri: &str, user: &str) -> Request<Body> {
        Request::get(uri).header(USER_HEADER, user).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, user: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_HEADER, user)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_tmp, state) = setup();
        let (status, body) = send(&state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_fields() {
        let (_tmp, state) = setup();
        let (status, body) = send(&state, get_as("/rest/api/2/field", "fred")).await;

        assert_eq!(status, StatusCode::OK);
        let fields = body.as_array().unwrap();
        let points = fields.iter().find(|f| f["id"] == "customfield_10000").unwrap();
        assert_eq!(points["custom"], true);
        assert_eq!(points["clauseNames"], json!(["cf[10000]", "Story Points"]));
        assert!(fields.iter().any(|f| f["id"] == "summary"));
    }

    #[tokio::test]
    async fn test_get_issue() {
        let (_tmp, state) = setup();
        let (status, body) = send(&state, get_as("/rest/api/2/issue/HR-1?expand=renderedFields", "fred")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], "HR-1");
        assert_eq!(body["fields"]["summary"], "Payroll export drops the last row");
        assert!(body["renderedFields"]["description"].is_string());

        let (status, _) = send(&state, get_as("/rest/api/2/issue/HR-99", "fred")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, get_as("/rest/api/2/issue/HR-1", "mallory")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_issue_writes_history() {
        let (tmp, state) = setup();
        let body = json!({
            "fields": {"summary": "Payroll export drops rows"},
            "update": {"comment": [{"add": {"body": "Fixed on staging"}}]},
        });

        let (status, _) = send(&state, json_request("PUT", "/rest/api/2/issue/HR-1", "fred", &body)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let stored = SiteStore::open(tmp.path()).unwrap().issue("HR-1").unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Payroll export drops rows"));

        let (status, body) = send(&state, get_as("/rest/api/2/issue/HR-1/changelog", "fred")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["histories"][0]["author"], "fred");
    }

    #[tokio::test]
    async fn test_update_rejects_bad_values() {
        let (_tmp, state) = setup();

        let body = json!({"fields": {"summary": ""}});
        let (status, body) = send(&state, json_request("PUT", "/rest/api/2/issue/HR-1", "fred", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["summary"].is_string());

        let body = json!({"fields": {"summary": "Renamed"}});
        let (status, body) = send(&state, json_request("PUT", "/rest/api/2/issue/HR-1", "bob", &body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errorMessages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_issue() {
        let (tmp, state) = setup();
        let body = json!({
            "fields": {
                "project": {"key": "HR"},
                "issuetype": {"id": "2"},
                "summary": "Order new laptops",
            }
        });

        let (status, body) = send(&state, json_request("POST", "/rest/api/2/issue", "fred", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["key"], "HR-4");
        assert!(tmp.path().join("issues/HR-4.yml").exists());

        let missing = json!({"fields": {"summary": "No project"}});
        let (status, _) = send(&state, json_request("POST", "/rest/api/2/issue", "fred", &missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_edit_meta() {
        let (_tmp, state) = setup();
        let (status, body) = send(&state, get_as("/rest/api/2/issue/HR-1/editmeta", "fred")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"]["components"]["required"], true);
        assert!(body["fields"].get("summary").is_some());
    }
}
