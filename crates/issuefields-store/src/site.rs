//! Site directory management: loading a site into memory and writing its
//! activity back.

use crate::config::SiteConfig;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use issuefields_core::{ChangeGroup, Comment, InMemorySite, Issue, IssueLink, SiteActivity, SiteData, Worklog};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory name for site configuration.
const SITE_DIR: &str = ".issuefields";
const CONFIG_FILE: &str = "config.yml";
/// Catalog file name within the site directory.
const SITE_FILE: &str = "site.yml";
const ISSUES_DIR: &str = "issues";
const ACTIVITY_DIR: &str = "activity";
const COMMENTS_FILE: &str = "comments.yml";
const WORKLOGS_FILE: &str = "worklogs.yml";
const LINKS_FILE: &str = "links.yml";
const HISTORY_DIR: &str = "history";

/// A site directory on disk.
#[derive(Debug)]
pub struct SiteStore {
    root: PathBuf,
    config: SiteConfig,
}

impl SiteStore {
    /// Initialize a site at the given path with the demo catalog and issues.
    ///
    /// # Errors
    /// Returns error if a site already exists or IO fails.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        Self::init_with(path, SiteConfig::default(), &SiteData::demo(), &SiteActivity::demo())
    }

    /// Initialize a site with the given configuration, catalog and issues.
    ///
    /// # Errors
    /// Returns error if a site already exists or IO fails.
    pub fn init_with(
        path: impl AsRef<Path>,
        config: SiteConfig,
        data: &SiteData,
        activity: &SiteActivity,
    ) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let site_dir = root.join(SITE_DIR);

        if site_dir.exists() {
            return Err(StoreError::SiteExists(root));
        }

        fs::create_dir_all(&site_dir)?;
        fs::create_dir_all(root.join(ISSUES_DIR))?;
        fs::create_dir_all(root.join(ACTIVITY_DIR))?;
        fs::create_dir_all(root.join(HISTORY_DIR))?;

        write_yaml(&site_dir.join(CONFIG_FILE), &config)?;

        let store = Self { root, config };
        store.write_data(data)?;
        store.write_activity(activity)?;

        info!(path = %store.root.display(), issues = activity.issues.len(), "Initialized site");

        Ok(store)
    }

    /// Open an existing site.
    ///
    /// # Errors
    /// Returns error if no site exists there or the config is invalid.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let config_path = root.join(SITE_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            return Err(StoreError::SiteNotFound(root));
        }

        let config: SiteConfig = read_yaml(&config_path)?;

        debug!(path = %root.display(), "Opened site");

        Ok(Self { root, config })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn issue_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(ISSUES_DIR).join(format!("{key}.yml")))
    }

    fn history_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(HISTORY_DIR).join(format!("{key}.ndjson")))
    }

    fn activity_path(&self, file: &str) -> PathBuf {
        self.root.join(ACTIVITY_DIR).join(file)
    }

    /// Load the whole site into memory.
    ///
    /// # Errors
    /// Returns error if the catalog or an activity file cannot be read.
    /// Unreadable issue files are skipped with a warning.
    pub fn load(&self) -> Result<Arc<InMemorySite>> {
        let data: SiteData = read_yaml(&self.root.join(SITE_DIR).join(SITE_FILE))?;
        let activity = SiteActivity {
            issues: self.read_issues()?,
            comments: read_yaml_or_default(&self.activity_path(COMMENTS_FILE))?,
            worklogs: read_yaml_or_default(&self.activity_path(WORKLOGS_FILE))?,
            links: read_yaml_or_default(&self.activity_path(LINKS_FILE))?,
        };
        debug!(
            projects = data.projects.len(),
            issues = activity.issues.len(),
            custom_fields = data.custom_fields.len(),
            "Loaded site"
        );
        Ok(Arc::new(InMemorySite::new(self.config.settings.clone(), data, activity)))
    }

    fn read_issues(&self) -> Result<Vec<Issue>> {
        let dir = self.root.join(ISSUES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut issues = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "yml") {
                continue;
            }
            match read_yaml::<Issue>(path) {
                Ok(issue) => issues.push(issue),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to read issue, skipping"),
            }
        }

        issues.sort_by_key(|i| i.id);
        Ok(issues)
    }

    /// Read one issue by key.
    ///
    /// # Errors
    /// Returns error if the issue does not exist or cannot be parsed.
    pub fn issue(&self, key: &str) -> Result<Issue> {
        let path = self.issue_path(key)?;
        if !path.exists() {
            return Err(StoreError::IssueNotFound(key.to_string()));
        }
        read_yaml(&path)
    }

    /// Write the catalog, issues and activity of `site` back to disk.
    ///
    /// # Errors
    /// Returns error if any file cannot be written.
    pub fn save(&self, site: &InMemorySite) -> Result<()> {
        self.write_data(&site.data())?;
        let activity = site.activity();
        self.write_activity(&activity)?;
        debug!(issues = activity.issues.len(), "Saved site");
        Ok(())
    }

    fn write_data(&self, data: &SiteData) -> Result<()> {
        write_yaml(&self.root.join(SITE_DIR).join(SITE_FILE), data)
    }

    fn write_activity(&self, activity: &SiteActivity) -> Result<()> {
        for issue in &activity.issues {
            let Some(key) = issue.key.as_deref() else {
                warn!(summary = ?issue.summary, "Issue without a key, not saved");
                continue;
            };
            write_yaml(&self.issue_path(key)?, issue)?;
        }
        write_yaml::<[Comment]>(&self.activity_path(COMMENTS_FILE), &activity.comments)?;
        write_yaml::<[Worklog]>(&self.activity_path(WORKLOGS_FILE), &activity.worklogs)?;
        write_yaml::<[IssueLink]>(&self.activity_path(LINKS_FILE), &activity.links)?;
        Ok(())
    }

    /// Append a change group to its issue's history.
    ///
    /// # Errors
    /// Returns error if the history file cannot be written.
    pub fn append_history(&self, group: &ChangeGroup) -> Result<()> {
        let path = self.history_path(&group.issue_key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let json_line = serde_json::to_string(group)?;
        writeln!(file, "{json_line}")?;

        debug!(issue = %group.issue_key, items = group.items.len(), "Appended change group");

        Ok(())
    }

    /// Read an issue's history, oldest first, optionally since a time.
    ///
    /// # Errors
    /// Returns error if the history file cannot be read or parsed.
    pub fn read_history(&self, key: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ChangeGroup>> {
        let path = self.history_path(key)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut groups = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let group: ChangeGroup = serde_json::from_str(&line)?;
            if since.is_none_or(|s| group.created >= s) {
                groups.push(group);
            }
        }

        Ok(groups)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIssueKey(key.to_string()))
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

fn read_yaml_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.exists() { read_yaml(path) } else { Ok(T::default()) }
}

fn write_yaml<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_yaml::to_string(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuefields_core::services::{CommentService, IssueManager};
    use issuefields_core::{FieldManager, IssueOperationRunner, RequestParams, SiteSettings, User};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SiteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SiteStore::init(tmp.path()).unwrap();
        (tmp, store)
    }

    fn fred() -> User {
        User::new("fred", "Fred Normal")
    }

    #[test]
    fn test_init_site() {
        let (tmp, store) = setup();

        assert!(tmp.path().join(".issuefields/config.yml").exists());
        assert!(tmp.path().join(".issuefields/site.yml").exists());
        assert!(tmp.path().join("issues/HR-1.yml").exists());
        assert!(tmp.path().join("activity/comments.yml").exists());
        assert_eq!(store.config().version, 1);
    }

    #[test]
    fn test_init_existing_fails() {
        let (tmp, _store) = setup();

        let result = SiteStore::init(tmp.path());
        assert!(matches!(result, Err(StoreError::SiteExists(_))));
    }

    #[test]
    fn test_open_missing_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(SiteStore::open(tmp.path()), Err(StoreError::SiteNotFound(_))));
    }

    #[test]
    fn test_load_demo_site() {
        let (tmp, _store) = setup();
        let store = SiteStore::open(tmp.path()).unwrap();

        let site = store.load().unwrap();
        assert_eq!(site.issues().len(), 4);
        assert_eq!(site.comments(1).len(), 1);
        assert_eq!(site.data().custom_fields.len(), 3);
        assert_eq!(store.issue("MKT-1").unwrap().summary.as_deref(), Some("Plan the spring campaign"));
    }

    #[test]
    fn test_settings_come_from_config() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig::new("Legacy").with_settings(SiteSettings::default().with_legacy_mode(true));
        SiteStore::init_with(tmp.path(), config, &SiteData::demo(), &SiteActivity::default()).unwrap();

        let site = SiteStore::open(tmp.path()).unwrap().load().unwrap();
        assert!(site.settings().time_tracking_legacy_mode);
        assert!(site.issues().is_empty());
    }

    #[test]
    fn test_edit_survives_reload() {
        let (tmp, store) = setup();
        let site = store.load().unwrap();
        let runner = IssueOperationRunner::new(Arc::new(FieldManager::new(site.services())));
        let issue = site.issue_by_key("HR-2").unwrap();
        let params = RequestParams::new()
            .with("summary", "Rewrite the staff handbook")
            .with("comment", "Legal signed off");

        let validated = runner.validate_update(Some(&fred()), &issue, &params).unwrap();
        let outcome = runner.apply(validated).unwrap();
        store.save(&site).unwrap();
        store.append_history(outcome.change_group.as_ref().unwrap()).unwrap();

        let reloaded = SiteStore::open(tmp.path()).unwrap().load().unwrap();
        let issue = reloaded.issue_by_key("HR-2").unwrap();
        assert_eq!(issue.summary.as_deref(), Some("Rewrite the staff handbook"));
        assert_eq!(reloaded.comments(2).len(), 1);

        let history = store.read_history("HR-2", None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].author.as_deref(), Some("fred"));
        assert!(history[0].comment_id.is_some());
    }

    #[test]
    fn test_history_since() {
        let (_tmp, store) = setup();
        let changes = issuefields_core::IssueChangeHolder::new();
        let group = ChangeGroup::new("HR-1", Some("fred".to_string()), &changes);
        store.append_history(&group).unwrap();

        assert_eq!(store.read_history("HR-1", None).unwrap(), vec![group.clone()]);
        let later = group.created + chrono::Duration::seconds(1);
        assert!(store.read_history("HR-1", Some(later)).unwrap().is_empty());
        assert!(store.read_history("HR-2", None).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        let (_tmp, store) = setup();
        assert!(matches!(store.issue("../site"), Err(StoreError::InvalidIssueKey(_))));
        assert!(matches!(store.issue("HR-99"), Err(StoreError::IssueNotFound(_))));
    }

    #[test]
    fn test_broken_issue_file_is_skipped() {
        let (tmp, store) = setup();
        fs::write(tmp.path().join("issues/HR-9.yml"), "summary: [unclosed").unwrap();
        fs::write(tmp.path().join("issues/README.txt"), "not an issue").unwrap();

        let site = store.load().unwrap();
        assert_eq!(site.issues().len(), 4);
    }
}
