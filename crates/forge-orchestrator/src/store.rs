//! Persistent library of saved projects.
//!
//! The store keeps projects most-recent-first and writes the whole sequence
//! as one JSON document after every mutation: an array of camelCase records
//! with millisecond timestamps.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use forge_client::GeneratedSite;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ForgeError, Result};

/// Marker prepended to the stored prompt of a refined project.
pub const REFINEMENT_PREFIX: &str = "Refinement Request: ";

/// Returns the current instant at millisecond precision.
///
/// Timestamps are persisted as epoch milliseconds, so anything finer would
/// not survive a save/load cycle.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A saved generation: the prompt that produced a site and the site itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProject {
    /// Unique, immutable identifier.
    pub id: String,

    /// Creation or last-refinement instant.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Prompt label (refinements carry [`REFINEMENT_PREFIX`]).
    pub prompt: String,

    /// The current site.
    pub site: GeneratedSite,
}

impl SavedProject {
    /// Creates a project with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(prompt: impl Into<String>, site: GeneratedSite) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            prompt: prompt.into(),
            site,
        }
    }

    /// Returns the site title, used as the display name.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.site.metadata.title
    }
}

/// Ordered collection of saved projects with optional file persistence.
#[derive(Debug, Clone, Default)]
pub struct ProjectStore {
    path: Option<PathBuf>,
    projects: Vec<SavedProject>,
}

impl ProjectStore {
    /// Creates an empty store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a store from existing projects.
    ///
    /// Later duplicates of an id are dropped.
    #[must_use]
    pub fn with_projects(path: Option<PathBuf>, projects: Vec<SavedProject>) -> Self {
        Self {
            path,
            projects: dedupe(projects),
        }
    }

    /// Loads the store from `path`.
    ///
    /// A missing file gives an empty store. An unreadable or malformed file is
    /// logged and also gives an empty store; it is never an error.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No saved projects yet");
                return Self::with_projects(Some(path), Vec::new());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read saved projects, starting empty");
                return Self::with_projects(Some(path), Vec::new());
            }
        };

        match serde_json::from_str::<Vec<SavedProject>>(&contents) {
            Ok(projects) => {
                info!(path = %path.display(), count = projects.len(), "Loaded saved projects");
                Self::with_projects(Some(path), projects)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Saved projects are malformed, starting empty");
                Self::with_projects(Some(path), Vec::new())
            }
        }
    }

    /// Writes the full project sequence to disk.
    ///
    /// The file is replaced atomically via a sibling temp file. In-memory
    /// stores do nothing.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string(&self.projects)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ForgeError::store_write(path, e.to_string()))?;
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| ForgeError::store_write(path, e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| ForgeError::store_write(path, e.to_string()))?;

        debug!(path = %path.display(), count = self.projects.len(), "Saved projects");
        Ok(())
    }

    /// Prepends a new project and returns its id.
    pub fn insert_new(&mut self, prompt: impl Into<String>, site: GeneratedSite) -> String {
        let mut project = SavedProject::new(prompt, site);
        while self.get(&project.id).is_some() {
            project.id = Uuid::new_v4().to_string();
        }
        let id = project.id.clone();
        self.projects.insert(0, project);
        id
    }

    /// Replaces the site and prompt of an existing project in place.
    ///
    /// The timestamp is refreshed; id and position are unchanged. Returns
    /// `false` when no project has `id`.
    pub fn update(&mut self, id: &str, prompt: impl Into<String>, site: GeneratedSite) -> bool {
        let Some(project) = self.projects.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        project.site = site;
        project.prompt = prompt.into();
        project.timestamp = now_millis();
        true
    }

    /// Removes and returns the project with `id`.
    pub fn remove(&mut self, id: &str) -> Option<SavedProject> {
        let index = self.projects.iter().position(|p| p.id == id)?;
        Some(self.projects.remove(index))
    }

    /// Returns the project with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SavedProject> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Returns all projects, most recent first.
    #[must_use]
    pub fn projects(&self) -> &[SavedProject] {
        &self.projects
    }

    /// Returns the number of saved projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Returns `true` if there are no saved projects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Returns the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn dedupe(projects: Vec<SavedProject>) -> Vec<SavedProject> {
    let mut seen = HashSet::new();
    projects
        .into_iter()
        .filter(|p| {
            let fresh = seen.insert(p.id.clone());
            if !fresh {
                warn!(id = %p.id, "Dropping duplicate saved project");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn site(title: &str) -> GeneratedSite {
        GeneratedSite::new(format!("<h1>{title}</h1>"), "", "", title, "d")
    }

    #[test]
    fn test_insert_new_prepends() {
        let mut store = ProjectStore::in_memory();
        let first = store.insert_new("one", site("One"));
        let second = store.insert_new("two", site("Two"));

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        assert_eq!(store.projects()[0].id, second);
        assert_eq!(store.projects()[1].id, first);
    }

    #[test]
    fn test_update_in_place_keeps_id_and_position() {
        let mut store = ProjectStore::in_memory();
        let old = store.insert_new("old", site("Old"));
        store.insert_new("newer", site("Newer"));
        let before = store.get(&old).unwrap().timestamp;

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.update(&old, "Refinement Request: darker", site("Dark")));

        let project = &store.projects()[1];
        assert_eq!(project.id, old);
        assert_eq!(project.prompt, "Refinement Request: darker");
        assert_eq!(project.title(), "Dark");
        assert!(project.timestamp > before);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut store = ProjectStore::in_memory();
        store.insert_new("one", site("One"));
        assert!(!store.update("missing", "x", site("X")));
        assert_eq!(store.projects()[0].title(), "One");
    }

    #[test]
    fn test_remove() {
        let mut store = ProjectStore::in_memory();
        let a = store.insert_new("a", site("A"));
        let b = store.insert_new("b", site("B"));

        assert_eq!(store.remove(&a).unwrap().id, a);
        assert!(store.remove(&a).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.projects()[0].id, b);
    }

    #[test]
    fn test_with_projects_drops_duplicate_ids() {
        let project = SavedProject::new("p", site("P"));
        let store = ProjectStore::with_projects(None, vec![project.clone(), project]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_saved_project_wire_format() {
        let json = r#"[{
            "id": "42",
            "timestamp": 1767225600000,
            "prompt": "a portfolio site",
            "site": {
                "html": "<div>P</div>", "css": "", "js": "",
                "metadata": { "title": "Portfolio", "description": "d" }
            }
        }]"#;

        let projects: Vec<SavedProject> = serde_json::from_str(json).unwrap();
        assert_eq!(projects[0].id, "42");
        assert_eq!(projects[0].timestamp.timestamp_millis(), 1_767_225_600_000);

        let out = serde_json::to_string(&projects[0]).unwrap();
        assert!(out.contains(r#""timestamp":1767225600000"#));
    }

    #[tokio::test]
    async fn test_persist_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/projects.json");

        let mut store = ProjectStore::load(&path).await;
        assert!(store.is_empty());
        store.insert_new("one", site("One"));
        store.insert_new("two", site("Two"));
        store.persist().await.unwrap();

        let reloaded = ProjectStore::load(&path).await;
        assert_eq!(reloaded.projects(), store.projects());
        assert!(!dir.path().join("nested/projects.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_malformed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.json");
        tokio::fs::write(&path, "{ definitely not a project list").await.unwrap();

        let store = ProjectStore::load(&path).await;
        assert!(store.is_empty());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_load_wrong_shape_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.json");
        tokio::fs::write(&path, r#"[{"id": 1}]"#).await.unwrap();

        assert!(ProjectStore::load(&path).await.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_persist_is_noop() {
        let mut store = ProjectStore::in_memory();
        store.insert_new("x", site("X"));
        store.persist().await.unwrap();
        assert!(store.path().is_none());
    }
}
