//! Integration tests for the studio against a file-backed project library.
//!
//! These tests drive `Studio` through its public API with a scripted
//! generator and check what ends up on disk.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use forge_client::{Attachment, ClientError, GeneratedSite, SiteGenerator};
use forge_orchestrator::{
    ForgeError, GenerationOutcome, GenerationStatus, ProjectStore, SavedProject,
    StaticCredentialFlow, Studio,
};
use tempfile::TempDir;

/// Generator that answers from a queue and records what it was sent.
#[derive(Default)]
struct QueueGenerator {
    answers: Mutex<Vec<Result<GeneratedSite, ClientError>>>,
    seen: Mutex<Vec<(String, Option<GeneratedSite>, Vec<Attachment>)>>,
}

impl QueueGenerator {
    fn answering(answers: Vec<Result<GeneratedSite, ClientError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl SiteGenerator for QueueGenerator {
    async fn generate(
        &self,
        prompt: &str,
        prior: Option<&GeneratedSite>,
        attachments: &[Attachment],
    ) -> Result<GeneratedSite, ClientError> {
        self.seen
            .lock()
            .unwrap()
            .push((prompt.to_string(), prior.cloned(), attachments.to_vec()));
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            return Err(ClientError::parse("no scripted answer left", ""));
        }
        answers.remove(0)
    }
}

fn portfolio() -> GeneratedSite {
    GeneratedSite::new("<div>P</div>", "", "", "Portfolio", "d")
}

fn dark_portfolio() -> GeneratedSite {
    GeneratedSite::new("<div class=\"dark\">P</div>", "body{background:#000}", "", "Portfolio", "d")
}

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join(".forge").join("projects.json")
}

async fn studio_at(path: &PathBuf, generator: Arc<QueueGenerator>) -> Studio {
    Studio::new(
        generator,
        Arc::new(StaticCredentialFlow),
        ProjectStore::load(path).await,
    )
}

#[tokio::test]
async fn test_new_generation_is_saved_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let generator = QueueGenerator::answering(vec![Ok(portfolio())]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;

    let outcome = studio
        .request_generation("a portfolio site", false)
        .await
        .unwrap();
    let GenerationOutcome::Created { id } = outcome else {
        panic!("expected a new project, got {outcome:?}");
    };

    let snapshot = studio.snapshot().await;
    assert_eq!(snapshot.status, GenerationStatus::Completed);
    assert_eq!(snapshot.current_project_id.as_deref(), Some(id.as_str()));
    assert_eq!(snapshot.displayed_site, Some(portfolio()));
    assert!(snapshot.prompt.is_empty());

    let reloaded = ProjectStore::load(&path).await;
    assert_eq!(reloaded.len(), 1);
    let saved = reloaded.get(&id).unwrap();
    assert_eq!(saved.site, portfolio());
    assert_eq!(saved.prompt, "a portfolio site");
    assert_eq!(reloaded.projects(), studio.projects().await.as_slice());
}

#[tokio::test]
async fn test_refinement_updates_project_in_place() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    let mut older = SavedProject::new("a blog", GeneratedSite::new("<p/>", "", "", "Blog", "b"));
    older.id = "7".to_string();
    let mut target = SavedProject::new("a portfolio site", portfolio());
    target.id = "42".to_string();
    let seeded = ProjectStore::with_projects(Some(path.clone()), vec![target.clone(), older]);
    seeded.persist().await.unwrap();

    let generator = QueueGenerator::answering(vec![Ok(dark_portfolio())]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;

    studio.load_project("42").await.unwrap();
    let outcome = studio.request_generation("make it dark", true).await.unwrap();
    assert_eq!(outcome, GenerationOutcome::Refined { id: "42".to_string() });

    {
        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].0, "make it dark");
        assert_eq!(seen[0].1, Some(portfolio()));
    }

    let reloaded = ProjectStore::load(&path).await;
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.projects()[0].id, "42");
    assert_eq!(reloaded.projects()[1].id, "7");

    let refined = reloaded.get("42").unwrap();
    assert_eq!(refined.site, dark_portfolio());
    assert_eq!(refined.prompt, "Refinement Request: make it dark");
    assert!(refined.timestamp >= target.timestamp);
}

#[tokio::test]
async fn test_parse_error_leaves_library_untouched() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let generator = QueueGenerator::answering(vec![
        Ok(portfolio()),
        Err(ClientError::parse("missing required field 'html'", "{}")),
    ]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;

    let first = studio.request_generation("a portfolio site", false).await.unwrap();
    let before = ProjectStore::load(&path).await;

    let err = studio.request_generation("add a contact form", true).await.unwrap_err();
    assert!(matches!(err, ForgeError::ParseError { .. }));

    let snapshot = studio.snapshot().await;
    assert_eq!(snapshot.status, GenerationStatus::Error);
    assert_eq!(snapshot.current_project_id.as_deref(), first.project_id());
    assert_eq!(snapshot.prompt, "add a contact form");
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Could not process the model's response. Please try again.")
    );

    let after = ProjectStore::load(&path).await;
    assert_eq!(before.projects(), after.projects());
}

#[tokio::test]
async fn test_empty_request_makes_no_call() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let generator = QueueGenerator::answering(vec![Ok(portfolio())]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;

    let outcome = studio.request_generation("   ", false).await.unwrap();

    assert_eq!(outcome, GenerationOutcome::Skipped);
    assert_eq!(generator.calls(), 0);
    assert_eq!(studio.snapshot().await.status, GenerationStatus::Idle);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_delete_displayed_project_clears_display() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let generator = QueueGenerator::answering(vec![Ok(portfolio()), Ok(dark_portfolio())]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;

    let first = studio.request_generation("first", false).await.unwrap();
    let second = studio.request_generation("second", false).await.unwrap();
    let displayed = second.project_id().unwrap().to_string();

    assert!(studio.delete_project(&displayed).await.unwrap());
    assert!(!studio.delete_project(&displayed).await.unwrap());

    let snapshot = studio.snapshot().await;
    assert!(snapshot.displayed_site.is_none());
    assert!(snapshot.current_project_id.is_none());

    let reloaded = ProjectStore::load(&path).await;
    assert_eq!(reloaded.len(), 1);
    assert_eq!(Some(reloaded.projects()[0].id.as_str()), first.project_id());
}

#[tokio::test]
async fn test_attachments_sent_and_unreadable_files_skipped() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let logo = dir.path().join("logo.png");
    std::fs::write(&logo, [0x89, b'P', b'N', b'G']).unwrap();
    let missing = dir.path().join("missing.pdf");

    let generator = QueueGenerator::answering(vec![Ok(portfolio())]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;

    let report = studio.attach_files(vec![logo, missing.clone()]).await;
    assert_eq!(report.attached, vec!["logo.png".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, missing);

    // An attachment alone is enough to generate.
    studio.request_generation("", false).await.unwrap();

    let seen = generator.seen.lock().unwrap();
    let sent = &seen[0].2;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "logo.png");
    assert_eq!(sent[0].mime_type, "image/png");
    assert_eq!(sent[0].data, "iVBORw==");
    drop(seen);

    assert!(studio.snapshot().await.pending_attachments.is_empty());
}

#[tokio::test]
async fn test_malformed_store_starts_empty_and_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let generator = QueueGenerator::answering(vec![Ok(portfolio())]);
    let studio = studio_at(&path, Arc::clone(&generator)).await;
    assert_eq!(studio.snapshot().await.project_count, 0);

    studio.request_generation("a portfolio site", false).await.unwrap();
    assert_eq!(ProjectStore::load(&path).await.len(), 1);
}
