//! Replay integration tests.
//!
//! A cassette written with `CassetteRecorder` drives the pipeline twice, once
//! through the library and once through the binary with `NSPEC_REPLAY`, and
//! both runs must produce the recorded documents.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::json;

use nspec::cassette::recorder::CassetteRecorder;
use nspec::context::ServiceContext;
use nspec::pipeline::{CollectingSink, Controller, GenerationSettings};
use nspec::stage::Stage;
use nspec::store::SpecStore;

const REQUIREMENTS: &str = "# Requirements\n\n## User Stories\n- As a user I can add a todo.\n";
const DESIGN: &str = "# Design\n\nOne SQLite table.\n";

fn stream(chunks: &[&str]) -> serde_json::Value {
    json!({
        "chunks": chunks,
        "result": {"Ok": {"prompt_tokens": 12, "completion_tokens": 30, "stop_reason": "end_turn"}},
    })
}

fn write_cassette(dir: &Path) -> PathBuf {
    let path = dir.join("cassettes").join("todo.yaml");
    let mut recorder = CassetteRecorder::new(&path, "todo");
    recorder.record("clock", "now", json!(null), json!("2026-02-01T09:00:00Z"));
    recorder.record(
        "llm",
        "stream_completion",
        json!({"prompt": "A todo app"}),
        stream(&["# Requirements\n\n", "## User Stories\n", "- As a user I can add a todo.\n"]),
    );
    recorder.record("llm", "stream_completion", json!({}), stream(&["# Design\n\n", "One SQLite table.\n"]));
    recorder.write().expect("cassette is written");
    path
}

fn settings() -> GenerationSettings {
    GenerationSettings { model: "claude-sonnet-4-20250514".into(), max_tokens: 1024 }
}

async fn run_pipeline(cassette: &Path, workspace: &Path) -> (String, String) {
    let ctx = ServiceContext::replaying(cassette).unwrap();
    let store = SpecStore::new(&ctx, &workspace.join(".specs"));
    let sink = CollectingSink::default();
    let controller = Controller::new(&ctx, store, &sink, settings());

    controller
        .create_spec("Todo", "A todo app", nspec::spec::GenerationMode::RequirementsFirst, false)
        .await
        .unwrap();
    controller.generate_stage(Stage::Design).await.unwrap();
    assert_eq!(sink.streamed_text(Stage::Requirements), REQUIREMENTS);
    (
        controller.content(Stage::Requirements).unwrap(),
        controller.content(Stage::Design).unwrap(),
    )
}

#[tokio::test]
async fn replay_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let cassette = write_cassette(dir.path());

    let first_ws = dir.path().join("first");
    let second_ws = dir.path().join("second");
    let first = run_pipeline(&cassette, &first_ws).await;
    let second = run_pipeline(&cassette, &second_ws).await;

    assert_eq!(first, (REQUIREMENTS.to_string(), DESIGN.to_string()));
    assert_eq!(first, second);

    let config = std::fs::read_to_string(first_ws.join(".specs/todo/.config.json")).unwrap();
    assert!(config.contains("2026-02-01T09:00:00Z"));
    assert_eq!(std::fs::read_to_string(first_ws.join(".specs/todo/design.md")).unwrap(), DESIGN);
}

#[tokio::test]
async fn exhausted_cassette_fails_the_generation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.yaml");
    CassetteRecorder::new(&path, "empty").write().unwrap();

    let ctx = ServiceContext::replaying(&path).unwrap();
    let store = SpecStore::new(&ctx, &dir.path().join(".specs"));
    let sink = CollectingSink::default();
    let controller = Controller::new(&ctx, store, &sink, settings());
    let err = controller
        .create_spec("Todo", "A todo app", nspec::spec::GenerationMode::RequirementsFirst, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Cassette exhausted") || err.to_string().contains("no interactions"));
    assert!(!dir.path().join(".specs/todo/requirements.md").exists());
    assert_eq!(sink.errors(), vec![err.to_string()]);
}

fn nspec(workspace: &Path, cassette: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_nspec"))
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .env("NSPEC_REPLAY", cassette)
        .env_remove("NSPEC_RECORD")
        .output()
        .expect("failed to run nspec binary")
}

#[test]
fn binary_replays_new_and_generate() {
    let dir = tempfile::tempdir().unwrap();
    let cassette = write_cassette(dir.path());
    let workspace = dir.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();

    let created = nspec(&workspace, &cassette, &["new", "Todo", "A todo app"]);
    assert!(created.status.success(), "{}", String::from_utf8_lossy(&created.stderr));
    assert_eq!(String::from_utf8_lossy(&created.stdout), REQUIREMENTS);
    assert_eq!(
        std::fs::read_to_string(workspace.join(".specs/todo/requirements.md")).unwrap(),
        REQUIREMENTS
    );

    let listed = nspec(&workspace, &cassette, &["list"]);
    assert!(String::from_utf8_lossy(&listed.stdout).contains("todo"));
}

#[test]
fn binary_replays_a_jira_story() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jira.yaml");
    let mut recorder = CassetteRecorder::new(&path, "jira");
    recorder.record(
        "issues",
        "fetch_issue",
        json!({"api_base": "https://acme.atlassian.net", "key": "APP-3"}),
        json!({"Ok": {
            "key": "APP-3",
            "summary": "Share lists",
            "description": {"type": "doc", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Invite by email."}]}]},
            "issue_type": "Story",
        }}),
    );
    recorder.record("clock", "now", json!(null), json!("2026-02-01T09:00:00Z"));
    recorder.record("llm", "stream_completion", json!({}), stream(&["# Requirements\n"]));
    recorder.write().unwrap();

    let workspace = dir.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    let output = nspec(&workspace, &path, &["new", "Share lists", "--jira", "https://acme.atlassian.net/browse/APP-3"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Imported APP-3"));
    assert!(workspace.join(".specs/share-lists/requirements.md").exists());
}
