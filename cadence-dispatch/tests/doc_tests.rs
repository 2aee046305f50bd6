mod common;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use cadence_core::reader::{FileInfo, FsWorkspaceReader, WorkspaceReader};
use cadence_core::{EventKind, ReadError};
use cadence_dispatch::{
    DocHandler, ExportFormat, ExportMode, ExportOptions, HandleError, RULES_ARTIFACT,
};

use common::{DocCall, Fixture, RecordingGenerator};

fn doc_handler(generator: &Arc<RecordingGenerator>) -> DocHandler {
    DocHandler::new(generator.clone(), Arc::new(FsWorkspaceReader))
}

#[test]
fn open_generates_both_missing_artifacts() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());

    let generated = doc_handler(&generator)
        .ensure_artifacts(&fx.workspace)
        .unwrap();

    assert_eq!(generated, 2);
    assert_eq!(
        generator.calls(),
        vec![
            DocCall::GenerateRules,
            DocCall::ExportRules(ExportOptions {
                out_dir: fx.workspace.join(".roo/rules-code"),
                format: ExportFormat::Markdown,
                mode: ExportMode::Single,
                filename: Some("generated-rules.md".into()),
            }),
            DocCall::GenerateWiki,
            DocCall::ExportWiki(ExportOptions {
                out_dir: fx.workspace.join(".costrict/wiki"),
                format: ExportFormat::Markdown,
                mode: ExportMode::Multi,
                filename: None,
            }),
        ]
    );
}

#[test]
fn existing_artifacts_are_not_regenerated() {
    let fx = Fixture::new();
    fx.write_file(".roo/rules-code/generated-rules.md", "# rules");
    fx.write_file(".costrict/wiki/index.md", "# wiki");
    let generator = Arc::new(RecordingGenerator::default());

    let generated = doc_handler(&generator)
        .ensure_artifacts(&fx.workspace)
        .unwrap();

    assert_eq!(generated, 0);
    assert!(generator.calls().is_empty());
}

#[test]
fn only_the_missing_artifact_is_generated() {
    let fx = Fixture::new();
    fx.write_file(".roo/rules-code/generated-rules.md", "# rules");
    let generator = Arc::new(RecordingGenerator::default());

    doc_handler(&generator)
        .ensure_artifacts(&fx.workspace)
        .unwrap();

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], DocCall::GenerateWiki);
}

/// Filesystem reader whose `exists` fails for anything under `.roo`.
struct UnreadableRules;

impl WorkspaceReader for UnreadableRules {
    fn stat(&self, path: &Path) -> Result<FileInfo, ReadError> {
        FsWorkspaceReader.stat(path)
    }

    fn exists(&self, path: &Path) -> Result<bool, ReadError> {
        if path.components().any(|c| c.as_os_str() == ".roo") {
            return Err(ReadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        FsWorkspaceReader.exists(path)
    }
}

#[test]
fn unreadable_marker_counts_as_absent() {
    let fx = Fixture::new();
    fx.write_file(".costrict/wiki/index.md", "# wiki");
    let generator = Arc::new(RecordingGenerator::default());
    let handler = DocHandler::new(generator.clone(), Arc::new(UnreadableRules));

    let generated = handler.ensure_artifacts(&fx.workspace).unwrap();

    assert_eq!(generated, 1);
    assert_eq!(generator.calls()[0], DocCall::GenerateRules);
    assert_eq!(generator.calls().len(), 2);
}

#[test]
fn one_failure_does_not_block_the_other_artifact() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());
    generator.fail_rules.store(true, Ordering::SeqCst);

    let err = doc_handler(&generator)
        .ensure_artifacts(&fx.workspace)
        .unwrap_err();

    assert!(matches!(err, HandleError::Delegation { operation: "generate rules", .. }));
    assert!(generator.calls().contains(&DocCall::GenerateWiki));
}

#[test]
fn both_failures_are_accumulated() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());
    generator.fail_rules.store(true, Ordering::SeqCst);
    generator.fail_wiki.store(true, Ordering::SeqCst);

    let err = doc_handler(&generator)
        .ensure_artifacts(&fx.workspace)
        .unwrap_err();

    match &err {
        HandleError::Multiple(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("rules generator crashed"));
    assert!(message.contains("wiki generator crashed"));
}

#[test]
fn missing_workspace_is_an_error() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());

    let err = doc_handler(&generator)
        .ensure_artifacts(&fx.workspace.join("nope"))
        .unwrap_err();

    assert!(matches!(err, HandleError::NotExists(_)));
    assert!(generator.calls().is_empty());
}

#[test]
fn file_events_are_ignored() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());
    let handler = doc_handler(&generator);

    for kind in [
        EventKind::AddFile {
            path: fx.workspace.join("a.rs"),
        },
        EventKind::RebuildWorkspace,
    ] {
        let event = fx.publish(kind);
        handler.handle(&event).unwrap();
    }

    assert!(generator.calls().is_empty());
}

#[test]
fn open_event_runs_the_flow() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());
    let event = fx.publish(EventKind::OpenWorkspace);

    doc_handler(&generator).handle(&event).unwrap();

    assert_eq!(generator.calls().len(), 4);
}

#[test]
fn process_workspaces_tallies_each_workspace() {
    let fx = Fixture::new();
    let generator = Arc::new(RecordingGenerator::default());
    let handler = doc_handler(&generator).with_artifacts(vec![RULES_ARTIFACT]);

    let report =
        handler.process_workspaces(&[fx.workspace.clone(), fx.workspace.join("missing")]);

    assert_eq!(report.workspaces, 2);
    assert_eq!(report.generated, 1);
    assert_eq!(report.failed, 1);
}
