//! Reconciliation passes against a stateful in-memory mailbox and mocked API

mod common;

use common::{create_remote_label, FakeMailbox, MockLabelApi};
use gmail_label_sync::config::DuplicatePolicy;
use gmail_label_sync::error::SyncError;
use gmail_label_sync::models::{LabelDefinition, NewLabel, DEFAULT_TEXT_COLOR};
use gmail_label_sync::reconciler::{reconcile, LabelReconciler};
use std::sync::atomic::Ordering;

fn work_and_personal() -> Vec<LabelDefinition> {
    vec![
        LabelDefinition::new("Work", "#4a86e8"),
        LabelDefinition::new("Personal", "#16a766"),
    ]
}

#[tokio::test]
async fn test_creates_configured_labels_in_empty_mailbox() {
    let mailbox = FakeMailbox::with_labels(&["INBOX", "SENT"]);

    let report = reconcile(&mailbox, &work_and_personal(), DuplicatePolicy::Collapse)
        .await
        .unwrap();

    assert_eq!(report.created_names(), vec!["Work", "Personal"]);
    assert!(report.skipped.is_empty());
    assert_eq!(
        mailbox.label_names(),
        vec!["INBOX", "SENT", "Work", "Personal"]
    );

    let requests = mailbox.create_requests();
    assert_eq!(requests[0].color.background_color, "#4a86e8");
    assert_eq!(requests[0].color.text_color, DEFAULT_TEXT_COLOR);
    assert_eq!(requests[0].label_list_visibility, "labelShow");
    assert_eq!(requests[0].message_list_visibility, "show");
    assert_eq!(requests[1].color.background_color, "#16a766");
}

#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let mailbox = FakeMailbox::with_labels(&["INBOX"]);
    let desired = work_and_personal();

    reconcile(&mailbox, &desired, DuplicatePolicy::Collapse)
        .await
        .unwrap();
    let second = reconcile(&mailbox, &desired, DuplicatePolicy::Collapse)
        .await
        .unwrap();

    assert!(second.created.is_empty());
    assert_eq!(second.skipped, vec!["Work".to_string(), "Personal".to_string()]);
    assert_eq!(mailbox.create_requests().len(), 2);
    assert_eq!(mailbox.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_existing_labels_are_left_alone() {
    let mailbox = FakeMailbox::with_labels(&["Work", "Personal", "Receipts"]);

    let report = reconcile(&mailbox, &work_and_personal(), DuplicatePolicy::Collapse)
        .await
        .unwrap();

    assert!(report.created.is_empty());
    assert!(mailbox.create_requests().is_empty());
    assert_eq!(mailbox.label_names(), vec!["Work", "Personal", "Receipts"]);
}

#[tokio::test]
async fn test_empty_remote_list_creates_everything() {
    let mut api = MockLabelApi::new();
    api.expect_list_labels().times(1).returning(|| Ok(vec![]));
    api.expect_create_label()
        .times(2)
        .returning(|label: &NewLabel| Ok(create_remote_label("Label_new", &label.name)));

    let report = reconcile(&api, &work_and_personal(), DuplicatePolicy::Collapse)
        .await
        .unwrap();
    assert_eq!(report.created.len(), 2);
}

#[tokio::test]
async fn test_label_listed_once_per_pass() {
    let mut api = MockLabelApi::new();
    api.expect_list_labels()
        .times(1)
        .returning(|| Ok(vec![create_remote_label("Label_1", "Work")]));
    api.expect_create_label()
        .times(1)
        .returning(|label: &NewLabel| Ok(create_remote_label("Label_2", &label.name)));

    let report = reconcile(&api, &work_and_personal(), DuplicatePolicy::Collapse)
        .await
        .unwrap();

    assert_eq!(report.created[0].name, "Personal");
    assert_eq!(report.created[0].id, "Label_2");
}

#[tokio::test]
async fn test_duplicate_names_collapse_against_mailbox() {
    let mailbox = FakeMailbox::default();
    let desired = vec![
        LabelDefinition::new("Work", "#ff0000"),
        LabelDefinition::new("Personal", "#16a766"),
        LabelDefinition::new("Work", "#4a86e8"),
    ];

    let report = reconcile(&mailbox, &desired, DuplicatePolicy::Collapse)
        .await
        .unwrap();

    assert_eq!(report.created_names(), vec!["Work", "Personal"]);
    let requests = mailbox.create_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].color.background_color, "#4a86e8");
}

#[tokio::test]
async fn test_duplicate_names_create_each_issues_every_create() {
    let mailbox = FakeMailbox::default();
    let desired = vec![
        LabelDefinition::new("Work", "#ff0000"),
        LabelDefinition::new("Work", "#4a86e8"),
    ];

    reconcile(&mailbox, &desired, DuplicatePolicy::CreateEach)
        .await
        .unwrap();

    // The remote snapshot is taken once, so both entries are issued
    assert_eq!(mailbox.create_requests().len(), 2);
}

#[tokio::test]
async fn test_create_failure_reports_stage() {
    let mut api = MockLabelApi::new();
    api.expect_list_labels().returning(|| Ok(vec![]));
    api.expect_create_label()
        .times(1)
        .returning(|_| Err(SyncError::BadRequest("HTTP 400: Bad Request".to_string())));

    let err = reconcile(&api, &work_and_personal(), DuplicatePolicy::Collapse)
        .await
        .unwrap_err();

    assert!(!err.is_fatal());
    match err {
        SyncError::ReconciliationError { stage, source } => {
            assert_eq!(stage, "creating label 'Work'");
            assert!(matches!(*source, SyncError::BadRequest(_)));
        }
        other => panic!("expected ReconciliationError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_startup_pass_returns_report() {
    let mailbox = FakeMailbox::with_labels(&["Work"]);
    let reconciler = LabelReconciler::new(Box::new(mailbox.clone()), DuplicatePolicy::Collapse);

    let report = reconciler
        .run_startup_pass(&work_and_personal())
        .await
        .expect("pass should succeed");

    assert_eq!(report.created_names(), vec!["Personal"]);
    assert_eq!(report.skipped, vec!["Work".to_string()]);
}

#[tokio::test]
async fn test_startup_pass_survives_listing_failure() {
    let mut api = MockLabelApi::new();
    api.expect_list_labels()
        .returning(|| Err(SyncError::AuthError("token revoked".to_string())));
    api.expect_create_label().times(0);

    let reconciler = LabelReconciler::new(Box::new(api), DuplicatePolicy::Collapse);
    assert!(reconciler.run_startup_pass(&work_and_personal()).await.is_none());
}

#[tokio::test]
async fn test_no_definitions_skips_listing() {
    let mailbox = FakeMailbox::with_labels(&["INBOX"]);

    let report = reconcile(&mailbox, &[], DuplicatePolicy::Collapse)
        .await
        .unwrap();

    assert!(report.is_noop());
    assert_eq!(mailbox.list_calls.load(Ordering::SeqCst), 0);
}
