mod common;

use common::{create_test_dir, default_groups, domain_paths, read_output, read_report, write_input};
use dbx_access_sync::databricks::mock::MockDatabricks;
use dbx_access_sync::groups::load_groups;
use dbx_access_sync::{
    run_export, run_sync, run_validate, AccessDomain, GroupsDomain, SyncError, SyncOptions,
    TableError,
};
use std::sync::Arc;

fn mock() -> Arc<MockDatabricks> {
    Arc::new(
        MockDatabricks::new(42)
            .with_builtin_group("1", "users")
            .with_builtin_group("2", "admins")
            .with_workspace_group("10", "ops", &[])
            .with_account_group("11", "Analysts")
            .with_account_group("12", "unused"),
    )
}

#[tokio::test]
async fn test_sync_assigns_account_groups_and_skips_unknown() {
    let temp_dir = create_test_dir();
    let paths = domain_paths(temp_dir.path(), "groups");
    write_input(&paths, "group_physical_name\nops\nanalysts\nGhosts\n").await;

    let mock = mock();
    let domain = GroupsDomain::new(mock.clone(), mock.clone(), paths.clone(), default_groups());
    let outcome = run_sync(&domain, SyncOptions::default())
        .await
        .expect("Should sync");

    assert_eq!(outcome.result.created, vec!["analysts"]);
    assert_eq!(outcome.result.unchanged, vec!["ops"]);
    assert_eq!(outcome.result.skipped.len(), 1);
    assert_eq!(outcome.result.skipped[0].name, "Ghosts");
    assert_eq!(mock.write_calls().await, vec!["assign 11 USER"]);

    // Ghosts cannot be assigned, so the states still differ
    assert!(!outcome.validation.matched);
    assert_eq!(outcome.validation.diff.missing_entities, vec!["ghosts"]);
    assert!(!outcome.validation.passes(true, false));
    assert!(outcome.validation.passes(false, false));

    assert_eq!(read_output(&paths).await, "group_physical_name\nAnalysts\nops\n");
    let report = read_report(&paths, "groups").await;
    assert_eq!(report["plan"]["toCreate"], 2);
    assert_eq!(report["validation"]["matched"], false);
    assert_eq!(report["export"]["rows"], 2);
}

#[tokio::test]
async fn test_second_sync_sends_nothing() {
    let temp_dir = create_test_dir();
    let paths = domain_paths(temp_dir.path(), "groups");
    write_input(&paths, "group_physical_name\nops\nAnalysts\n").await;

    let mock = mock();
    let domain = GroupsDomain::new(mock.clone(), mock.clone(), paths.clone(), default_groups());
    let first = run_sync(&domain, SyncOptions::default()).await.unwrap();
    assert!(first.validation.matched);

    mock.clear_write_calls().await;
    let domain = GroupsDomain::new(mock.clone(), mock.clone(), paths, default_groups());
    let second = run_sync(&domain, SyncOptions::default()).await.unwrap();

    assert!(!second.plan.needs_changes());
    assert!(second.validation.matched);
    assert!(mock.write_calls().await.is_empty());
}

#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let temp_dir = create_test_dir();
    let paths = domain_paths(temp_dir.path(), "groups");
    write_input(&paths, "group_physical_name\nops\nanalysts\n").await;

    let mock = mock();
    let domain = GroupsDomain::new(mock.clone(), mock.clone(), paths.clone(), default_groups());
    let outcome = run_sync(&domain, SyncOptions { dry_run: true }).await.unwrap();

    assert_eq!(outcome.plan.to_create.len(), 1);
    assert!(outcome.result.created.is_empty());
    assert_eq!(outcome.result.skipped[0].reason, "dry run");
    // analysts is still unassigned, which a dry run tolerates
    assert!(!outcome.validation.matched);
    assert!(outcome.validation.passes(true, true));
    assert!(mock.write_calls().await.is_empty());
    assert_eq!(read_report(&paths, "groups").await["dryRun"], true);
}

#[tokio::test]
async fn test_unexpected_remote_group_fails_validation() {
    let temp_dir = create_test_dir();
    let paths = domain_paths(temp_dir.path(), "groups");
    write_input(&paths, "group_physical_name\n").await;

    let mock = mock();
    let domain = GroupsDomain::new(mock.clone(), mock, paths, default_groups());
    let validation = run_validate(&domain).await.unwrap();

    assert!(!validation.matched);
    assert_eq!(validation.diff.unexpected_entities, vec!["ops"]);
}

#[tokio::test]
async fn test_missing_column_is_fatal() {
    let temp_dir = create_test_dir();
    let paths = domain_paths(temp_dir.path(), "groups");
    write_input(&paths, "name\nops\n").await;

    let mock = mock();
    let domain = GroupsDomain::new(mock.clone(), mock.clone(), paths, default_groups());
    let err = run_sync(&domain, SyncOptions::default()).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::TableError(TableError::MissingColumns { .. })
    ));
    assert!(mock.write_calls().await.is_empty());
}

#[tokio::test]
async fn test_export_reloads_as_remote_state() {
    let temp_dir = create_test_dir();
    let paths = domain_paths(temp_dir.path(), "groups");

    let mock = mock();
    let domain = GroupsDomain::new(mock.clone(), mock, paths.clone(), default_groups());
    let outcome = run_export(&domain).await.expect("Should export");
    assert_eq!(outcome.export.rows, 1);

    let reloaded = load_groups(&paths.output).await.unwrap();
    let remote = domain.read_remote().await.unwrap();
    assert_eq!(
        reloaded.names().collect::<Vec<_>>(),
        remote.names().collect::<Vec<_>>()
    );
}
