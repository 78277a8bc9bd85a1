use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{TimeZone, Utc};

use crate::commands::backup::{
    build_addon_archive, build_database_archive, run, BuildContext, DatabaseArchiveRequest,
};
use crate::config::{Compression, ToolsConfig};
use crate::error::OdaError;
use crate::platform::shell::CommandSpec;
use crate::testutil::{test_config, test_connection, touch, FakeConnector, RecordingRunner};
use crate::tools::Toolbox;

const PREFIX: &str = "2024_01_15_10_30_00";

fn arg_after(spec: &CommandSpec, flag: &str) -> PathBuf {
    let idx = spec.args.iter().position(|a| a == flag).unwrap();
    PathBuf::from(&spec.args[idx + 1])
}

/// Fakes pg_dump output and records the staging entries visible when tar runs.
fn staging_observer() -> (RecordingRunner, Rc<RefCell<Vec<String>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let runner = RecordingRunner::new().with_hook(move |spec| match spec.tool() {
        "pg_dump" => std::fs::write(arg_after(spec, "--file"), b"-- dump").unwrap(),
        "tar" => {
            let mut entries: Vec<String> = std::fs::read_dir(arg_after(spec, "-C"))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect();
            entries.sort();
            *sink.borrow_mut() = entries;
        }
        _ => {}
    });
    (runner, seen)
}

fn request<'a>(
    conn: &'a crate::db::ConnectionDescriptor,
    root: &'a Path,
    dest: &'a Path,
) -> DatabaseArchiveRequest<'a> {
    DatabaseArchiveRequest {
        conn,
        filestore_root: root,
        destination_dir: dest,
        prefix: PREFIX,
        release: None,
    }
}

#[test]
fn database_archive_stages_three_entries_then_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    touch(&data.join("filestore/mycompany/ab"), "abcdef");
    let dest = tmp.path().join("backups");
    let conn = test_connection("mycompany");
    let tools = ToolsConfig::default();
    let (runner, seen) = staging_observer();
    let connector = FakeConnector::with_manifest_rows();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let archive = build_database_archive(&ctx, &request(&conn, &data, &dest)).unwrap();

    assert_eq!(
        archive,
        dest.join("2024_01_15_10_30_00__mycompany.tar.zst")
    );
    assert_eq!(runner.labels(), ["pg_dump", "tar"]);
    assert_eq!(*seen.borrow(), ["dump.sql", "filestore", "manifest.json"]);
    assert!(!dest.join("2024_01_15_10_30_00__mycompany").exists());
    assert_eq!(connector.state().opened, 1);
    assert_eq!(connector.state().closed, 1);
}

#[test]
fn filestore_is_copied_into_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let blob_dir = data.join("filestore/mycompany/ab");
    std::fs::create_dir_all(&blob_dir).unwrap();
    std::fs::write(blob_dir.join("abcdef"), b"attachment").unwrap();
    let dest = tmp.path().join("backups");
    let conn = test_connection("mycompany");
    let tools = ToolsConfig::default();
    let copied = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&copied);
    let runner = RecordingRunner::new().with_hook(move |spec| {
        if spec.tool() == "tar" {
            let blob = arg_after(spec, "-C").join("filestore/ab/abcdef");
            *sink.borrow_mut() = std::fs::read(blob).ok();
        }
    });
    let connector = FakeConnector::with_manifest_rows();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::None,
    };

    build_database_archive(&ctx, &request(&conn, &data, &dest)).unwrap();

    assert_eq!(copied.borrow().as_deref(), Some(&b"attachment"[..]));
}

#[test]
fn missing_filestore_still_archives() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("backups");
    let conn = test_connection("fresh");
    let tools = ToolsConfig::default();
    let (runner, seen) = staging_observer();
    let connector = FakeConnector::with_manifest_rows();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Gzip,
    };

    let archive =
        build_database_archive(&ctx, &request(&conn, &tmp.path().join("nodata"), &dest)).unwrap();

    assert!(archive.to_string_lossy().ends_with("__fresh.tar.gz"));
    assert!(seen.borrow().contains(&"filestore".to_string()));
}

#[test]
fn dump_failure_is_reported_and_staging_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("backups");
    let conn = test_connection("mycompany");
    let tools = ToolsConfig::default();
    let runner = RecordingRunner::failing("pg_dump");
    let connector = FakeConnector::with_manifest_rows();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let err = build_database_archive(&ctx, &request(&conn, tmp.path(), &dest)).unwrap_err();

    assert!(matches!(err, OdaError::DumpFailed { ref database, .. } if database == "mycompany"));
    assert_eq!(runner.labels(), ["pg_dump"]);
    assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
}

#[test]
fn manifest_failure_is_distinct() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("backups");
    let conn = test_connection("mycompany");
    let tools = ToolsConfig::default();
    let runner = RecordingRunner::new();
    let connector = FakeConnector::new().refusing_connections();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let err = build_database_archive(&ctx, &request(&conn, tmp.path(), &dest)).unwrap_err();

    assert!(matches!(err, OdaError::ManifestQueryFailed(_)));
    assert_eq!(runner.labels(), ["pg_dump"]);
    assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
}

#[test]
fn tar_failure_is_archive_write_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("backups");
    let conn = test_connection("mycompany");
    let tools = ToolsConfig::default();
    let runner = RecordingRunner::failing("tar");
    let connector = FakeConnector::with_manifest_rows();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let err = build_database_archive(&ctx, &request(&conn, tmp.path(), &dest)).unwrap_err();

    assert!(matches!(err, OdaError::ArchiveWriteFailed { .. }));
    assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
}

#[test]
fn existing_staging_directory_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("backups");
    std::fs::create_dir_all(dest.join("2024_01_15_10_30_00__mycompany")).unwrap();
    let conn = test_connection("mycompany");
    let tools = ToolsConfig::default();
    let runner = RecordingRunner::new();
    let connector = FakeConnector::with_manifest_rows();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let err = build_database_archive(&ctx, &request(&conn, tmp.path(), &dest)).unwrap_err();

    assert!(matches!(err, OdaError::StagingExists(_)));
    assert!(runner.calls().is_empty());
    // the other build's staging directory is left alone
    assert!(dest.join("2024_01_15_10_30_00__mycompany").is_dir());
}

#[test]
fn addon_archive_named_after_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let addon = tmp.path().join("custom_addons");
    touch(&addon.join("my_module"), "__manifest__.py");
    let tools = ToolsConfig::default();
    let runner = RecordingRunner::new();
    let connector = FakeConnector::new();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let archive = build_addon_archive(&ctx, &addon, tmp.path(), PREFIX, "mycompany")
        .unwrap()
        .unwrap();

    assert_eq!(
        archive.file_name().unwrap(),
        "2024_01_15_10_30_00__mycompany__custom_addons.tar.zst"
    );
    let calls = runner.calls();
    let crate::testutil::RecordedCall::Run(spec) = &calls[0] else {
        panic!("expected a tar run");
    };
    assert_eq!(arg_after(spec, "-C"), addon);
}

#[test]
fn empty_addon_directory_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let addon = tmp.path().join("empty");
    std::fs::create_dir(&addon).unwrap();
    let tools = ToolsConfig::default();
    let runner = RecordingRunner::new();
    let connector = FakeConnector::new();
    let ctx = BuildContext {
        runner: &runner,
        connector: &connector,
        tools: Toolbox::new(&tools),
        compression: Compression::Zstd,
    };

    let result = build_addon_archive(&ctx, &addon, tmp.path(), PREFIX, "mycompany").unwrap();

    assert!(result.is_none());
    assert!(runner.calls().is_empty());
}

#[test]
fn backup_run_archives_database_and_addons() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    touch(&config.addons[0].join("my_module"), "__init__.py");
    let (runner, _) = staging_observer();
    let connector = FakeConnector::with_manifest_rows();
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

    let report = run(&config, &runner, &connector, &now, true).unwrap();

    assert_eq!(report.prefix, PREFIX);
    assert_eq!(
        report.database_archive,
        config.backups_dir.join("2024_01_15_10_30_00__mycompany.tar")
    );
    assert_eq!(
        report.addon_archives,
        [config
            .backups_dir
            .join("2024_01_15_10_30_00__mycompany__custom_addons.tar")]
    );
    assert_eq!(runner.labels(), ["pg_dump", "tar", "tar"]);
}
