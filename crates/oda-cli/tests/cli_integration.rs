use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct CliFixture {
    tmp: TempDir,
    home_dir: PathBuf,
    backups_dir: PathBuf,
    config_path: PathBuf,
}

impl CliFixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let home_dir = tmp.path().join("home");
        let backups_dir = tmp.path().join("backups");
        let config_path = tmp.path().join("oda.yaml");

        std::fs::create_dir_all(&home_dir).unwrap();
        std::fs::create_dir_all(&backups_dir).unwrap();

        Self {
            tmp,
            home_dir,
            backups_dir,
            config_path,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(oda_binary_path());
        cmd.args(args);
        cmd.current_dir(self.tmp.path());
        cmd.env("HOME", &self.home_dir);
        cmd.env("XDG_CONFIG_HOME", self.home_dir.join(".config"));
        cmd.env_remove("ODA_CONFIG");
        cmd.env_remove("RUST_LOG");
        cmd.env("NO_COLOR", "1");
        cmd.output().unwrap()
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "command failed: {:?}\nstdout:\n{}\nstderr:\n{}",
                args,
                stdout(&output),
                stderr(&output)
            );
        }
        stdout(&output)
    }

    fn run_err(&self, args: &[&str]) -> (String, String) {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "command unexpectedly succeeded: {:?}\nstdout:\n{}\nstderr:\n{}",
            args,
            stdout(&output),
            stderr(&output)
        );
        (stdout(&output), stderr(&output))
    }

    fn cfg(&self) -> String {
        self.config_path.to_string_lossy().to_string()
    }

    fn archive(&self, name: &str) -> PathBuf {
        let path = self.backups_dir.join(name);
        std::fs::write(&path, b"archive").unwrap();
        path
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn oda_binary_path() -> PathBuf {
    if let Some(path) = std::env::var_os("CARGO_BIN_EXE_oda") {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().expect("failed to resolve current test binary path");
    let debug_dir = current_exe
        .parent()
        .and_then(|p| p.parent())
        .expect("unexpected test binary path layout");
    let candidate = debug_dir.join("oda");
    assert!(
        candidate.exists(),
        "unable to locate oda binary at {:?}",
        candidate
    );
    candidate
}

fn yaml_quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

fn write_config(fx: &CliFixture, keep: usize) {
    let config = format!(
        "backups_dir: {}\ndatabase:\n  name: mycompany\n  user: odoo\ndata_dir: {}\nretention:\n  keep: {keep}\n",
        yaml_quote_path(&fx.backups_dir),
        yaml_quote_path(&fx.tmp.path().join("data")),
    );
    std::fs::write(&fx.config_path, config).unwrap();
}

#[test]
fn list_shows_archives_of_the_configured_database() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    fx.archive("2024_01_15_10_30_00__mycompany.tar.zst");
    fx.archive("2024_01_15_10_30_00__mycompany__custom_addons.tar.zst");
    fx.archive("2024_01_16_10_30_00__other.tar.zst");
    fx.archive("notes.txt");

    let out = fx.run_ok(&["--config", &fx.cfg(), "list"]);
    assert!(out.contains("2024_01_15_10_30_00__mycompany.tar.zst"));
    assert!(out.contains("2024_01_15_10_30_00__mycompany__custom_addons.tar.zst"));
    assert!(out.contains("custom_addons"));
    assert!(out.contains("2024-01-15 10:30:00"));
    assert!(!out.contains("other"));
    assert!(!out.contains("notes.txt"));

    let all = fx.run_ok(&["--config", &fx.cfg(), "list", "--any"]);
    assert!(all.contains("2024_01_16_10_30_00__other.tar.zst"));
}

#[test]
fn list_reports_empty_directory() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    let out = fx.run_ok(&["--config", &fx.cfg(), "list"]);
    assert!(out.contains("No archives found."));
}

#[test]
fn config_is_found_in_working_directory() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    fx.archive("2024_01_15_10_30_00__mycompany.tar.zst");

    let out = fx.run_ok(&["list"]);
    assert!(out.contains("2024_01_15_10_30_00__mycompany.tar.zst"));
}

#[test]
fn missing_config_lists_searched_locations() {
    let fx = CliFixture::new();
    let (_, err) = fx.run_err(&["list"]);
    assert!(err.contains("no configuration file found"));
    assert!(err.contains("oda.yaml"));
}

#[test]
fn database_settings_can_come_from_odoo_conf() {
    let fx = CliFixture::new();
    let odoo_conf = fx.tmp.path().join("odoo.conf");
    std::fs::write(
        &odoo_conf,
        "[options]\ndb_name = fromconf\ndb_user = odoo\ndb_password = False\n",
    )
    .unwrap();
    std::fs::write(
        &fx.config_path,
        format!(
            "backups_dir: {}\ndatabase:\n  odoo_conf: {}\n",
            yaml_quote_path(&fx.backups_dir),
            yaml_quote_path(&odoo_conf)
        ),
    )
    .unwrap();
    fx.archive("2024_01_15_10_30_00__fromconf.tar.zst");

    let out = fx.run_ok(&["--config", &fx.cfg(), "list"]);
    assert!(out.contains("2024_01_15_10_30_00__fromconf.tar.zst"));
}

#[test]
fn trim_dry_run_then_trim() {
    let fx = CliFixture::new();
    write_config(&fx, 2);
    let oldest = fx.archive("2024_01_13_10_30_00__mycompany.tar.zst");
    fx.archive("2024_01_14_10_30_00__mycompany.tar.zst");
    fx.archive("2024_01_15_10_30_00__mycompany.tar.zst");
    let other = fx.archive("2024_01_01_10_30_00__other.tar.zst");

    let dry = fx.run_ok(&["--config", &fx.cfg(), "trim", "--dry-run"]);
    assert!(dry.contains("delete 2024_01_13_10_30_00__mycompany.tar.zst"));
    assert!(dry.contains("would keep 2 and delete 1"));
    assert!(oldest.exists());

    let out = fx.run_ok(&["--config", &fx.cfg(), "trim"]);
    assert!(out.contains("Deleted 1 archives"));
    assert!(!oldest.exists());
    assert!(other.exists());

    let out = fx.run_ok(&["--config", &fx.cfg(), "trim", "--all", "--limit", "1"]);
    assert!(out.contains("Deleted 1 archives (kept 2)"));
}

#[test]
fn trim_refuses_zero_limit() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    let archive = fx.archive("2024_01_15_10_30_00__mycompany.tar.zst");

    let (_, err) = fx.run_err(&["--config", &fx.cfg(), "trim", "--limit", "0"]);
    assert!(err.contains("limit of 0"));
    assert!(archive.exists());
}

#[test]
fn restore_refuses_without_confirmation_when_not_interactive() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    fx.archive("2024_01_15_10_30_00__mycompany.tar.zst");

    let (_, err) = fx.run_err(&[
        "--config",
        &fx.cfg(),
        "restore",
        "2024_01_15_10_30_00__mycompany.tar.zst",
    ]);
    assert!(err.contains("non-interactive"));
    assert!(err.contains("--yes"));
}

#[test]
fn restore_requires_an_archive_name_when_not_interactive() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    fx.archive("2024_01_15_10_30_00__mycompany.tar.zst");

    let (_, err) = fx.run_err(&["--config", &fx.cfg(), "restore", "--yes"]);
    assert!(err.contains("no archive given"));
}

#[test]
fn restore_of_another_database_needs_any() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    fx.archive("2024_01_15_10_30_00__other.tar.zst");

    let (_, err) = fx.run_err(&[
        "--config",
        &fx.cfg(),
        "restore",
        "--yes",
        "2024_01_15_10_30_00__other.tar.zst",
    ]);
    assert!(err.contains("--any"));
}

#[test]
fn neutralize_refuses_without_confirmation_when_not_interactive() {
    let fx = CliFixture::new();
    write_config(&fx, 10);
    let (_, err) = fx.run_err(&["--config", &fx.cfg(), "neutralize"]);
    assert!(err.contains("non-interactive"));
}

#[test]
fn config_generates_template_and_refuses_overwrite() {
    let fx = CliFixture::new();
    let dest = fx.tmp.path().join("generated/oda.yaml");
    let dest_str = dest.to_string_lossy().to_string();

    let out = fx.run_ok(&["config", &dest_str]);
    assert!(out.contains("Config written to:"));
    let contents = std::fs::read_to_string(&dest).unwrap();
    assert!(contents.contains("backups_dir:"));
    assert!(contents.contains("odoo_conf:"));

    let (_, err) = fx.run_err(&["config", &dest_str]);
    assert!(err.contains("file already exists"));
}
