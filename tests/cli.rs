//! Integration tests for the savesnap CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const A: &str = "2025-01-01_080000-testhost";
const B: &str = "2025-01-02_080000-testhost";
const C: &str = "2025-01-03_080000-testhost";

/// A source directory with three save files and a backup root with A, B, C
struct Fixture {
    _temp: TempDir,
    config_dir: std::path::PathBuf,
    source: std::path::PathBuf,
    backups: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("config");
        let source = temp.path().join("saves");
        let backups = temp.path().join("backups");

        fs::create_dir_all(&config_dir).unwrap();
        fs::create_dir_all(source.join("blueprints")).unwrap();
        fs::write(source.join("world.sav"), "world state").unwrap();
        fs::write(source.join("settings.cfg"), "fov=90").unwrap();
        fs::write(source.join("blueprints/factory.sbp"), "conveyors").unwrap();

        for name in [A, B, C] {
            fs::create_dir_all(backups.join(name)).unwrap();
            fs::write(backups.join(name).join("world.sav"), name).unwrap();
        }
        fs::write(backups.join("README.txt"), "not a snapshot").unwrap();

        Self {
            _temp: temp,
            config_dir,
            source,
            backups,
        }
    }

    /// A savesnap command isolated from the caller's environment
    fn savesnap(&self) -> Command {
        let mut cmd = Command::cargo_bin("savesnap").unwrap();
        for var in [
            "SAVESNAP_CONFIG",
            "SAVESNAP_SOURCE",
            "SAVESNAP_BACKUP_ROOT",
            "SAVESNAP_HOST_ID",
            "SAVESNAP_MAX_BACKUPS",
            "SAVESNAP_CONCURRENCY",
            "SAVESNAP_TRANSPORT",
            "SAVESNAP_RCLONE",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("SAVESNAP_CONFIG_DIR", &self.config_dir);
        cmd
    }

    fn run(&self) -> Command {
        let mut cmd = self.savesnap();
        cmd.arg("run")
            .arg("--source")
            .arg(&self.source)
            .arg("--backup-root")
            .arg(&self.backups)
            .arg("--host-id")
            .arg("testhost");
        cmd
    }

    fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.backups)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn new_snapshots(entries: &[String]) -> Vec<&String> {
    entries
        .iter()
        .filter(|name| name.ends_with("-testhost") && ![A, B, C].contains(&name.as_str()))
        .collect()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("savesnap").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("copies a local save directory"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_short_help() {
    let mut cmd = Command::cargo_bin("savesnap").unwrap();
    cmd.arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolling snapshot backups"));
}

#[test]
fn test_run_snapshots_and_prunes_oldest() {
    let fixture = Fixture::new();

    fixture
        .run()
        .arg("--max-backups")
        .arg("2")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"))
        .stdout(predicate::str::contains(A))
        .stderr(predicate::str::contains(format!("Deleted snapshot {}", A)));

    let entries = fixture.entries();
    assert!(!entries.contains(&A.to_string()));
    assert!(entries.contains(&B.to_string()));
    assert!(entries.contains(&C.to_string()));
    assert!(entries.contains(&"README.txt".to_string()));

    let created = new_snapshots(&entries);
    assert_eq!(created.len(), 1);
    let snapshot = fixture.backups.join(created[0]);
    assert_eq!(read(&snapshot.join("world.sav")), "world state");
    assert_eq!(read(&snapshot.join("settings.cfg")), "fov=90");
    assert_eq!(read(&snapshot.join("blueprints/factory.sbp")), "conveyors");
}

#[test]
fn test_run_without_cap_keeps_everything() {
    let fixture = Fixture::new();

    fixture
        .run()
        .assert()
        .success()
        .stdout(predicate::str::contains("Snapshot: "))
        .stdout(predicate::str::contains("no retention cap"));

    let entries = fixture.entries();
    assert_eq!(entries.len(), 5);
    assert_eq!(new_snapshots(&entries).len(), 1);
}

#[test]
fn test_zero_max_backups_is_a_config_error() {
    let fixture = Fixture::new();

    fixture
        .run()
        .arg("--max-backups")
        .arg("0")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_backups must be at least 1"));

    assert_eq!(fixture.entries(), vec![A, B, C, "README.txt"]);
}

#[test]
fn test_negative_max_backups_from_env_is_a_config_error() {
    let fixture = Fixture::new();

    fixture
        .run()
        .env("SAVESNAP_MAX_BACKUPS", "-1")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("must not be negative"));

    assert_eq!(fixture.entries().len(), 4);
}

#[test]
fn test_missing_source_value_is_a_config_error() {
    let fixture = Fixture::new();

    fixture
        .savesnap()
        .arg("run")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source directory is required"));
}

#[test]
fn test_missing_source_dir_fails_without_pruning() {
    let fixture = Fixture::new();
    fs::remove_dir_all(&fixture.source).unwrap();

    fixture
        .run()
        .arg("--max-backups")
        .arg("1")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Backup failed"));

    assert_eq!(fixture.entries(), vec![A, B, C, "README.txt"]);
}

#[test]
fn test_config_file_layer() {
    let fixture = Fixture::new();
    let config_file = fixture.config_dir.join("savesnap.json");
    fs::write(
        &config_file,
        format!(
            r#"{{
                "localSource": {:?},
                "backupRoot": {:?},
                "hostId": "testhost",
                "maxBackups": 1
            }}"#,
            fixture.source.to_string_lossy(),
            fixture.backups.to_string_lossy()
        ),
    )
    .unwrap();

    fixture
        .savesnap()
        .arg("run")
        .arg("--config")
        .arg(&config_file)
        .assert()
        .success();

    // The new snapshot doesn't count against the cap
    let entries = fixture.entries();
    assert!(entries.contains(&C.to_string()));
    assert!(!entries.contains(&A.to_string()));
    assert!(!entries.contains(&B.to_string()));
    assert_eq!(new_snapshots(&entries).len(), 1);
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let fixture = Fixture::new();

    fixture
        .run()
        .arg("--config")
        .arg(fixture.config_dir.join("missing.json"))
        .assert()
        .code(2);
}

#[test]
fn test_list_shows_snapshots() {
    let fixture = Fixture::new();

    fixture
        .savesnap()
        .arg("list")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .arg("--max-backups")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains(A))
        .stdout(predicate::str::contains(C))
        .stdout(predicate::str::contains("prune"))
        .stdout(predicate::str::contains("Total: 3 snapshot(s)"));
}

#[test]
fn test_prune_previews_without_force() {
    let fixture = Fixture::new();

    fixture
        .savesnap()
        .arg("prune")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .arg("--max-backups")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("To be deleted:    1"))
        .stdout(predicate::str::contains("--force"));

    assert_eq!(fixture.entries().len(), 4);

    fixture
        .savesnap()
        .arg("prune")
        .arg("--force")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .arg("--max-backups")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 snapshot(s)."));

    assert_eq!(fixture.entries(), vec![B, C, "README.txt"]);
}

#[test]
fn test_prune_preview_as_json() {
    let fixture = Fixture::new();

    let output = fixture
        .savesnap()
        .arg("prune")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .arg("--max-backups")
        .arg("1")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let preview: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(preview["max_backups"], 1);
    assert_eq!(preview["to_delete"], serde_json::json!([A]));
    assert_eq!(preview["ignored"], serde_json::json!(["README.txt"]));
    assert_eq!(fixture.entries().len(), 4);
}

#[test]
fn test_prune_after_run_deletes_nothing_more() {
    let fixture = Fixture::new();

    fixture.run().arg("--max-backups").arg("2").assert().success();
    let after_run = fixture.entries();
    assert_eq!(new_snapshots(&after_run).len(), 1);

    let listing = fixture
        .savesnap()
        .arg("list")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .arg("--max-backups")
        .arg("2")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(listing.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&listing.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row["status"] == "keep"));

    fixture
        .savesnap()
        .arg("prune")
        .arg("--force")
        .arg("--backup-root")
        .arg(&fixture.backups)
        .arg("--max-backups")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("No snapshots to prune"));

    assert_eq!(fixture.entries(), after_run);
}

#[test]
fn test_config_shows_resolved_values() {
    let fixture = Fixture::new();

    fixture
        .savesnap()
        .arg("config")
        .arg("--source")
        .arg(&fixture.source)
        .arg("--backup-root")
        .arg("gdrive:saves")
        .arg("--host-id")
        .arg("testhost")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transport:        rclone"))
        .stdout(predicate::str::contains("Max backups:      unlimited"));
}
