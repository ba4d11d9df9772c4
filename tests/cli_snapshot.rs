//! Behavioural tests for the `snapctl` commands against a fixture fleet.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::{Value, json};
use tempfile::TempDir;

const FIXTURE_ENV: &str = "SNAPCTL_FAKE_FLEET";

fn machine(id: &str, project: Option<&str>, volumes: &[&str], faults: &Value) -> Value {
    let tags = project.map_or_else(|| json!({}), |name| json!({ "Project": name }));
    let volumes: Vec<Value> = volumes
        .iter()
        .map(|volume_id| {
            json!({
                "id": volume_id,
                "instance_id": id,
                "availability_zone": "fr-par-1",
                "size_gb": 20,
                "volume_type": "b_ssd",
            })
        })
        .collect();
    json!({
        "instance": {
            "id": id,
            "instance_type": "DEV1-S",
            "availability_zone": "fr-par-1",
            "power_state": "running",
            "tags": tags,
        },
        "volumes": volumes,
        "faults": faults,
    })
}

struct Fleet {
    _tmp: TempDir,
    path: Utf8PathBuf,
}

impl Fleet {
    fn write(machines: Vec<Value>) -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap_or_else(
            |non_utf8_path| panic!("temp dir should be utf8: {}", non_utf8_path.display()),
        );
        let body = json!({ "machines": machines }).to_string();
        Dir::open_ambient_dir(&root, ambient_authority())
            .unwrap_or_else(|err| panic!("open temp dir: {err}"))
            .write("fleet.json", body)
            .unwrap_or_else(|err| panic!("write fixture: {err}"));
        Self {
            path: root.join("fleet.json"),
            _tmp: tmp,
        }
    }

    fn demo(faults_for_a: &Value) -> Self {
        Self::write(vec![
            machine("i-a", Some("demo"), &["vol-1"], faults_for_a),
            machine("i-b", Some("demo"), &["vol-2", "vol-3"], &json!({})),
            machine("i-c", None, &["vol-4"], &json!({})),
        ])
    }

    fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("snapctl");
        cmd.env(FIXTURE_ENV, self.path.as_str());
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn snapshot_cycles_every_project_instance() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.args(["snapshot", "--project", "demo"]);

    cmd.assert()
        .success()
        .stdout(contains("i-a: snapshot snap-0001 requested for volume vol-1"))
        .stdout(contains("i-b: success (running)"))
        .stdout(contains("2 instance(s): 2 succeeded, 0 failed, 0 skipped"))
        .stdout(contains("i-c").not());
}

#[test]
fn snapshot_exits_non_zero_when_an_instance_fails() {
    let fleet = Fleet::demo(&json!({ "stop": "reject" }));
    let mut cmd = fleet.command();
    cmd.args(["snapshot", "--project", "demo"]);

    cmd.assert()
        .code(1)
        .stdout(contains("i-a: failed at stopping: stop rejected for i-a"))
        .stdout(contains("i-b: success (running)"))
        .stdout(contains("2 instance(s): 1 succeeded, 1 failed, 0 skipped"));
}

#[test]
fn snapshot_aborts_on_contract_violation() {
    let fleet = Fleet::demo(&json!({ "stop": "contract" }));
    let mut cmd = fleet.command();
    cmd.args(["snapshot", "--project", "demo"]);

    cmd.assert()
        .code(1)
        .stderr(contains("run aborted"))
        .stdout(contains("i-a: failed at stopping: malformed provider response"))
        .stdout(contains("instance(s)").not());
}

#[test]
fn snapshot_of_unknown_project_is_a_no_op() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.args(["snapshot", "--project", "absent"]);

    cmd.assert()
        .success()
        .stdout("0 instance(s): 0 succeeded, 0 failed, 0 skipped\n");
}

#[test]
fn list_instances_prints_comma_separated_lines() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.args(["list-instances", "--project", "demo"]);

    cmd.assert()
        .success()
        .stdout("i-a, DEV1-S, fr-par-1, running, -\ni-b, DEV1-S, fr-par-1, running, -\n");
}

#[test]
fn list_volumes_covers_every_instance_without_project() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.arg("list-volumes");

    cmd.assert()
        .success()
        .stdout(contains("vol-1, i-a, 20 GB, b_ssd, Not Encrypted"))
        .stdout(contains("vol-4, i-c, 20 GB, b_ssd, Not Encrypted"));
}

#[test]
fn stop_without_wait_reports_the_transitional_state() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.args(["stop", "--project", "demo", "--no-wait"]);

    cmd.assert()
        .success()
        .stdout(contains("i-a: success (stopping)"))
        .stdout(contains("i-b: success (stopping)"));
}

#[test]
fn blank_project_is_rejected() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.args(["snapshot", "--project", "  "]);

    cmd.assert()
        .code(1)
        .stdout("")
        .stderr(contains("invalid project"));
}

#[test]
fn unreadable_fixture_is_reported() {
    let mut cmd = cargo_bin_cmd!("snapctl");
    cmd.env(FIXTURE_ENV, "/nonexistent/snapctl/fleet.json");
    cmd.arg("list-instances");

    cmd.assert()
        .code(1)
        .stderr(contains("failed to read fleet fixture"));
}

#[test]
fn verbose_flag_emits_debug_logs_on_stderr() {
    let fleet = Fleet::demo(&json!({}));
    let mut cmd = fleet.command();
    cmd.args(["--verbose", "snapshot", "--project", "demo"]);

    cmd.assert()
        .success()
        .stderr(contains("DEBUG"))
        .stdout(contains("DEBUG").not());
}
