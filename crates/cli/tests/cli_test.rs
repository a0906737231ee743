use std::fs;
use std::io::Write as _;
use std::process::{Command, Stdio};

const KEY_CONFIG: &str = r#"
id: app
tables:
  - id: child
    name: child
    key: [id]
target:
  name: child_key
  key: [id]
"#;

fn pgripple() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pgripple"))
}

#[test]
fn generates_to_an_output_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let schema = dir.path().join("key.yaml");
    let output = dir.path().join("out.sql");
    fs::write(&schema, KEY_CONFIG).expect("write schema");

    let status = pgripple()
        .args(["create-key", "--schema"])
        .arg(&schema)
        .arg("--output")
        .arg(&output)
        .status()
        .expect("run pgripple");

    assert!(status.success());
    let script = fs::read_to_string(&output).expect("read output");
    assert!(script.contains("CREATE FUNCTION app__chg__child"));
    assert!(script.ends_with(";\n\n"));
}

#[test]
fn reads_stdin_and_writes_stdout_by_default() {
    let mut child = pgripple()
        .arg("create-key")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn pgripple");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(KEY_CONFIG.as_bytes())
        .expect("write stdin");

    let output = child.wait_with_output().expect("wait for pgripple");
    assert!(output.status.success());
    let script = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(script.contains("CREATE TRIGGER app__ins__child"));
}

#[test]
fn invalid_config_fails_without_touching_the_output_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let schema = dir.path().join("join.yaml");
    let output = dir.path().join("never.sql");
    // Deferred consistency without a query is rejected during validation.
    fs::write(
        &schema,
        "id: app\nconsistency: deferred\ntables:\n  child: {name: child, targetKey: [child.id]}\ntarget: {name: t, key: [id]}\n",
    )
    .expect("write schema");

    let output_result = pgripple()
        .args(["create-join", "--schema"])
        .arg(&schema)
        .arg("--output")
        .arg(&output)
        .output()
        .expect("run pgripple");

    assert!(!output_result.status.success());
    assert!(!output.exists(), "failed runs must not create the output file");
    let stderr = String::from_utf8(output_result.stderr).expect("utf-8 stderr");
    assert!(stderr.contains("[config]"), "stderr was: {stderr}");
    assert!(stderr.contains("deferred consistency requires a query"));
}

#[test]
fn missing_schema_file_reports_an_io_error() {
    let output_result = pgripple()
        .args(["create-agg", "--schema", "no-such-file.yaml"])
        .output()
        .expect("run pgripple");

    assert!(!output_result.status.success());
    let stderr = String::from_utf8(output_result.stderr).expect("utf-8 stderr");
    assert!(stderr.contains("[io]"), "stderr was: {stderr}");
}
