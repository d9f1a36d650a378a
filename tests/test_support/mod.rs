#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classreportd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classreportd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

/// Request that must succeed; returns the `result` payload.
pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result payload")
}

/// Request that must fail; returns the error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

pub fn write_sheet(dir: &Path, name: &str, rows: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(&rows).expect("encode sheet"))
        .expect("write sheet fixture");
    path
}

/// The profile the fixtures in these tests assume: base 100, met +20,
/// failed -30, three bands.
pub fn fixture_profile() -> serde_json::Value {
    json!({
        "idColumn": "ID",
        "nameColumn": "Name",
        "periodColumn": "Week",
        "criteria": ["Criteria1", "Criteria2"],
        "metMarks": ["✓"],
        "failedMarks": ["X"],
        "metDelta": 20.0,
        "failedDelta": -30.0,
        "baseScore": 100.0,
        "bands": [
            { "min": 110.0, "label": "Excellent" },
            { "min": 90.0, "label": "Good" },
            { "min": 70.0, "label": "Needs work" }
        ]
    })
}

/// Configure the fixture profile plus a file source pointing at `sheet`.
pub fn configure_fixture(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    sheet: &Path,
) {
    let _ = request_ok(stdin, reader, "cfg-profile", "profile.configure", fixture_profile());
    let _ = request_ok(
        stdin,
        reader,
        "cfg-source",
        "source.configure",
        json!({ "kind": "file", "path": sheet.to_string_lossy(), "cacheTtlSecs": 3600 }),
    );
}
