use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_ranks(false)
}

fn spawn_sidecar_with_ranks(enabled: bool) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_certboardd");
    let mut child = Command::new(exe)
        .args(["--admin-email", "admin@school.edu"])
        .env("CERTBOARD_RANKS__ENABLED", if enabled { "true" } else { "false" })
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn certboardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
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
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn sign_in(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    user_id: &str,
    email: &str,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "auth.signIn",
        json!({ "userId": user_id, "email": email, "name": user_id }),
    );
    res.get("token")
        .and_then(|v| v.as_str())
        .expect("token")
        .to_string()
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("certboard-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(health["adminCount"].as_u64(), Some(1));

    let early = request(&mut stdin, &mut reader, "2", "teachers.list", json!({ "token": "x" }));
    assert_eq!(error_code(&early), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("certboard.sqlite3").is_file());

    let anonymous = request(&mut stdin, &mut reader, "4", "teachers.list", json!({}));
    assert_eq!(error_code(&anonymous), "not_authenticated");
    let forged = request(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.list",
        json!({ "token": "not-a-real-token" }),
    );
    assert_eq!(error_code(&forged), "not_authenticated");

    let token = sign_in(&mut stdin, &mut reader, "6", "u-admin", "admin@school.edu");
    let families = [
        ("auth.session", json!({ "token": token })),
        ("teachers.list", json!({ "token": token })),
        ("certifications.list", json!({ "token": token })),
        ("certLinks.list", json!({ "token": token })),
        ("departments.summary", json!({ "token": token })),
        ("leaderboard.get", json!({ "token": token })),
        ("uploads.file", json!({ "token": token })),
        ("admin.blockedLogins", json!({ "token": token })),
        ("maintenance.backfillStats", json!({ "token": token })),
    ];
    for (i, (method, params)) in families.iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("f{}", i), method, params.clone());
        assert_ne!(error_code(&resp), "not_implemented", "{} not routed", method);
    }

    let unknown = request(&mut stdin, &mut reader, "7", "grades.compute", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(bad["ok"].as_bool(), Some(false));
    assert_eq!(error_code(&bad), "bad_json");

    let still_alive = request_ok(&mut stdin, &mut reader, "8", "health", json!({}));
    assert_eq!(
        still_alive["workspacePath"].as_str(),
        Some(workspace.to_string_lossy().as_ref())
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reselecting_a_workspace_replaces_the_rank_scheduler() {
    let first = temp_dir("certboard-scheduler-first");
    let second = temp_dir("certboard-scheduler-second");
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with_ranks(true);

    let idle = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(idle["rankSchedule"]["running"].as_bool(), Some(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": first.to_string_lossy() }),
    );
    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(health["rankSchedule"]["running"].as_bool(), Some(true));
    assert_eq!(health["rankSchedule"]["schedule"].as_str(), Some("30 19 * * *"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": second.to_string_lossy() }),
    );
    let health = request_ok(&mut stdin, &mut reader, "5", "health", json!({}));
    assert_eq!(health["rankSchedule"]["running"].as_bool(), Some(true));
    assert_eq!(
        health["workspacePath"].as_str(),
        Some(second.to_string_lossy().as_ref())
    );

    // Closing stdin must stop the scheduler thread and let the process exit.
    drop(stdin);
    let started = std::time::Instant::now();
    let status = child.wait().expect("wait for exit");
    assert!(status.success(), "exit status {:?}", status);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));

    let _ = std::fs::remove_dir_all(first);
    let _ = std::fs::remove_dir_all(second);
}
