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

fn spawn_sidecar(extra_env: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_certboardd");
    let mut child = Command::new(exe)
        .args(["--admin-email", "admin@school.edu"])
        .env("CERTBOARD_RANKS__ENABLED", "false")
        .envs(extra_env.iter().copied())
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

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u32,
}

impl Sidecar {
    fn start(workspace: &std::path::Path) -> Self {
        let (child, stdin, reader) =
            spawn_sidecar(&[("CERTBOARD_LEADERBOARD__EXEMPT_EMAILS", "exempt@school.edu")]);
        let mut s = Self {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        s
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        format!("r{}", self.next_id)
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn onboard(&mut self, user_id: &str, email: &str, name: &str, department: &str) -> String {
        let id = self.id();
        let token = sign_in(&mut self.stdin, &mut self.reader, &id, user_id, email);
        self.ok(
            "onboarding.create",
            json!({
                "token": token,
                "name": name,
                "contactNumber": "9000000000",
                "department": department
            }),
        );
        token
    }

    fn add_cert(&mut self, token: &str, name: &str, cert_type: &str) -> serde_json::Value {
        self.ok(
            "certifications.create",
            json!({
                "token": token,
                "name": name,
                "issuingOrganization": "NPTEL",
                "issueDate": "2025-01-15",
                "type": cert_type
            }),
        )
    }

    fn finish(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

fn ids(list: &serde_json::Value, key: &str) -> Vec<String> {
    list.as_array()
        .expect("array")
        .iter()
        .filter_map(|v| v[key].as_str().map(str::to_string))
        .collect()
}

#[test]
fn certification_crud_keeps_points_in_sync() {
    let workspace = temp_dir("certboard-cert-crud");
    let mut s = Sidecar::start(&workspace);
    let token = s.onboard("u-ravi", "ravi@school.edu", "Ravi", "ECE");

    let t = s.add_cert(&token, "AWS Cloud Practitioner", "global");
    assert_eq!(t["totalPoints"].as_i64(), Some(10));
    let t = s.add_cert(&token, "Outcome Based Education", "FDP");
    assert_eq!(t["totalPoints"].as_i64(), Some(15));
    let fdp_id = t["certifications"][1]["id"].as_str().expect("id").to_string();
    assert_eq!(t["certifications"][1]["type"].as_str(), Some("fdp"));
    assert_eq!(
        t["certifications"][1]["issueDate"].as_str(),
        Some("2025-01-15T00:00:00.000Z")
    );

    let untyped = s.ok(
        "certifications.create",
        json!({
            "token": token,
            "name": "Campus talk",
            "issuingOrganization": "IEEE",
            "issueDate": "2025-02-01T10:00:00Z",
            "credentialId": "   "
        }),
    );
    assert_eq!(untyped["totalPoints"].as_i64(), Some(17));
    let other = &untyped["certifications"][2];
    assert_eq!(other["type"].as_str(), Some("other"));
    assert_eq!(other["points"].as_i64(), Some(2));
    assert!(other["credentialId"].is_null());
    let other_id = other["id"].as_str().expect("id").to_string();

    let bad_type = s.call(
        "certifications.create",
        json!({
            "token": token,
            "name": "x",
            "issuingOrganization": "y",
            "issueDate": "2025-01-01",
            "type": "conference"
        }),
    );
    assert_eq!(error_code(&bad_type), "bad_params");
    let missing = s.call(
        "certifications.create",
        json!({ "token": token, "name": "x", "issuingOrganization": "y" }),
    );
    assert_eq!(missing["error"]["message"].as_str(), Some("Missing required fields"));

    let renamed = s.ok(
        "certifications.update",
        json!({
            "token": token,
            "certificationId": other_id,
            "name": "Campus keynote",
            "issuingOrganization": "IEEE",
            "issueDate": "2025-02-02",
            "credentialUrl": "https://ieee.example/c/1"
        }),
    );
    let updated = &renamed["certifications"][2];
    assert_eq!(updated["name"].as_str(), Some("Campus keynote"));
    assert_eq!(updated["type"].as_str(), Some("other"));
    assert_eq!(updated["credentialUrl"].as_str(), Some("https://ieee.example/c/1"));
    assert_eq!(renamed["totalPoints"].as_i64(), Some(17));

    let retyped = s.ok(
        "certifications.update",
        json!({
            "token": token,
            "certificationId": other_id,
            "name": "Campus keynote",
            "issuingOrganization": "IEEE",
            "issueDate": "2025-02-02",
            "type": "webinar"
        }),
    );
    assert_eq!(retyped["totalPoints"].as_i64(), Some(18));

    let unknown = s.call(
        "certifications.update",
        json!({
            "token": token,
            "certificationId": "nope",
            "name": "a",
            "issuingOrganization": "b",
            "issueDate": "2025-01-01"
        }),
    );
    assert_eq!(error_code(&unknown), "not_found");

    let noop = s.ok(
        "certifications.delete",
        json!({ "token": token, "certificationId": "nope" }),
    );
    assert_eq!(noop["totalPoints"].as_i64(), Some(18));
    let after_delete = s.ok(
        "certifications.delete",
        json!({ "token": token, "certificationId": fdp_id }),
    );
    assert_eq!(after_delete["totalPoints"].as_i64(), Some(13));

    let listed = s.ok("certifications.list", json!({ "token": token }));
    assert_eq!(
        ids(&listed, "name"),
        vec!["AWS Cloud Practitioner".to_string(), "Campus keynote".to_string()]
    );

    let stranger = {
        let id = s.id();
        sign_in(&mut s.stdin, &mut s.reader, &id, "u-new", "new@school.edu")
    };
    let no_profile = s.call("certifications.list", json!({ "token": stranger }));
    assert_eq!(error_code(&no_profile), "not_found");

    s.finish();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn ranks_leaderboard_and_department_summaries() {
    let workspace = temp_dir("certboard-ranks-leaderboard");
    let mut s = Sidecar::start(&workspace);

    let ravi = s.onboard("u-ravi", "ravi@school.edu", "Ravi", "ECE");
    s.add_cert(&ravi, "AWS", "global");
    s.add_cert(&ravi, "Seminar", "other");
    let meena = s.onboard("u-meena", "meena@school.edu", "Meena", "CSE");
    s.add_cert(&meena, "Coursera ML", "online");
    let exempt = s.onboard("u-exempt", "exempt@school.edu", "Test Account", "CSE");
    s.add_cert(&exempt, "Azure", "global");
    let das = s.onboard("u-das", "das@school.edu", "Das", "ECE");
    s.add_cert(&das, "Webinar on VLSI", "webinar");
    let _kiran = s.onboard("u-kiran", "kiran@school.edu", "Kiran", "MECH");

    let refused = s.call("admin.updateRanks", json!({ "token": ravi }));
    assert_eq!(error_code(&refused), "forbidden");

    let admin = {
        let id = s.id();
        sign_in(&mut s.stdin, &mut s.reader, &id, "u-admin", "admin@school.edu")
    };
    let ranked = s.ok("admin.updateRanks", json!({ "token": admin }));
    assert_eq!(ranked["ranked"].as_u64(), Some(5));

    let all = s.ok("teachers.list", json!({ "token": ravi }));
    let ranks: Vec<(String, i64)> = all
        .as_array()
        .expect("array")
        .iter()
        .map(|t| {
            (
                t["email"].as_str().unwrap_or("").to_string(),
                t["rank"].as_i64().unwrap_or(0),
            )
        })
        .collect();
    assert_eq!(
        ranks,
        vec![
            ("ravi@school.edu".to_string(), 1),
            ("exempt@school.edu".to_string(), 2),
            ("meena@school.edu".to_string(), 3),
            ("das@school.edu".to_string(), 4),
            ("kiran@school.edu".to_string(), 5),
        ]
    );

    let board = s.ok("leaderboard.get", json!({ "token": meena }));
    assert_eq!(board["stats"]["facultyCount"].as_u64(), Some(4));
    assert_eq!(board["stats"]["totalCertifications"].as_u64(), Some(4));
    assert_eq!(board["stats"]["averageScore"].as_i64(), Some(6));
    assert_eq!(board["stats"]["departmentCount"].as_u64(), Some(3));
    assert_eq!(
        ids(&board["topThree"], "email"),
        vec!["ravi@school.edu", "meena@school.edu", "das@school.edu"]
    );
    assert_eq!(ids(&board["remaining"], "email"), vec!["kiran@school.edu"]);
    assert_eq!(board["topThree"][1]["recentAchievement"].as_str(), Some("Coursera ML"));

    let searched = s.ok(
        "leaderboard.get",
        json!({ "token": meena, "search": "zzz", "sortBy": "name", "sortOrder": "asc" }),
    );
    assert!(searched["remaining"].as_array().expect("array").is_empty());
    let bad_sort = s.call("leaderboard.get", json!({ "token": meena, "sortBy": "rank" }));
    assert_eq!(error_code(&bad_sort), "bad_params");

    let depts = s.ok("departments.summary", json!({ "token": meena }));
    assert_eq!(ids(&depts, "name"), vec!["CSE", "ECE", "MECH"]);
    assert_eq!(depts[0]["avgScore"].as_i64(), Some(9));
    assert_eq!(depts[1]["avgScore"].as_i64(), Some(8));
    assert_eq!(depts[1]["teacherCount"].as_u64(), Some(2));
    assert_eq!(depts[1]["totalCerts"].as_u64(), Some(3));

    s.finish();
    let _ = std::fs::remove_dir_all(workspace);
}
