use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .env_remove("CAMPUSD_WORKSPACE")
        .env_remove("CAMPUSD_LOAD_POLICY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
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
    assert_eq!(value["ok"], json!(true), "{} failed: {}", method, value);
    value["result"].clone()
}

fn ids(records: &serde_json::Value) -> Vec<i64> {
    records
        .as_array()
        .expect("records array")
        .iter()
        .filter_map(|r| r["Id"].as_i64())
        .collect()
}

fn deal_fields(name: &str, status: &str) -> serde_json::Value {
    json!({
        "name": name,
        "clientName": "Tailspin Toys",
        "value": "12500.50",
        "status": status,
        "priority": "low",
        "category": "hardware"
    })
}

#[test]
fn deals_create_update_delete_reconcile_the_cached_list() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let listed = request_ok(&mut stdin, &mut reader, "1", "deals.list", json!({}));
    assert_eq!(ids(&listed["records"]), vec![1, 2, 3]);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "deals.create",
        json!({ "fields": deal_fields("Library kiosk", "pending") }),
    );
    assert_eq!(created["record"]["Id"], json!(4));
    assert_eq!(created["record"]["value"], json!(12500.5));
    assert!(created["record"]["createdAt"].is_string());
    assert!(created["record"]["updatedAt"].is_string());
    assert_eq!(
        created["notices"],
        json!([{ "level": "success", "message": "Deal created successfully" }])
    );

    let listed = request_ok(&mut stdin, &mut reader, "3", "deals.list", json!({}));
    assert_eq!(ids(&listed["records"]), vec![1, 2, 3, 4]);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "deals.update",
        json!({ "id": "2", "fields": deal_fields("Learning platform licence", "active") }),
    );
    assert_eq!(updated["record"]["Id"], json!(2));
    assert_eq!(updated["record"]["status"], json!("active"));
    assert_eq!(updated["notices"][0]["message"], json!("Deal updated successfully"));

    let listed = request_ok(&mut stdin, &mut reader, "5", "deals.list", json!({}));
    assert_eq!(ids(&listed["records"]), vec![1, 2, 3, 4]);
    assert_eq!(listed["records"][1]["status"], json!("active"));
    assert_eq!(listed["records"][1]["clientName"], json!("Tailspin Toys"));

    let deleted = request_ok(&mut stdin, &mut reader, "6", "deals.delete", json!({ "id": 1 }));
    assert_eq!(deleted["deleted"], json!(1));
    assert_eq!(deleted["notices"][0]["message"], json!("Deal deleted successfully"));

    let listed = request_ok(&mut stdin, &mut reader, "7", "deals.list", json!({}));
    assert_eq!(ids(&listed["records"]), vec![2, 3, 4]);

    let again = request(&mut stdin, &mut reader, "8", "deals.delete", json!({ "id": 1 }));
    assert_eq!(again["ok"], json!(false));
    assert_eq!(again["error"]["code"], json!("record_failed"));
    assert_eq!(
        again["error"]["details"]["notices"],
        json!([{ "level": "error", "message": "Deal not found" }])
    );

    let listed = request_ok(&mut stdin, &mut reader, "9", "deals.list", json!({ "reload": true }));
    assert_eq!(ids(&listed["records"]), vec![2, 3, 4]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn missing_required_fields_abort_submission() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let before = request_ok(&mut stdin, &mut reader, "1", "students.list", json!({}));
    let count = before["records"].as_array().map(|a| a.len()).expect("records");

    let rejected = request(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "fields": { "first_name_c": "Ada", "email_c": "  " } }),
    );
    assert_eq!(rejected["ok"], json!(false));
    assert_eq!(rejected["error"]["code"], json!("validation_failed"));
    assert_eq!(
        rejected["error"]["details"]["notices"],
        json!([
            { "level": "error", "message": "last_name_c is required" },
            { "level": "error", "message": "email_c is required" }
        ])
    );

    let after = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(after["records"].as_array().map(|a| a.len()), Some(count));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "fields": {
            "first_name_c": "Ada",
            "last_name_c": "Lovelace",
            "email_c": "ada@college.edu",
            "year_c": "2nd",
            "gpa_c": "3.9x",
            "department_c": ""
        } }),
    );
    assert_eq!(created["record"]["year_c"], json!(2));
    assert_eq!(created["record"]["gpa_c"], json!(3.9));
    assert!(created["record"]["department_c"].is_null());

    let free_deal = request(
        &mut stdin,
        &mut reader,
        "5",
        "deals.create",
        json!({ "fields": {
            "name": "Pro bono audit",
            "clientName": "City Library",
            "value": 0,
            "status": "pending",
            "priority": "low",
            "category": "Services"
        } }),
    );
    assert_eq!(free_deal["error"]["code"], json!("validation_failed"));
    assert_eq!(
        free_deal["error"]["details"]["notices"],
        json!([{ "level": "error", "message": "value is required" }])
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn get_and_param_errors() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let got = request_ok(&mut stdin, &mut reader, "1", "faculty.get", json!({ "id": 1 }));
    assert_eq!(got["record"]["last_name_c"], json!("Mercer"));

    let missing = request(&mut stdin, &mut reader, "2", "faculty.get", json!({ "id": 99 }));
    assert_eq!(missing["error"]["code"], json!("not_found"));
    assert_eq!(missing["error"]["message"], json!("Faculty member not found"));

    let bad = request(&mut stdin, &mut reader, "3", "faculty.get", json!({ "id": "abc" }));
    assert_eq!(bad["error"]["code"], json!("bad_params"));

    let bad = request(&mut stdin, &mut reader, "4", "courses.create", json!({}));
    assert_eq!(bad["error"]["code"], json!("bad_params"));

    let bad = request(&mut stdin, &mut reader, "5", "courses.update", json!({ "fields": {} }));
    assert_eq!(bad["error"]["code"], json!("bad_params"));

    let gone = request(
        &mut stdin,
        &mut reader,
        "6",
        "tasks.update",
        json!({ "id": 42, "fields": {
            "title": "Ghost",
            "dueDate": "2025-12-01",
            "assignedTo": "Nobody"
        } }),
    );
    assert_eq!(gone["error"]["code"], json!("record_failed"));
    assert_eq!(gone["error"]["details"]["notices"][0]["message"], json!("Task not found"));

    drop(stdin);
    let _ = child.wait();
}
