use {
    kv_checker::{MEMOIZE_VAR, STEP_BUDGET_VAR, TIME_BUDGET_VAR},
    serde_json::Value as Json,
    std::{
        io::Write,
        process::{Command, Output},
    },
    tempfile::NamedTempFile,
};

const LINEARIZABLE: &str = r#"[
    {"start": 0, "end": 10, "op": "put", "input": {"key": "1", "value": "A"},
     "result": {"prev_kv": null}},
    {"start": 5, "end": 15, "op": "put", "input": {"key": "1", "value": "B"},
     "result": {"prev_kv": {"key": "1", "value": "A"}}},
    {"start": 20, "end": 25, "op": "read", "input": {"key": "1"},
     "result": {"key": "1", "value": "B"}}
]"#;

const NOT_LINEARIZABLE: &str = r#"[
    {"start": 0, "end": 10, "op": "put", "input": {"key": "1", "value": "A"},
     "result": {"prev_kv": null}},
    {"start": 5, "end": 15, "op": "put", "input": {"key": "1", "value": "B"},
     "result": {"prev_kv": {"key": "1", "value": "A"}}},
    {"start": 20, "end": 25, "op": "read", "input": {"key": "1"},
     "result": {"key": "1", "value": null}}
]"#;

fn history_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn kv_checker(file: &NamedTempFile, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kv-checker"))
        .arg(file.path())
        .arg("--no-color")
        .args(args)
        .env_remove(STEP_BUDGET_VAR)
        .env_remove(TIME_BUDGET_VAR)
        .env_remove(MEMOIZE_VAR)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout_json(output: &Output) -> Json {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn exit_status_reflects_the_verdict() {
    let linearizable = history_file(LINEARIZABLE);
    let output = kv_checker(&linearizable, &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("History is linearizable."));

    let contradictory = history_file(NOT_LINEARIZABLE);
    assert_eq!(kv_checker(&contradictory, &[]).status.code(), Some(1));

    let output = kv_checker(&linearizable, &["--max-steps", "0"]);
    assert_eq!(output.status.code(), Some(2));

    let malformed = history_file(r#"[{"start": 0, "end": 1, "op": "frobnicate"}]"#);
    let output = kv_checker(&malformed, &[]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("frobnicate"));
}

#[test]
fn json_verdict_of_a_linearizable_history() {
    let file = history_file(LINEARIZABLE);
    let json = stdout_json(&kv_checker(&file, &["--json", "--witness"]));
    assert_eq!(json["verdict"], "linearizable");
    assert_eq!(json["witness"], serde_json::json!([0, 1, 2]));
    assert_eq!(json["stats"]["steps"], 3);
    assert!(json.get("mismatch").is_none());

    let json = stdout_json(&kv_checker(&file, &["--json"]));
    assert!(json.get("witness").is_none());
}

#[test]
fn json_verdict_names_the_deepest_mismatch() {
    let file = history_file(NOT_LINEARIZABLE);
    let output = kv_checker(&file, &["--json"]);
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["verdict"], "not linearizable");
    let mismatch = &json["mismatch"];
    assert_eq!(mismatch["depth"], 2);
    assert_eq!(mismatch["event"], 2);
    assert_eq!(mismatch["prefix"], serde_json::json!([0, 1, 2]));
    assert!(!mismatch["predicted"].is_null());
    assert!(!mismatch["observed"].is_null());
}

#[test]
fn json_verdict_explains_giving_up() {
    let file = history_file(LINEARIZABLE);
    let output = kv_checker(&file, &["--json", "--max-steps", "0"]);
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["verdict"], "indeterminate");
    assert!(json["reason"].as_str().is_some_and(|reason| !reason.is_empty()));
    assert_eq!(json["stats"]["steps"], 0);
}
