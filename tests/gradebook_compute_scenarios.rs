use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_raw(
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

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request_raw(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn final_grades(report: &serde_json::Value) -> Vec<Option<f64>> {
    report
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .map(|s| s.get("finalGrade").and_then(|v| v.as_f64()))
        .collect()
}

fn diagnostic_codes(report: &serde_json::Value) -> Vec<String> {
    report
        .get("diagnostics")
        .and_then(|v| v.as_array())
        .expect("diagnostics")
        .iter()
        .filter_map(|d| d.get("code").and_then(|v| v.as_str()).map(|s| s.to_string()))
        .collect()
}

#[test]
fn two_cohorts_share_weights_and_report_missing_category() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let config = json!({
        "weights": { "A": 0.5, "B": 0.5 },
        "scoringMode": "meanOfScores",
        "rounding": "halfUp"
    });

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.compute",
        json!({
            "config": config,
            "table": {
                "headers": [
                    "Student Name",
                    "A1 (Grading Category: A)",
                    "A2 (Grading Category: A)",
                    "B1 (Grading Category: B)"
                ],
                "rows": [["Student 1", 100, 100, 60]]
            }
        }),
    );
    assert_eq!(final_grades(&first), vec![Some(80.0)]);
    assert_eq!(first["students"][0]["categories"][0]["weighted"], 50.0);
    assert_eq!(first["students"][0]["categories"][1]["weighted"], 30.0);
    assert!(diagnostic_codes(&first).is_empty(), "{}", first["diagnostics"]);

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.compute",
        json!({
            "config": config,
            "table": {
                "headers": ["Student Name", "A1 (Grading Category: A)"],
                "rows": [{ "Student Name": "Student 2", "A1 (Grading Category: A)": 50 }]
            }
        }),
    );
    assert_eq!(final_grades(&second), vec![Some(25.0)]);
    let codes = diagnostic_codes(&second);
    assert!(!codes.iter().any(|c| c == "unweighted_category"));
    let not_contributing = second["diagnostics"]
        .as_array()
        .expect("diagnostics")
        .iter()
        .find(|d| d["code"] == "category_not_contributing")
        .expect("per-student diagnostic");
    assert_eq!(not_contributing["category"], "B");
    assert_eq!(not_contributing["student"], "Student 2");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn mean_mode_counts_missing_and_points_mode_excuses_it() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let table = json!({
        "headers": [
            "Student Name",
            "Q1 (Grading Category: A, Max Points: 10)",
            "Q2 (Grading Category: A, Max Points: 20)",
            "Q3 (Grading Category: A, Max Points: 100)"
        ],
        "rows": [["Ana", 80, null, 60], ["Bo", 8, null, null]]
    });

    let mean = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.compute",
        json!({
            "config": { "weights": { "A": 0.5 }, "scoringMode": "meanOfScores" },
            "table": table
        }),
    );
    let score = mean["students"][0]["categories"][0]["score"]
        .as_f64()
        .expect("score");
    assert!((score - 140.0 / 3.0).abs() < 1e-9);
    assert_eq!(mean["students"][0]["categories"][0]["weighted"], 23.33);
    assert_eq!(final_grades(&mean)[0], Some(23.33));
    assert!(diagnostic_codes(&mean).contains(&"weight_sum_mismatch".to_string()));

    let ratio = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.compute",
        json!({
            "config": { "weights": { "A": 1.0 }, "scoringMode": "pointsRatio" },
            "table": table
        }),
    );
    assert_eq!(ratio["students"][1]["categories"][0]["score"], 80.0);
    assert_eq!(final_grades(&ratio)[1], Some(80.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn mismatched_weights_are_used_verbatim() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.compute",
        json!({
            "config": { "weights": { "A": 0.5, "B": 0.4 } },
            "table": {
                "headers": [
                    "Student Name",
                    "a (Grading Category: A)",
                    "b (Grading Category: B)"
                ],
                "rows": [["S", 100, 100]]
            }
        }),
    );
    assert_eq!(final_grades(&report), vec![Some(90.0)]);
    let mismatch = report["diagnostics"]
        .as_array()
        .expect("diagnostics")
        .iter()
        .find(|d| d["code"] == "weight_sum_mismatch")
        .expect("mismatch diagnostic");
    let total = mismatch["total"].as_f64().expect("total");
    assert!((total - 0.9).abs() < 1e-9);
    assert_eq!(report["settings"]["weightTotal"].as_f64().map(|v| (v - 0.9).abs() < 1e-9), Some(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn fully_blank_category_scores_zero_in_both_modes() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let table = json!({
        "headers": [
            "Student Name",
            "Lab 1 (Grading Category: A, Max Points: 10)",
            "Lab 2 (Grading Category: A, Max Points: 10)",
            "Quiz (Grading Category: B, Max Points: 20)"
        ],
        "rows": [["Ana", null, "", 15], ["Bo", null, null, null]]
    });

    for (id, mode) in [("1", "meanOfScores"), ("2", "pointsRatio")] {
        let report = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "gradebook.compute",
            json!({
                "config": {
                    "weights": { "A": 0.5, "B": 0.5 },
                    "scoringMode": mode,
                    "rounding": "halfUp"
                },
                "table": table
            }),
        );
        let ana = &report["students"][0];
        assert_eq!(ana["categories"][0]["score"], 0.0, "{} {}", mode, ana);
        assert_eq!(ana["categories"][0]["weighted"], 0.0);
        assert!(ana["finalGrade"].as_f64().is_some(), "{} {}", mode, ana);

        let bo = &report["students"][1];
        assert_eq!(bo["categories"][0]["score"], 0.0);
        assert_eq!(bo["categories"][1]["score"], 0.0);
        assert_eq!(bo["finalGrade"], 0.0);
        assert_eq!(bo["missingCount"], 3);
        assert!(!diagnostic_codes(&report).contains(&"no_contributing_category".to_string()));

        // Blank assignment cells stay blank even though the grade is a real 0.
        let bo_row = report["table"]["rows"][1].as_array().expect("row");
        assert!(bo_row[1].is_null());
        assert_eq!(bo_row.last(), Some(&json!(0.0)));
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn absent_final_grade_is_null_in_table_and_zero_stays_zero() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let table = json!({
        "headers": ["Student Name", "Q (Grading Category: A)"],
        "rows": [["Nobody", null], ["Zero", 0], ["Some", 70.2]]
    });

    let scored = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.compute",
        json!({
            "config": { "weights": { "A": 1.0 }, "rounding": "ceiling" },
            "table": table
        }),
    );
    let rows = scored["table"]["rows"].as_array().expect("rows");
    assert_eq!(rows[0].as_array().expect("row").last(), Some(&json!(0.0)));
    assert_eq!(rows[1].as_array().expect("row").last(), Some(&json!(0.0)));
    assert_eq!(rows[2].as_array().expect("row").last(), Some(&json!(71.0)));

    let kinds: Vec<&str> = scored["table"]["columns"]
        .as_array()
        .expect("columns")
        .iter()
        .map(|c| c["kind"].as_str().expect("kind"))
        .collect();
    assert_eq!(
        kinds,
        vec![
            "identifier",
            "assignment",
            "categoryScore",
            "weightedContribution",
            "finalGrade"
        ]
    );
    assert_eq!(scored["table"]["columns"][3]["label"], "A Weighted (100%)");

    // No weighted category in this file: nothing can contribute.
    let unweighted = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.compute",
        json!({
            "config": { "weights": { "B": 1.0 } },
            "table": table
        }),
    );
    for row in unweighted["table"]["rows"].as_array().expect("rows") {
        assert!(row.as_array().expect("row").last().expect("cell").is_null());
    }
    let codes = diagnostic_codes(&unweighted);
    assert!(codes.contains(&"no_contributing_category".to_string()));
    assert!(codes.contains(&"weighted_category_absent".to_string()));
    assert!(codes.contains(&"unweighted_category".to_string()));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn structural_errors_refuse_the_run() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let no_ids = request_raw(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.compute",
        json!({ "table": { "headers": ["Quiz (Grading Category: A)"], "rows": [[10]] } }),
    );
    assert_eq!(no_ids["ok"], false);
    assert_eq!(no_ids["error"]["code"], "no_identifier_columns");

    let no_grades = request_raw(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.compute",
        json!({ "table": { "headers": ["Student Name", "Notes"], "rows": [["Ana", "x"]] } }),
    );
    assert_eq!(no_grades["error"]["code"], "no_gradable_columns");
    assert_eq!(no_grades["error"]["details"]["headerCount"], 2);

    let too_wide = request_raw(
        &mut stdin,
        &mut reader,
        "3",
        "gradebook.compute",
        json!({ "csvText": "Student Name,Q (Grading Category: A)\nAna,1,2\n" }),
    );
    assert_eq!(too_wide["error"]["code"], "row_width_mismatch");
    assert_eq!(too_wide["error"]["details"]["found"], 3);

    drop(stdin);
    let _ = child.wait();
}
