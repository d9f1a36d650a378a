mod test_support;

use serde_json::json;
use test_support::{configure_fixture, request_ok, spawn_sidecar, temp_dir, write_sheet};

#[test]
fn table_view_forward_fills_and_scores_every_row() {
    let workspace = temp_dir("classreportd-table");
    let sheet = write_sheet(
        &workspace,
        "sheet.json",
        json!([
            { "ID": "1", "Name": "An", "Week": 1, "Criteria1": "✓", "Criteria2": "X" },
            { "ID": "",  "Name": "",   "Week": "", "Criteria1": "✓", "Criteria2": "" }
        ]),
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    configure_fixture(&mut stdin, &mut reader, &sheet);

    let result = request_ok(&mut stdin, &mut reader, "1", "records.table", json!({}));
    let rows = result.get("rows").and_then(|r| r.as_array()).expect("rows");
    assert_eq!(rows.len(), 2);
    // The second row inherits An's identity and week.
    assert_eq!(rows[1]["cells"]["ID"], 1.0);
    assert_eq!(rows[1]["cells"]["Name"], "An");
    assert_eq!(rows[1]["cells"]["Week"], 1.0);
    assert_eq!(rows[0]["total"], 90.0);
    assert_eq!(rows[0]["label"], "Good");
    assert_eq!(rows[1]["total"], 120.0);
    assert_eq!(rows[1]["label"], "Excellent");
    assert_eq!(
        result.get("orphanRows").and_then(|o| o.as_array()).map(|o| o.len()),
        Some(0)
    );

    let columns: Vec<&str> = result
        .get("columns")
        .and_then(|c| c.as_array())
        .expect("columns")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(columns, vec!["ID", "Name", "Week", "Criteria1", "Criteria2"]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn leading_rows_without_identity_are_reported_as_orphans() {
    let workspace = temp_dir("classreportd-orphans");
    let sheet = write_sheet(
        &workspace,
        "sheet.json",
        json!([
            { "ID": "", "Name": "", "Week": 1, "Criteria1": "X" },
            { "ID": "", "Name": "", "Week": 1, "Criteria1": "✓" },
            { "ID": "1", "Name": "An", "Week": 1, "Criteria1": "✓" }
        ]),
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    configure_fixture(&mut stdin, &mut reader, &sheet);

    let result = request_ok(&mut stdin, &mut reader, "1", "records.table", json!({}));
    assert_eq!(result.get("orphanRows"), Some(&json!([0, 1])));
    // Orphans stay visible in the table; they are a data-quality signal, not
    // rows to silently discard.
    assert_eq!(
        result.get("rows").and_then(|r| r.as_array()).map(|r| r.len()),
        Some(3)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn blank_rows_and_null_markers_are_normalized_away() {
    let workspace = temp_dir("classreportd-nulls");
    let sheet = write_sheet(
        &workspace,
        "sheet.json",
        json!([
            { "ID": "1", "Name": "An", "Week": 1, "Criteria1": "✓", "Criteria2": "null" },
            { "ID": "",  "Name": "NULL", "Week": "n/a", "Criteria1": "", "Criteria2": "none" },
            { "ID": "1", "Name": "An", "Week": 2, "Criteria1": "NaN", "Criteria2": "X" }
        ]),
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    configure_fixture(&mut stdin, &mut reader, &sheet);

    let result = request_ok(&mut stdin, &mut reader, "1", "records.table", json!({}));
    let rows = result.get("rows").and_then(|r| r.as_array()).expect("rows");
    // The middle row is empty once its null markers canonicalize.
    assert_eq!(rows.len(), 2);
    assert!(rows[0]["cells"]["Criteria2"].is_null());
    assert!(rows[1]["cells"]["Criteria1"].is_null());
    // A neutralized marker cell scores 0, so only X moves the total.
    assert_eq!(rows[1]["total"], 70.0);

    let _ = std::fs::remove_dir_all(workspace);
}
