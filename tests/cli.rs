mod common;

use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;

fn seed_people(ws: &TestWorkspace) {
    ws.import(
        "people",
        "id,name,age\n1,John,44\n2,Jane,30\n",
        "id:integer,name:string,age:integer",
    );
    ws.import(
        "changes",
        "id,name\n1,John\n3,Dalton\n",
        "id:integer,name:string",
    );
}

#[test]
fn compare_prints_missing_columns() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("compare")
        .args(["--first", "people", "--second", "changes"])
        .assert()
        .success()
        .stdout("Column age is missing in second schema\n");
}

#[test]
fn compare_emits_json_and_can_fail() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("compare")
        .args(["--first", "changes", "--second", "people", "--format", "json"])
        .assert()
        .success()
        .stdout(contains("\"kind\": \"missing_in_first\"").and(contains("\"column\": \"age\"")));

    ws.command("compare")
        .args(["--first", "people", "--second", "changes", "--fail-on-discrepancy"])
        .assert()
        .failure()
        .stderr(contains("differ in 1 place(s)"));
}

#[test]
fn compare_identical_tables_prints_nothing() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("compare")
        .args(["--first", "people", "--second", "people", "--fail-on-discrepancy"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn harmonize_widens_the_second_table() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("harmonize")
        .args(["--first", "people", "--second", "changes"])
        .assert()
        .success();
    assert_eq!(
        ws.table_csv("changes"),
        "\"id\",\"name\",\"age\"\n\"1\",\"John\",\"\\N\"\n\"3\",\"Dalton\",\"\\N\"\n"
    );
    ws.command("compare")
        .args(["--first", "people", "--second", "changes"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn merge_without_harmonize_reports_missing_column() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("merge")
        .args(["--main", "people", "--update", "changes", "--key", "id"])
        .assert()
        .failure()
        .stderr(contains("Update dataset has no column 'age'"));
}

#[test]
fn merge_upserts_into_output_table() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("merge")
        .args([
            "--main",
            "people",
            "--update",
            "changes",
            "--key",
            "id,name",
            "--harmonize",
            "--order-by",
            "id",
            "--output",
            "merged",
        ])
        .assert()
        .success();
    assert_eq!(
        ws.table_csv("merged"),
        "\"id\",\"name\",\"age\"\n\"1\",\"John\",\"44\"\n\"2\",\"Jane\",\"30\"\n\"3\",\"Dalton\",\"\\N\"\n"
    );
}

#[test]
fn merge_overwrites_changed_values_and_previews() {
    let ws = TestWorkspace::new();
    ws.import(
        "people",
        "id,name,age\n1,John,44\n",
        "id:integer,name:string,age:integer",
    );
    ws.import(
        "changes",
        "id,name,age\n1,John,45\n2,Jane,30\n",
        "id:integer,name:string,age:integer",
    );
    ws.command("merge")
        .args([
            "--main", "people", "--update", "changes", "--key", "id", "--preview",
        ])
        .assert()
        .success()
        .stdout(contains("1  John   45").and(contains("2  Jane   30")));
    assert_eq!(
        ws.table_csv("people"),
        "\"id\",\"name\",\"age\"\n\"1\",\"John\",\"45\"\n\"2\",\"Jane\",\"30\"\n"
    );
}

#[test]
fn import_infers_types_and_show_prints_schema() {
    let ws = TestWorkspace::new();
    let input = ws.write("orders.tsv", "id\tamount\tshipped\n1\t42.5\tyes\n2\t13\tno\n");
    ws.command("import")
        .args(["--table", "orders", "-i"])
        .arg(&input)
        .assert()
        .success();
    ws.command("show")
        .args(["--table", "orders", "--schema"])
        .assert()
        .success()
        .stdout(
            contains("datatype: Integer")
                .and(contains("datatype: Float"))
                .and(contains("datatype: Boolean")),
        );
    ws.command("show")
        .args(["--table", "orders"])
        .assert()
        .success()
        .stdout(contains("42.5"));
}

#[test]
fn import_refuses_existing_table_by_default() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    let input = ws.write("again.csv", "id,name\n9,Zed\n");
    ws.command("import")
        .args(["--table", "changes", "-i"])
        .arg(&input)
        .args(["-c", "id:integer,name:string"])
        .assert()
        .failure()
        .stderr(contains("already exists"));
    ws.command("import")
        .args(["--table", "changes", "--mode", "append", "-i"])
        .arg(&input)
        .args(["-c", "id:integer,name:string"])
        .assert()
        .success();
    assert!(ws.table_csv("changes").ends_with("\"9\",\"Zed\"\n"));
}

#[test]
fn export_writes_delimited_output() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    let output = ws.path().join("people.tsv");
    ws.command("export")
        .args(["--table", "people", "-o"])
        .arg(&output)
        .assert()
        .success();
    let exported = std::fs::read_to_string(&output).expect("read export");
    assert!(exported.starts_with("\"id\"\t\"name\"\t\"age\"\n"));
}

#[test]
fn tables_lists_and_drops() {
    let ws = TestWorkspace::new();
    seed_people(&ws);
    ws.command("tables")
        .assert()
        .success()
        .stdout("changes\npeople\n");
    ws.command("tables")
        .args(["--drop", "changes"])
        .assert()
        .success();
    ws.command("tables").assert().success().stdout("people\n");
}

#[test]
fn demo_prints_discrepancies_and_writes_merged_table() {
    let ws = TestWorkspace::new();
    ws.command("demo")
        .assert()
        .success()
        .stdout("discrepancies [\"Column age is missing in second schema\"]\n");
    assert_eq!(
        ws.table_csv("df2_apo"),
        "\"id\",\"name\",\"age\"\n\
         \"1\",\"John Doe\",\"44\"\n\
         \"2\",\"Jane Doe\",\"88\"\n\
         \"3\",\"Dalton\",\"55\"\n\
         \"4\",\"test\",\"\\N\"\n\
         \"5\",\"test1\",\"\\N\"\n"
    );
}
