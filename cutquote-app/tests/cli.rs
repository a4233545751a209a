use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

const RECTANGLE: &str = "0\nSECTION\n2\nENTITIES\n\
0\nLWPOLYLINE\n8\nCUT\n90\n4\n70\n1\n\
10\n0\n20\n0\n10\n100\n20\n0\n10\n100\n20\n50\n10\n0\n20\n50\n\
0\nENDSEC\n0\nEOF\n";

const CONFIG: &str = r#"
[logging]
level = "warn"

[settings]
markup = 15
min_charge = 25
currency = "USD"

[[pricing]]
material = "steel"
thickness = "1/8"
thickness_unit = "in"
cost_per_area = 0.0001
cost_per_time = 50
cut_speed = 3000
"#;

fn temp_file(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

fn cutquote() -> Command {
    let mut cmd = Command::cargo_bin("cutquote").expect("binary exists");
    cmd.env_remove("CUTQUOTE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn inspect_prints_metrics() {
    let dxf = temp_file(RECTANGLE, ".dxf");
    cutquote()
        .arg("inspect")
        .arg(dxf.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("实体数量: 1"))
        .stdout(predicate::str::contains("宽度: 100.00 mm"))
        .stdout(predicate::str::contains("切割总长: 300.00 mm"))
        .stdout(predicate::str::contains("polyline"));
}

#[test]
fn inspect_json_is_machine_readable() {
    let dxf = temp_file(RECTANGLE, ".dxf");
    let output = cutquote()
        .arg("inspect")
        .arg(dxf.path())
        .arg("--json")
        .output()
        .expect("run cutquote");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(json["metrics"]["entityCount"], 1);
    assert_eq!(json["metrics"]["totalLength"], 300.0);
    assert_eq!(json["entities"][0]["type"], "polyline");
    assert_eq!(json["entities"][0]["closed"], true);
}

#[test]
fn quote_applies_minimum_charge() {
    let dxf = temp_file(RECTANGLE, ".dxf");
    let config = temp_file(CONFIG, ".toml");
    cutquote()
        .arg("quote")
        .arg(dxf.path())
        .args(["--material", "steel", "--thickness", "1/8", "--unit", "in"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("面积成本: 0.50 USD"))
        .stdout(predicate::str::contains("报价: 25.00 USD"))
        .stdout(predicate::str::contains("已按最低收费计价"));
}

#[test]
fn quote_json_reports_breakdown() {
    let dxf = temp_file(RECTANGLE, ".dxf");
    let config = temp_file(CONFIG, ".toml");
    let output = cutquote()
        .arg("quote")
        .arg(dxf.path())
        .args(["--material", "steel", "--thickness", "3.175", "--json"])
        .arg("--config")
        .arg(config.path())
        .output()
        .expect("run cutquote");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(json["material"], "steel");
    assert_eq!(json["price"]["finalPrice"], 25.0);
    assert_eq!(json["price"]["minChargeApplied"], true);
    assert_eq!(json["price"]["currency"], "USD");
}

#[test]
fn quote_unknown_material_fails() {
    let dxf = temp_file(RECTANGLE, ".dxf");
    let config = temp_file(CONFIG, ".toml");
    cutquote()
        .arg("quote")
        .arg(dxf.path())
        .args(["--material", "copper", "--thickness", "3"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("copper"));
}

#[test]
fn inspect_missing_entities_section_fails() {
    let dxf = temp_file("0\nSECTION\n2\nHEADER\n0\nENDSEC\n0\nEOF\n", ".dxf");
    cutquote()
        .arg("inspect")
        .arg(dxf.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("ENTITIES"));
}

#[test]
fn inspect_missing_file_fails() {
    cutquote()
        .args(["inspect", "/definitely/not/here.dxf"])
        .assert()
        .failure();
}
