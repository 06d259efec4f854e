use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../dxview-io/tests/data");
    path.push(name);
    path
}

fn dxview(workdir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dxview").expect("找不到 dxview 可执行文件");
    cmd.current_dir(workdir.path()).env_remove("DXVIEW_CONFIG");
    cmd
}

#[test]
fn prints_text_statistics_and_report() {
    let workdir = tempfile::tempdir().expect("create temp dir");
    dxview(&workdir)
        .arg(fixture("basic_entities.dxf"))
        .assert()
        .success()
        .stdout(predicate::str::contains("文件: basic_entities.dxf"))
        .stdout(predicate::str::contains("版本: AC1015"))
        .stdout(predicate::str::contains("实体总数: 13"))
        .stdout(predicate::str::contains("渲染: 失败 0 / 13 个实体"))
        .stdout(predicate::str::contains("未支持的实体: VIEWPORT x1"));
}

#[test]
fn json_output_with_layers() {
    let workdir = tempfile::tempdir().expect("create temp dir");
    let assert = dxview(&workdir)
        .arg(fixture("basic_entities.dxf"))
        .args(["--format", "json", "--layers"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 输出");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("输出应为 JSON");
    assert_eq!(json["statistics"]["total_entities"], 13);
    assert_eq!(json["statistics"]["entities_by_type"]["LINE"], 2);
    assert_eq!(json["report"]["failed_entities"], 0);
    assert_eq!(json["layers"].as_array().map(Vec::len), Some(2));
}

#[test]
fn config_file_selects_output_format() {
    let workdir = tempfile::tempdir().expect("create temp dir");
    let config = workdir.path().join("dxview.toml");
    fs::write(&config, "[output]\nformat = \"json\"\n").expect("write config");
    dxview(&workdir)
        .arg(fixture("annotations.dxf"))
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn default_config_is_discovered_in_working_directory() {
    let workdir = tempfile::tempdir().expect("create temp dir");
    fs::create_dir(workdir.path().join("config")).expect("create config dir");
    fs::write(
        workdir.path().join("config").join("default.toml"),
        "[output]\nformat = \"json\"\n",
    )
    .expect("write config");
    dxview(&workdir)
        .arg(fixture("hatch_boundaries.dxf"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_entities\": 2"));
}

#[test]
fn missing_file_exits_with_error() {
    let workdir = tempfile::tempdir().expect("create temp dir");
    dxview(&workdir)
        .arg(workdir.path().join("missing.dxf"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("无法解析 DXF 文件"));
}

#[test]
fn malformed_dxf_exits_with_error() {
    let workdir = tempfile::tempdir().expect("create temp dir");
    let broken = workdir.path().join("broken.dxf");
    fs::write(&broken, "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n0\n30\n0\n0\nENDSEC\n0\nEOF\n").expect("write dxf");
    dxview(&workdir).arg(&broken).assert().code(1);
}
