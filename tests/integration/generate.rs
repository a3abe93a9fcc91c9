use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestCatalog;
use devc_stack::test_utils::fixtures::{SECTIONED_DEVCONTAINER, TEMPLATE_ID};

#[test]
fn test_generate_merges_browser() {
    let catalog = TestCatalog::new().unwrap();
    let out = catalog.output();

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--out"])
        .arg(&out)
        .args(["--with-browser", "test-browser"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated 'demo-stack'"))
        .stdout(predicate::str::contains("3000 → 45000"))
        .stdout(predicate::str::contains("Test Browser uses default credential TEST_BROWSER_PASSWORD"));

    let compose = catalog.read_output("docker-compose.yml");
    assert!(compose.contains("# Browser sidecar comment should survive merge"));
    assert!(compose.contains("\"45000:3000\""));

    let devcontainer: Value = serde_json::from_str(&catalog.read_output(".devcontainer/devcontainer.json")).unwrap();
    assert_eq!(devcontainer["portsAttributes"]["45000"]["label"], "Browser UI");
    assert_eq!(devcontainer["runServices"][0], "browser");
}

#[test]
fn test_generate_json_dry_run() {
    let catalog = TestCatalog::new().unwrap();
    let out = catalog.output();

    let assert = catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--dry-run", "--format", "json", "--with-browsers", "test-browser,test-browser"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let plan: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(plan["dryRun"], true);
    assert_eq!(plan["template"], TEMPLATE_ID);
    assert_eq!(plan["ports"].as_array().unwrap().len(), 2);
    assert!(
        plan["ports"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["declared"] == 3000 && p["assigned"] == 45000)
    );
    assert!(
        plan["files"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["path"] == "docker-compose.yml" && f["op"] == "modify")
    );
    assert!(!out.exists());
}

#[test]
fn test_generate_without_sidecars_copies_template() {
    let catalog = TestCatalog::with_devcontainer(SECTIONED_DEVCONTAINER).unwrap();
    let out = catalog.output();

    catalog.devc().args(["generate", TEMPLATE_ID, "--out"]).arg(&out).assert().success();

    assert_eq!(catalog.read_output(".devcontainer/devcontainer.json"), SECTIONED_DEVCONTAINER);
}

#[test]
fn test_generate_refuses_existing_output() {
    let catalog = TestCatalog::new().unwrap();
    let out = catalog.output();
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("notes.txt"), "keep me").unwrap();

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--with-browser", "test-browser", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to overwrite existing directory"));
    assert!(out.join("notes.txt").exists());

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--with-browser", "test-browser", "--force", "--out"])
        .arg(&out)
        .assert()
        .success();
    assert!(!out.join("notes.txt").exists());
}

#[test]
fn test_generate_unknown_sidecar_suggests() {
    let catalog = TestCatalog::new().unwrap();

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--out", "out", "--with-browser", "neko-chrom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown sidecar: neko-chrom"))
        .stderr(predicate::str::contains("neko-chrome"));
}

#[test]
fn test_generate_experimental_needs_opt_in() {
    let catalog = TestCatalog::new().unwrap();

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--out", "out", "--with-browser", "neko-firefox"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("experimental"));
}

#[test]
fn test_generate_strict_fails_on_warnings() {
    let catalog = TestCatalog::new().unwrap();
    let out = catalog.output();

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--with-browser", "test-browser", "--strict", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("warning(s) reported in strict mode"));
    assert!(!out.exists());
}

#[test]
fn test_config_warnings_as_errors() {
    let catalog = TestCatalog::new().unwrap();
    catalog.write_config("[merge]\nwarnings_as_errors = true\n").unwrap();

    catalog
        .devc()
        .args(["generate", TEMPLATE_ID, "--with-browser", "test-browser", "--dry-run", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn test_generate_missing_template() {
    let catalog = TestCatalog::new().unwrap();

    catalog
        .devc()
        .args(["generate", "no-such-template", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Template 'no-such-template' not found"));
}
