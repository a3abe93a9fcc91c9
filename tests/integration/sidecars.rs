use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestCatalog;

#[test]
fn test_list_hides_experimental_by_default() {
    let catalog = TestCatalog::new().unwrap();

    catalog
        .devc()
        .args(["sidecars", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("neko-chrome"))
        .stdout(predicate::str::contains("test-browser"))
        .stdout(predicate::str::contains("neko-firefox").not());
}

#[test]
fn test_list_all_as_json() {
    let catalog = TestCatalog::new().unwrap();

    let assert = catalog.devc().args(["sidecars", "list", "--all", "--format", "json"]).assert().success();
    let sidecars: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let ids: Vec<&str> = sidecars.as_array().unwrap().iter().filter_map(|s| s["id"].as_str()).collect();

    assert_eq!(ids, vec!["neko-chrome", "neko-firefox", "kasm-chrome", "test-browser"]);
}

#[test]
fn test_registry_entry_overrides_builtin() {
    let catalog = TestCatalog::new().unwrap();
    std::fs::write(
        catalog.root().join("catalog/sidecars.json"),
        r#"{"sidecars": [{"id": "neko-chrome", "label": "Campus Chrome", "templatePath": "sidecars/campus/.template"}]}"#,
    )
    .unwrap();

    catalog
        .devc()
        .args(["sidecars", "show", "neko-chrome"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Campus Chrome"))
        .stdout(predicate::str::contains("sidecars/campus/.template"));
}

#[test]
fn test_show_descriptor() {
    let catalog = TestCatalog::new().unwrap();

    catalog
        .devc()
        .args(["sidecars", "show", "kasm-chrome"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kasm Chrome"))
        .stdout(predicate::str::contains("requiredEnv:  KASM_PASSWORD"));
}

#[test]
fn test_show_unknown_sidecar() {
    let catalog = TestCatalog::new().unwrap();

    catalog
        .devc()
        .args(["sidecars", "show", "kasm-chrom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Did you mean 'kasm-chrome'?"));
}

#[test]
fn test_malformed_registry_is_reported() {
    let catalog = TestCatalog::new().unwrap();
    std::fs::write(catalog.root().join("catalog/sidecars.json"), "{ not json").unwrap();

    catalog
        .devc()
        .args(["sidecars", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid sidecar registry"));
}
