use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_cli_help() {
    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    let assert = cmd.arg("--help").assert();

    // On Windows, the binary name in help might be "seodesk.exe"
    let expected_pattern = if cfg!(windows) {
        "seodesk.exe [OPTIONS] <COMMAND>"
    } else {
        "seodesk [OPTIONS] <COMMAND>"
    };

    assert
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains(expected_pattern))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("rebuild-redirects"));
}

#[test]
fn test_analyze_help_lists_workflow_flags() {
    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.args(["analyze", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--sitemap"))
        .stdout(predicate::str::contains("--page"))
        .stdout(predicate::str::contains("--accept-limit"));
}

#[test]
fn test_zero_max_urls_is_rejected() {
    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.args(["analyze", "https://example.com", "--max-urls", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value '0'"));
}

#[test]
fn test_missing_subcommand_fails() {
    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.assert().failure();
}

#[test]
fn test_serve_requires_secrets() {
    let dir = tempdir().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.current_dir(dir.path())
        .env_remove("JWT_SECRET")
        .env_remove("ADMIN_EMAIL")
        .env_remove("ADMIN_PASSWORD")
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing required environment variable: JWT_SECRET",
        ));

    // Nothing was created before the check failed
    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_migrate_then_rebuild_redirects() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("site.db");
    let db_arg = db_path.to_str().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.current_dir(dir.path())
        .args(["migrate", "--database", db_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("schema version 4"))
        .stdout(predicate::str::contains("Seeded 1 author(s) and 4 categories"));
    assert!(db_path.exists());

    // Seeding a second time adds nothing
    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.current_dir(dir.path())
        .args(["migrate", "--database", db_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded").not());

    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.current_dir(dir.path())
        .args(["rebuild-redirects", "--database", db_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 0 redirection(s)"));

    let cache = fs::read_to_string(dir.path().join("data/redirects.json")).unwrap();
    assert_eq!(cache.trim(), "{}");
}

#[test]
fn test_config_file_sets_redirect_cache_path() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("custom.toml");
    fs::write(
        &config_path,
        r#"
database_path = "store/site.db"
redirects_cache_path = "public/redirects.json"
"#,
    )
    .unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.current_dir(dir.path())
        .args(["--config", config_path.to_str().unwrap(), "rebuild-redirects"])
        .assert()
        .success();

    assert!(dir.path().join("store/site.db").exists());
    assert!(dir.path().join("public/redirects.json").exists());
}

#[test]
fn test_unreadable_config_is_an_error() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("broken.json");
    fs::write(&config_path, "{ not json").unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("seodesk");
    cmd.current_dir(dir.path())
        .args(["--config", config_path.to_str().unwrap(), "migrate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse JSON config"));
}
