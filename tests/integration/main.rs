//! Integration tests for swgate

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn swgate() -> Command {
        cargo_bin_cmd!("swgate")
    }

    /// Config with the journal off and a short reload delay
    fn quiet_config(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[general]\naudit_log = false\n\n[update]\nreload_delay_ms = 10\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn help_displays() {
        swgate()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Offline cache lifecycle"));
    }

    #[test]
    fn version_displays() {
        swgate()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("swgate"));
    }

    #[test]
    fn resolve_denies_pending_user() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["resolve", "jobs", "--status", "pending", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("profile"))
            .stdout(predicate::str::contains("denied"));
    }

    #[test]
    fn resolve_json_output() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args([
                "resolve",
                "unknown-path",
                "--status",
                "approved",
                "--format",
                "json",
                "--config",
            ])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""resolvedView": "dashboard""#))
            .stdout(predicate::str::contains(r#""wasDenied": false"#));
    }

    #[test]
    fn resolve_always_allowed_without_status() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["resolve", "/notices?tab=new", "--format", "json", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""resolvedView": "notices""#));
    }

    #[test]
    fn routes_lists_table() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["routes", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("seller-chat"))
            .stdout(predicate::str::contains("jobs/:id"));
    }

    #[test]
    fn config_path() {
        swgate()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["config", "show", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("jobboard"));
    }

    #[test]
    fn config_init_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        swgate()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success();
        assert!(path.exists());

        swgate()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"))
            .stderr(predicate::str::contains("--force"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["routes", "--config"])
            .arg(dir.path().join("absent.toml"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn invalid_config_reports_reason() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nprecache = []\n").unwrap();

        swgate()
            .args(["cache", "plan", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_plan_json() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["cache", "plan", "--format", "json", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""bucket": "jobboard-v1""#))
            .stdout(predicate::str::contains("/manifest.json"));
    }

    #[test]
    fn simulate_reloads_every_tab() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["simulate", "--tabs", "3", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("tab 3"))
            .stdout(predicate::str::contains("All tabs reloaded onto jobboard-v2"));
    }

    #[test]
    fn simulate_failed_install_keeps_current() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["simulate", "--fail", "/static/js/bundle.js", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("jobboard-v2 failed to precache"))
            .stdout(predicate::str::contains("jobboard-v1 still serves"));
    }

    #[test]
    fn simulate_rejects_last_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[general]\naudit_log = false\n\n[cache]\nversion = 4294967295\n",
        )
        .unwrap();

        swgate()
            .args(["simulate", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("has no successor"))
            .stderr(predicate::str::contains("panicked").not());
    }

    #[test]
    fn simulate_rejects_unknown_resource() {
        let dir = TempDir::new().unwrap();
        swgate()
            .args(["simulate", "--fail", "/nope.js", "--config"])
            .arg(quiet_config(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("not in the precache manifest"));
    }
}
