//! Integration tests for readthrough

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn readthrough() -> Command {
        let mut cmd = cargo_bin_cmd!("readthrough");
        cmd.env_remove("READTHROUGH_CONFIG");
        cmd
    }

    /// Write a config that keeps all state inside `dir`
    fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        let caches = dir.join("caches");
        let content = format!(
            "[storage]\ndir = \"{}\"\n\n{}",
            caches.display().to_string().replace('\\', "\\\\"),
            extra
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        readthrough()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("read-through"));
    }

    #[test]
    fn version_displays() {
        readthrough()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("readthrough"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("read-through-cache"));
    }

    #[test]
    fn config_set_persists() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "cache.version", "3"])
            .assert()
            .success();

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("version = 3"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[cache]\nprecache = \"images\"\n");

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("caches")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn caches_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("caches")
            .assert()
            .success()
            .stdout(predicate::str::contains("No caches"));
    }

    #[test]
    fn fetch_before_activation_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["fetch", "styles/main.css"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cannot serve while worker is parsed"))
            .stderr(predicate::str::contains("readthrough up"));
    }

    #[test]
    fn activate_before_install_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cannot activate"));
    }

    #[test]
    fn install_fails_when_origin_unreachable() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            "[network]\norigin = \"http://127.0.0.1:9\"\ntimeout_secs = 2\n",
        );

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("styles/main.css"));

        // Nothing was stored for the failed version
        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["caches", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"entries\": 1").not());
    }

    #[test]
    fn up_purges_stale_caches() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[cache]\nmanifest = []\n");
        let stale = temp.path().join("caches").join("read-through-cache-v0");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join(".readthrough-cache"), "read-through-cache-v0").unwrap();
        let unrelated = temp.path().join("caches").join("notes");
        std::fs::create_dir_all(&unrelated).unwrap();
        std::fs::write(unrelated.join("todo.txt"), "keep me").unwrap();

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("up")
            .assert()
            .success()
            .stdout(predicate::str::contains("read-through-cache-v0"))
            .stdout(predicate::str::contains("read-through-cache-v1"));

        assert!(!stale.exists());
        assert!(unrelated.join("todo.txt").exists());

        readthrough()
            .arg("--config")
            .arg(&config)
            .args(["caches", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::diff("read-through-cache-v1\n"));
    }

    #[test]
    fn install_then_activate_across_invocations() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[cache]\nmanifest = []\n");

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("install")
            .assert()
            .success();

        readthrough()
            .arg("--config")
            .arg(&config)
            .arg("activate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Activated"));
    }

    #[test]
    fn failed_upgrade_keeps_previous_version_active() {
        let temp = TempDir::new().unwrap();
        let v1 = write_config(temp.path(), "[cache]\nmanifest = []\n");
        readthrough().arg("--config").arg(&v1).arg("up").assert().success();

        // Relative manifest entries cannot be fetched without an origin
        let v2 = temp.path().join("v2.toml");
        std::fs::write(
            &v2,
            std::fs::read_to_string(&v1)
                .unwrap()
                .replace("manifest = []", "version = 2\nmanifest = [\"app.js\"]"),
        )
        .unwrap();
        readthrough()
            .arg("--config")
            .arg(&v2)
            .arg("install")
            .assert()
            .failure()
            .stdout(predicate::str::contains("nothing stored for version 2"));

        readthrough()
            .arg("--config")
            .arg(&v1)
            .arg("activate")
            .assert()
            .success();
    }
}
