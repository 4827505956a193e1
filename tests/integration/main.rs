//! Integration tests for Cachet

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// A cachet invocation isolated from the user's real configuration.
    fn cachet(workspace: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("cachet");
        cmd.env("CACHET_CONFIG", workspace.join("no-such-config.toml"))
            .current_dir(workspace);
        for var in [
            "CACHET_MOUNT",
            "CACHET_BACKEND",
            "CACHET_CACHE_KEY",
            "CACHET_NAMESPACE",
            "CACHET_ARCHIVE_FORMAT",
            "CACHET_COMPRESSION_LEVEL",
            "CACHET_SKIP_SYMLINKS",
            "CACHET_FILESYSTEM_ROOT",
            "CACHET_TIMEOUT",
            "CACHET_TTL",
            "CACHET_FAIL_ON_ERROR",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn transfer_flags(cmd: &mut Command, remote: &Path) {
        cmd.args([
            "--no-local",
            "--backend",
            "filesystem",
            "--repo-name",
            "itest",
            "--commit-branch",
            "main",
        ])
        .arg("--filesystem-root")
        .arg(remote);
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        cachet(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("streaming build cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        cachet(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cachet"));
    }

    #[test]
    fn rebuild_requires_mount() {
        let temp = TempDir::new().unwrap();
        cachet(temp.path())
            .args(["rebuild", "--no-local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--mount"));
    }

    #[test]
    fn unknown_backend_rejected() {
        let temp = TempDir::new().unwrap();
        cachet(temp.path())
            .args(["rebuild", "--no-local", "--mount", "deps", "--backend", "tape"])
            .assert()
            .failure();
    }

    #[test]
    fn rebuild_then_restore_round_trips() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let mount = temp.path().join("node_modules");

        fs::create_dir_all(mount.join("pkg")).unwrap();
        fs::write(mount.join("pkg").join("index.js"), b"module.exports = 1;\n").unwrap();
        fs::write(mount.join("manifest.json"), b"{}\n").unwrap();

        let mut rebuild = cachet(temp.path());
        rebuild.arg("rebuild").arg("--mount").arg(&mount);
        transfer_flags(&mut rebuild, &remote);
        rebuild.assert().success();

        // something landed under the namespace
        assert!(remote.join("itest").is_dir());

        // wipe the workspace, as a fresh pipeline run would see it
        fs::remove_dir_all(&mount).unwrap();

        let mut restore = cachet(temp.path());
        restore.arg("restore").arg("--mount").arg(&mount);
        transfer_flags(&mut restore, &remote);
        restore.assert().success();

        assert_eq!(
            fs::read(mount.join("pkg").join("index.js")).unwrap(),
            b"module.exports = 1;\n"
        );
        assert_eq!(fs::read(mount.join("manifest.json")).unwrap(), b"{}\n");
    }

    #[test]
    fn gzip_round_trip() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let mount = temp.path().join("deps");

        fs::create_dir_all(&mount).unwrap();
        fs::write(mount.join("lib.a"), b"0123456789").unwrap();

        let mut rebuild = cachet(temp.path());
        rebuild
            .arg("rebuild")
            .arg("--mount")
            .arg(&mount)
            .args(["--archive-format", "gzip", "--compression-level", "9"]);
        transfer_flags(&mut rebuild, &remote);
        rebuild.assert().success();

        fs::remove_dir_all(&mount).unwrap();

        let mut restore = cachet(temp.path());
        restore
            .arg("restore")
            .arg("--mount")
            .arg(&mount)
            .args(["--archive-format", "gzip"]);
        transfer_flags(&mut restore, &remote);
        restore.assert().success();

        assert_eq!(fs::read(mount.join("lib.a")).unwrap(), b"0123456789");
    }

    #[test]
    fn missing_mount_is_isolated_and_does_not_break_the_build() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let exists = temp.path().join("deps");
        let missing = temp.path().join("never-created");

        fs::create_dir_all(&exists).unwrap();
        fs::write(exists.join("a.txt"), b"aaa").unwrap();

        let mut rebuild = cachet(temp.path());
        rebuild
            .arg("rebuild")
            .arg("--mount")
            .arg(&exists)
            .arg("--mount")
            .arg(&missing);
        transfer_flags(&mut rebuild, &remote);

        // recognized cache failure: reported, but exit code stays zero
        rebuild
            .assert()
            .success()
            .stderr(predicate::str::contains("never-created"))
            .stderr(predicate::str::contains("deps").not());

        // the healthy mount was still uploaded
        assert!(remote.join("itest").is_dir());
    }

    #[test]
    fn fail_on_error_makes_cache_failures_fatal() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let missing = temp.path().join("never-created");

        let mut rebuild = cachet(temp.path());
        rebuild
            .arg("rebuild")
            .arg("--mount")
            .arg(&missing)
            .arg("--fail-on-error");
        transfer_flags(&mut rebuild, &remote);

        rebuild
            .assert()
            .failure()
            .stderr(predicate::str::contains("never-created"));
    }

    #[test]
    fn restore_miss_is_not_fatal_by_default() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let mount = temp.path().join("deps");

        let mut restore = cachet(temp.path());
        restore.arg("restore").arg("--mount").arg(&mount);
        transfer_flags(&mut restore, &remote);

        restore
            .assert()
            .success()
            .stderr(predicate::str::contains("download"));
    }

    #[test]
    fn unsupported_backend_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mount = temp.path().join("deps");
        fs::create_dir_all(&mount).unwrap();

        cachet(temp.path())
            .arg("rebuild")
            .arg("--mount")
            .arg(&mount)
            .args(["--no-local", "--backend", "s3"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not compiled"));
    }

    #[test]
    fn flush_sweeps_expired_entries() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let object = remote.join("itest").join("somekey").join("deps");

        fs::create_dir_all(object.parent().unwrap()).unwrap();
        fs::write(&object, b"stale archive").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let mut flush = cachet(temp.path());
        flush
            .args(["flush", "--no-local", "--prefix", "itest", "--ttl", "0s"])
            .args(["--backend", "filesystem"])
            .arg("--filesystem-root")
            .arg(&remote);
        flush.assert().success();

        assert!(!object.exists());
    }

    #[test]
    fn flush_keeps_fresh_entries() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let object = remote.join("itest").join("somekey").join("deps");

        fs::create_dir_all(object.parent().unwrap()).unwrap();
        fs::write(&object, b"fresh archive").unwrap();

        let mut flush = cachet(temp.path());
        flush
            .args(["flush", "--no-local", "--prefix", "itest", "--ttl", "30d"])
            .args(["--backend", "filesystem"])
            .arg("--filesystem-root")
            .arg(&remote);
        flush.assert().success();

        assert!(object.exists());
    }

    #[test]
    fn local_config_supplies_backend_root() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote");
        let mount = temp.path().join("deps");
        fs::create_dir_all(&mount).unwrap();
        fs::write(mount.join("a.txt"), b"aaa").unwrap();

        fs::write(
            temp.path().join(".cachet.toml"),
            format!(
                "[filesystem]\nroot = \"{}\"\n",
                remote.display()
            ),
        )
        .unwrap();

        cachet(temp.path())
            .arg("rebuild")
            .arg("--mount")
            .arg(&mount)
            .args(["--backend", "filesystem", "--repo-name", "itest"])
            .assert()
            .success();

        assert!(remote.join("itest").is_dir());
    }
}
