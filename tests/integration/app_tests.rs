//! Full application runs through `run_app`.

use clap::Parser;
use spandupe::cli::Cli;
use spandupe::error::ExitCode;
use spandupe::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["spandupe", "-q", "--no-progress"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_dry_run_leaves_files_in_place() {
    let mount = tempdir().unwrap();
    for id in ["disk1", "disk2"] {
        let root = mount.path().join(id);
        fs::create_dir_all(root.join("movies")).unwrap();
        fs::write(root.join("movies/X.mkv"), b"same movie").unwrap();
    }
    let root = path_arg(mount.path());

    let code = run_app(cli(&["--volumes-root", &root, "--dry-run"])).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(mount.path().join("disk1/movies/X.mkv").exists());
    assert!(mount.path().join("disk2/movies/X.mkv").exists());
}

#[test]
fn test_delete_run_keeps_exactly_one_copy() {
    let mount = tempdir().unwrap();
    let mut roots = Vec::new();
    for id in ["a", "b", "c"] {
        let root = mount.path().join(id);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("shared.bin"), b"identical").unwrap();
        roots.push(path_arg(&root));
    }

    let code = run_app(cli(&[
        "--volume", &roots[0], "--volume", &roots[1], "--volume", &roots[2], "--io-threads", "1",
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let remaining = ["a", "b", "c"]
        .iter()
        .filter(|id| mount.path().join(id).join("shared.bin").exists())
        .count();
    assert_eq!(remaining, 1);
}

#[test]
fn test_json_output_run_succeeds() {
    let mount = tempdir().unwrap();
    for id in ["disk1", "disk2"] {
        fs::create_dir_all(mount.path().join(id)).unwrap();
        fs::write(mount.path().join(id).join("f.txt"), b"x").unwrap();
    }
    let root = path_arg(mount.path());

    let code = run_app(cli(&["--volumes-root", &root, "--dry-run", "--output", "json"])).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_single_volume_is_fatal() {
    let mount = tempdir().unwrap();
    fs::create_dir(mount.path().join("disk1")).unwrap();
    let root = path_arg(mount.path());

    let err = run_app(cli(&["--volumes-root", &root])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::FatalConfiguration);
}

#[test]
fn test_missing_reference_directory_is_fatal() {
    let mount = tempdir().unwrap();
    fs::create_dir(mount.path().join("b")).unwrap();
    let a = path_arg(&mount.path().join("a"));
    let b = path_arg(&mount.path().join("b"));

    let err = run_app(cli(&["--volume", &a, "--volume", &b])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::FatalConfiguration);
    assert!(format!("{err:#}").contains("Reference directory not found"));
}

#[test]
fn test_unknown_reference_is_fatal() {
    let mount = tempdir().unwrap();
    for id in ["disk1", "disk2"] {
        fs::create_dir(mount.path().join(id)).unwrap();
    }
    let root = path_arg(mount.path());

    let err = run_app(cli(&["--volumes-root", &root, "--reference", "disk9"])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::FatalConfiguration);
}

#[test]
fn test_no_volume_source_is_fatal() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("empty.toml");
    fs::write(&config, "").unwrap();
    let config = path_arg(&config);

    let err = run_app(cli(&["--config", &config])).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::FatalConfiguration);
}

#[cfg(unix)]
#[test]
fn test_absorbed_file_errors_are_silent_at_default_verbosity() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;

    let mount = tempdir().unwrap();
    for id in ["disk1", "disk2"] {
        let root = mount.path().join(id);
        fs::create_dir_all(root.join("stuck")).unwrap();
        fs::write(root.join("locked.bin"), b"cannot read me").unwrap();
        fs::write(root.join("stuck/s.bin"), b"cannot remove me").unwrap();
        fs::write(root.join("ok.bin"), b"plain duplicate").unwrap();
    }
    let locked = mount.path().join("disk2/locked.bin");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    let stuck_dirs: Vec<_> = ["disk1", "disk2"]
        .iter()
        .map(|id| mount.path().join(id).join("stuck"))
        .collect();
    for dir in &stuck_dirs {
        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
    }

    // Permission bits do not bind a privileged user.
    if fs::read(&locked).is_ok() {
        for dir in &stuck_dirs {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
        }
        return;
    }

    let output = Command::new(env!("CARGO_BIN_EXE_spandupe"))
        .args(["--no-progress", "--no-color", "--io-threads", "1", "--volumes-root"])
        .arg(mount.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    for dir in &stuck_dirs {
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Files deleted:          1"));
    assert!(stdout.contains("Deletion failures:      1"));
    assert!(stdout.contains("Unreadable files:       1"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    for needle in ["locked.bin", "s.bin", "ok.bin", "Deleted", "Failed", "Permission denied"] {
        assert!(!stderr.contains(needle), "stderr mentions {needle}: {stderr}");
    }
}
