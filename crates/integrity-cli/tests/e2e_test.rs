//! E2E tests for the integrity binary
//!
//! Each test runs the built binary with HOME and the working directory
//! pointed at a scratch dir so no real config file leaks in.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to run integrity inside `home`
fn integrity(home: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    command(home, args, envs)
        .output()
        .expect("Failed to execute integrity")
}

fn command(home: &Path, args: &[&str], envs: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_integrity"));
    cmd.args(args)
        .current_dir(home)
        .env("HOME", home)
        .env_remove("INTEGRITY_RESERVE_PERCENT")
        .env_remove("INTEGRITY_MAX_FILE_SIZE")
        .env_remove("INTEGRITY_LOG_LEVEL")
        .env_remove("INTEGRITY_LOG")
        .env_remove("RUST_LOG");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn integrity_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().contains(":integrity"))
        .collect();
    files.sort();
    files
}

/// Recreate a file into a fresh data dir and return its path
fn recreate(home: &Path, data: &Path, seed: &str, size: &str) -> PathBuf {
    let output = integrity(home, &["recreate", data.to_str().unwrap(), seed, size], &[]);
    assert!(output.status.success(), "recreate failed: {}", stdout(&output));
    let out = stdout(&output);
    let path = out
        .trim()
        .strip_prefix("File recreated as ")
        .expect("recreate should report the path");
    PathBuf::from(path)
}

// ========== Recreate / Verify ==========

#[test]
fn e2e_recreate_then_verify_ok() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let path = recreate(home.path(), &data, "1234", "4096");
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    assert!(path.to_string_lossy().contains("-1234-4096:"));

    let output = integrity(home.path(), &["verify", path.to_str().unwrap()], &[]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("validates [OK]!"));
}

#[test]
fn e2e_recreate_negative_seed_round_trips() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let path = recreate(home.path(), &data, "-77", "100");
    assert!(path.to_string_lossy().contains("--77-100:"));

    let output = integrity(home.path(), &["verify", path.to_str().unwrap()], &[]);
    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
}

#[test]
fn e2e_recreate_twice_adds_suffix() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let first = recreate(home.path(), &data, "9", "512");
    let second = recreate(home.path(), &data, "9", "512");
    assert_eq!(
        second.to_string_lossy(),
        format!("{}.0", first.to_string_lossy())
    );
    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn e2e_recreate_into_file_is_not_a_directory() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("plain");
    std::fs::write(&file, b"x").unwrap();

    let output = integrity(home.path(), &["recreate", file.to_str().unwrap(), "1", "10"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("is not a directory!"));
}

#[test]
fn e2e_verify_flipped_byte_exits_2() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let path = recreate(home.path(), &data, "42", "1024");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[100] = if bytes[100] == b'A' { b'B' } else { b'A' };
    std::fs::write(&path, bytes).unwrap();

    let output = integrity(home.path(), &["verify", path.to_str().unwrap()], &[]);
    assert_eq!(output.status.code(), Some(2));
    let out = stdout(&output);
    assert!(out.contains("corrupt [ERROR]!"));
}

#[test]
fn e2e_verify_stops_at_first_corrupt_file() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let good = recreate(home.path(), &data, "1", "64");
    let bogus = data.join("not-an-integrity-file");
    std::fs::write(&bogus, b"hello").unwrap();
    let later = recreate(home.path(), &data, "2", "64");

    let output = integrity(
        home.path(),
        &[
            "verify",
            good.to_str().unwrap(),
            bogus.to_str().unwrap(),
            later.to_str().unwrap(),
        ],
        &[],
    );
    assert_eq!(output.status.code(), Some(2));
    let out = stdout(&output);
    assert!(out.contains(&format!("File {} validates", good.display())));
    assert!(out.contains(&format!("File {} corrupt", bogus.display())));
    assert!(!out.contains(&format!("File {} validates", later.display())));
}

// ========== Run ==========

#[test]
fn e2e_run_on_file_is_not_a_directory() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("plain");
    std::fs::write(&file, b"x").unwrap();

    let output = integrity(home.path(), &["run", file.to_str().unwrap()], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("is not a directory!"));
}

#[test]
fn e2e_run_capped_volume_completes_cycles() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let output = integrity(
        home.path(),
        &[
            "run",
            data.to_str().unwrap(),
            "--capacity",
            "262144",
            "--cycles",
            "2",
            "--seed",
            "7",
        ],
        &[("INTEGRITY_MAX_FILE_SIZE", "8192")],
    );
    let out = stdout(&output);
    assert!(output.status.success(), "run failed: {out}");
    assert!(out.contains("Completed 2 cycles"));
    assert!(out.contains("We created "));

    // Whatever survived the last reclaim still verifies
    let survivors = integrity_files(&data);
    assert!(!survivors.is_empty());
    let mut args = vec!["verify".to_string()];
    args.extend(survivors.iter().map(|p| p.to_string_lossy().into_owned()));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = integrity(home.path(), &args, &[]);
    assert!(output.status.success(), "{}", stdout(&output));
}

#[test]
fn e2e_run_quit_on_full_stops_at_floor() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let output = integrity(
        home.path(),
        &[
            "run",
            data.to_str().unwrap(),
            "--capacity",
            "131072",
            "--quit-on-full",
        ],
        &[("INTEGRITY_MAX_FILE_SIZE", "4096")],
    );
    let out = stdout(&output);
    assert!(output.status.success(), "run failed: {out}");
    assert!(out.contains("Exiting on full request"));

    let used: u64 = integrity_files(&data)
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .sum();
    assert!(used >= 131072 / 2, "stopped early at {used} bytes");
    assert!(used <= 131072);
}

#[cfg(unix)]
#[test]
fn e2e_run_sigterm_prints_summary() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let mut child = command(
        home.path(),
        &[
            "run",
            data.to_str().unwrap(),
            "--capacity",
            "1000000000000",
        ],
        &[("INTEGRITY_MAX_FILE_SIZE", "65536")],
    )
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .expect("Failed to spawn integrity");

    // Handlers are installed before the first file is written
    let deadline = Instant::now() + Duration::from_secs(30);
    while integrity_files(&data).is_empty() {
        assert!(Instant::now() < deadline, "run never created a file");
        std::thread::sleep(Duration::from_millis(20));
    }

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    assert!(stdout(&output).contains("Exiting: We created"));
}

#[test]
fn e2e_run_overflowing_size_config_is_reported() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let output = integrity(
        home.path(),
        &["run", data.to_str().unwrap(), "--capacity", "65536"],
        &[("INTEGRITY_MAX_FILE_SIZE", "18446744073709551615")],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("overflows"), "{stderr}");
    assert!(integrity_files(&data).is_empty());
}

// ========== Config ==========

#[test]
fn e2e_config_show_returns_valid_toml() {
    let home = TempDir::new().unwrap();
    let output = integrity(home.path(), &["config", "show"], &[]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("[fill]"), "Missing [fill] section");
    assert!(out.contains("[logging]"), "Missing [logging] section");

    let parsed: integrity_config::Config = toml::from_str(&out).expect("config show should be valid TOML");
    assert_eq!(parsed.fill.reserve_percent, 50);
}

#[test]
fn e2e_config_show_reflects_project_file() {
    let home = TempDir::new().unwrap();
    std::fs::create_dir(home.path().join(".integrity")).unwrap();
    std::fs::write(
        home.path().join(".integrity/config.toml"),
        "[fill]\nreserve_percent = 20\n",
    )
    .unwrap();

    let output = integrity(home.path(), &["config", "show"], &[]);
    assert!(output.status.success());
    let parsed: integrity_config::Config = toml::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed.fill.reserve_percent, 20);
}

#[test]
fn e2e_config_path_shows_locations() {
    let home = TempDir::new().unwrap();
    let output = integrity(home.path(), &["config", "path"], &[]);
    let out = stdout(&output);

    assert!(output.status.success());
    assert!(out.contains("Global:"));
    assert!(out.contains("Project:"));
    assert!(out.contains(".integrity/config.toml"));
}

#[test]
fn e2e_invalid_env_override_fails() {
    let home = TempDir::new().unwrap();
    let output = integrity(
        home.path(),
        &["config", "show"],
        &[("INTEGRITY_RESERVE_PERCENT", "lots")],
    );
    assert!(!output.status.success());
}
