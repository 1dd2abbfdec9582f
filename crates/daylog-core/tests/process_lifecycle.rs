//! Process-level lifecycle tests
//!
//! Each scenario re-runs this test binary as a child process, selecting one
//! test by name and passing its log directory through an environment
//! variable. The child does the logging; the parent inspects how it exited
//! and what it left on disk.

#![cfg(unix)]

use std::env;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use daylog_core::{clock, create_logger, log_file_path, Logger, LoggerOptions};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

const CHILD_DIR: &str = "DAYLOG_TEST_CHILD_DIR";
const READY: &str = "daylog-child-ready";
const RECORDS: usize = 20_000;

fn options(dir: &Path, handle_interrupt: bool) -> LoggerOptions {
    LoggerOptions {
        log_dir: dir.to_path_buf(),
        caller_info: false,
        console: false,
        handle_interrupt,
        ..LoggerOptions::default()
    }
}

fn child(test: &str, dir: &Path) -> Command {
    let mut command = Command::new(env::current_exe().unwrap());
    command
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_DIR, dir);
    command
}

fn child_dir() -> Option<String> {
    env::var(CHILD_DIR).ok()
}

fn row_count(dir: &Path) -> usize {
    fs::read_to_string(log_file_path(dir, &clock::today()))
        .unwrap()
        .lines()
        .count()
}

// ============================================================================
// Normal exit
// ============================================================================

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Child: a logger that is never dropped, left behind when the process ends.
#[test]
fn child_static_logger() {
    let Some(dir) = child_dir() else { return };

    let logger = LOGGER.get_or_init(|| create_logger(options(Path::new(&dir), false)).unwrap());
    for i in 0..RECORDS {
        logger.info(format!("record {i}"));
    }
}

#[test]
fn test_static_logger_flushed_on_normal_exit() {
    if child_dir().is_some() {
        return;
    }
    let temp = TempDir::new().unwrap();

    let status = child("child_static_logger", temp.path())
        .stdout(Stdio::null())
        .status()
        .unwrap();

    assert!(status.success(), "{status:?}");
    assert_eq!(row_count(temp.path()), RECORDS);
}

// ============================================================================
// Interrupt
// ============================================================================

/// Child: logs, announces itself, then waits to be interrupted.
#[test]
fn child_interrupted_logger() {
    let Some(dir) = child_dir() else { return };

    let logger = create_logger(options(Path::new(&dir), true)).unwrap();
    for i in 0..RECORDS {
        logger.warn(format!("record {i}"));
    }
    println!("{READY}");

    loop {
        thread::sleep(Duration::from_secs(1));
    }
}

#[test]
fn test_interrupt_flushes_then_exits_130() {
    if child_dir().is_some() {
        return;
    }
    let temp = TempDir::new().unwrap();

    let mut process = child("child_interrupted_logger", temp.path())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let stdout = process.stdout.take().unwrap();
    let ready = BufReader::new(stdout)
        .lines()
        .map_while(Result::ok)
        .any(|line| line.contains(READY));
    assert!(ready, "child ended before logging");

    kill(Pid::from_raw(process.id() as i32), Signal::SIGINT).unwrap();
    let status = process.wait().unwrap();

    assert_eq!(status.code(), Some(130), "{status:?}");
    assert_eq!(row_count(temp.path()), RECORDS);
    let content = fs::read_to_string(log_file_path(temp.path(), &clock::today())).unwrap();
    assert!(content.lines().all(|l| l.contains(";WARNING;record ")));
}

// ============================================================================
// Failure reporting
// ============================================================================

/// Child: today's file is a link to a device that rejects every write.
#[cfg(target_os = "linux")]
#[test]
fn child_full_device() {
    let Some(dir) = child_dir() else { return };

    let dir = Path::new(&dir);
    std::os::unix::fs::symlink("/dev/full", log_file_path(dir, &clock::today())).unwrap();

    let logger = create_logger(options(dir, false)).unwrap();
    logger.error("cannot be stored");
    assert!(logger.close().is_err());
}

#[cfg(target_os = "linux")]
#[test]
fn test_write_failure_reported_on_stderr() {
    if child_dir().is_some() {
        return;
    }
    let temp = TempDir::new().unwrap();

    let Output { status, stderr, .. } = child("child_full_device", temp.path())
        .stdout(Stdio::null())
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&stderr);

    assert!(status.success(), "{status:?}: {stderr}");
    assert!(stderr.contains("daylog: failed to flush log file"), "{stderr}");
    assert!(stderr.contains(&clock::today()), "{stderr}");
}
