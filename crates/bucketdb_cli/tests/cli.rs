//! End-to-end tests that run the `bucketdb` binary against temp files.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const NO_ARGS: [&str; 0] = [];

struct Fixture {
    _dir: TempDir,
    db: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.dat");
        Self { _dir: dir, db }
    }

    fn run<I, S>(&self, command: &str, args: I) -> Output
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(env!("CARGO_BIN_EXE_bucketdb"))
            .arg(command)
            .arg(&self.db)
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }

    fn ok<I, S>(&self, command: &str, args: I) -> Vec<u8>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(command, args);
        assert!(
            output.status.success(),
            "{command} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output.stdout
    }
}

fn bucketdb(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bucketdb"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn assert_failure(output: &Output, message: &str) {
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("Error: {message}")),
        "stderr was {stderr:?}"
    );
}

fn assert_usage(output: &Output) {
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Usage:\n"), "stdout was {stdout:?}");
    assert!(stdout.contains("insert <db file> <bucket name> <key> <value>"));
}

#[test]
fn create_then_list_buckets() {
    let f = Fixture::new();
    assert!(f.ok("createbucket", ["users"]).is_empty());
    assert_eq!(f.ok("listbuckets", NO_ARGS), b"users\n");

    // Creating again keeps the bucket and its single listing.
    f.ok("createbucket", ["users"]);
    assert_eq!(f.ok("listbuckets", NO_ARGS), b"users\n");
}

#[test]
fn insert_then_read_key() {
    let f = Fixture::new();
    f.ok("createbucket", ["users"]);
    f.ok("insert", ["users", "alice", "30"]);
    assert_eq!(f.ok("readkey", ["users", "alice"]), b"Value: 30\n");
}

#[test]
fn read_all_in_key_order() {
    let f = Fixture::new();
    f.ok("createbucket", ["users"]);
    f.ok("insert", ["users", "bob", "25"]);
    f.ok("insert", ["users", "alice", "30"]);

    assert_eq!(
        f.ok("readall", ["users"]),
        b"Key: alice, Value: 30\nKey: bob, Value: 25\n"
    );
    assert_eq!(f.ok("listkeys", ["users"]), b"alice\nbob\n");
}

#[test]
fn deleted_key_is_not_found() {
    let f = Fixture::new();
    f.ok("createbucket", ["users"]);
    f.ok("insert", ["users", "alice", "30"]);
    f.ok("delete", ["users", "alice"]);

    let output = f.run("readkey", ["users", "alice"]);
    assert_failure(&output, "key alice not found in bucket users");

    // Deleting an absent key is fine.
    f.ok("delete", ["users", "alice"]);
}

#[test]
fn deleted_bucket_is_not_found() {
    let f = Fixture::new();
    f.ok("createbucket", ["users"]);
    f.ok("insert", ["users", "alice", "30"]);
    f.ok("deletebucket", ["users"]);

    assert_failure(&f.run("listkeys", ["users"]), "bucket users not found");
    assert_failure(&f.run("deletebucket", ["users"]), "bucket users not found");
    assert!(f.ok("listbuckets", NO_ARGS).is_empty());
}

#[test]
fn insert_never_creates_bucket() {
    let f = Fixture::new();
    assert_failure(&f.run("insert", ["ghosts", "x", "1"]), "bucket ghosts not found");
    assert!(f.ok("listbuckets", NO_ARGS).is_empty());
}

#[test]
fn usage_errors_print_summary_and_touch_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("never.dat");
    let db_arg = db.to_str().unwrap();

    assert_usage(&bucketdb(&[]));
    assert_usage(&bucketdb(&["listbuckets"]));
    assert_usage(&bucketdb(&["frobnicate", db_arg]));
    assert_usage(&bucketdb(&["readkey", db_arg, "users"]));
    assert_usage(&bucketdb(&["insert", db_arg, "users", "k", "v", "extra"]));
    assert!(!db.exists());
}

#[test]
fn help_exits_successfully() {
    let output = bucketdb(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("listbuckets"));
}

#[test]
fn empty_value_round_trips() {
    let f = Fixture::new();
    f.ok("createbucket", ["b"]);
    f.ok("insert", ["b", "k", ""]);
    assert_eq!(f.ok("readkey", ["b", "k"]), b"Value: \n");
}

#[test]
fn state_persists_in_the_file() {
    let f = Fixture::new();
    f.ok("createbucket", ["a"]);
    f.ok("createbucket", ["c"]);
    f.ok("createbucket", ["b"]);
    assert_eq!(f.ok("listbuckets", NO_ARGS), b"a\nb\nc\n");
    assert!(f.db.metadata().unwrap().len() > 0);
}

#[cfg(unix)]
#[test]
fn database_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let f = Fixture::new();
    f.ok("listbuckets", NO_ARGS);
    let mode = f.db.metadata().unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn non_utf8_bytes_round_trip() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let f = Fixture::new();
    let bucket = OsString::from_vec(b"b\xfe".to_vec());
    let key = OsString::from_vec(b"k\xff".to_vec());
    let value = OsString::from_vec(b"\x80v".to_vec());

    f.ok("createbucket", [&bucket]);
    f.ok("insert", [&bucket, &key, &value]);

    assert_eq!(f.ok("listbuckets", NO_ARGS), b"b\xfe\n");
    assert_eq!(f.ok("readkey", [&bucket, &key]), b"Value: \x80v\n");
    assert_eq!(f.ok("readall", [&bucket]), b"Key: k\xff, Value: \x80v\n");
}

#[test]
fn verbose_logs_go_to_stderr() {
    let f = Fixture::new();
    let output = Command::new(env!("CARGO_BIN_EXE_bucketdb"))
        .args(["--verbose", "createbucket"])
        .arg(&f.db)
        .arg("users")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!output.stderr.is_empty());
}

#[test]
fn foreign_file_is_reported_not_overwritten() {
    let f = Fixture::new();
    std::fs::write(&f.db, b"definitely not a database").unwrap();

    let output = f.run("listbuckets", NO_ARGS);
    assert_failure(&output, &format!("{}: ", f.db.display()));
    assert_eq!(std::fs::read(&f.db).unwrap(), b"definitely not a database");
}

#[test]
fn missing_directory_is_reported_with_the_path() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("no-such-dir").join("db.dat");

    let output = bucketdb(&["listbuckets", db.to_str().unwrap()]);
    assert_failure(&output, &format!("{}: ", db.display()));
    assert!(!db.exists());
}

#[test]
fn locked_file_is_reported_with_the_path() {
    let f = Fixture::new();
    f.ok("createbucket", ["users"]);
    let held = bucketdb_core::Database::open(&f.db).unwrap();

    let output = f.run("listbuckets", NO_ARGS);
    assert_failure(&output, &format!("{}: database locked", f.db.display()));

    held.close().unwrap();
    drop(held);
    assert_eq!(f.ok("listbuckets", NO_ARGS), b"users\n");
}

#[test]
fn short_flag_lookalikes_are_names() {
    let f = Fixture::new();
    f.ok("createbucket", ["-v"]);
    f.ok("insert", ["-v", "-h", "-v"]);

    assert_eq!(f.ok("listbuckets", NO_ARGS), b"-v\n");
    assert_eq!(f.ok("readkey", ["-v", "-h"]), b"Value: -v\n");
}
