//! CLI output tests: run the `testbed` binary against a scratch project and snapshot what it prints.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn testbed_bin() -> &'static str {
    env!("CARGO_BIN_EXE_testbed")
}

fn write(dir: &Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

/// A project with a config file, two fixtures and one passing transcript.
fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "testbed.json",
        r#"{"entities": [{"name": "polls.poll", "fields": ["question", "votes"]}, "polls.choice"]}"#,
    );
    write(
        dir.path(),
        "fixtures/polls.json",
        r#"[
  {"model": "polls.poll", "pk": 1, "fields": {"question": "What's up?", "votes": 0}},
  {"model": "polls.poll", "pk": 2, "fields": {"question": "Lunch?", "votes": 4}}
]"#,
    );
    write(dir.path(), "fixtures/choices.fixture", "[polls.choice 1]\npoll = 1\ntext = \"Not much\"\n");
    write(
        dir.path(),
        "tests/polls.transcript",
        "@unit counts\n@fixtures polls\n>>> count polls.poll\n2\n>>> get polls.poll 1\n{\"question\": \"What's up?\", \"votes\": 0}\n\n\
         @unit empty\n>>> count polls.poll\n0\n",
    );
    dir
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(testbed_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("TESTBED_FIXTURE_DIRS")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_passing_run() {
    let dir = project();
    let output = run(dir.path(), &["test", "tests"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    collected 2 units

    polls::counts PASSED
    polls::empty PASSED

    =================== 2 run: 2 passed, 0 failed, 0 errored ===================
    ");
}

#[test]
fn test_failing_run_shows_exact_mismatch() {
    let dir = project();
    write(
        dir.path(),
        "tests/wrong.transcript",
        "@unit votes\n@fixtures polls\n>>> count polls.poll\n3\n",
    );
    let output = run(dir.path(), &["test", "tests/wrong.transcript"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "");
    insta::assert_snapshot!(stdout(&output), @r"
    collected 1 unit

    wrong::votes FAILED

    =================== FAILURES ===================
    FAILED wrong::votes
        line 3: >>> count polls.poll
        expected:
            3
        actual:
            2

    note: output is compared exactly; whitespace and quote style are significant

    =================== 1 run: 0 passed, 1 failed, 0 errored ===================
    ");
}

#[test]
fn test_keyword_filter_and_skip() {
    let dir = project();
    write(dir.path(), "tests/later.transcript", "@unit pending\n@skip needs migrations\n>>> count polls.poll\n0\n");
    let output = run(dir.path(), &["test", "tests", "-k", "e"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    collected 2 units

    later::pending SKIPPED (needs migrations)
    polls::empty PASSED

    =================== 1 run: 1 passed, 0 failed, 0 errored, 1 skipped ===================
    ");
}

#[test]
fn test_bad_transcript_is_reported_and_rest_still_runs() {
    let dir = project();
    write(dir.path(), "tests/broken.transcript", ">>> count polls.poll\n2\n");
    let output = run(dir.path(), &["test", "tests"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("2 run: 2 passed"));
    let err = stderr(&output);
    assert!(err.contains("broken.transcript"), "{err}");
    assert!(err.contains("1 transcript file(s) could not be collected"), "{err}");
}

#[test]
fn test_dump_block() {
    let dir = project();
    let output = run(dir.path(), &["dump", "polls", "--format", "block"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r#"
    [polls.poll 1]
    question = "What's up?"
    votes = 0

    [polls.poll 2]
    question = "Lunch?"
    votes = 4
    "#);
}

#[test]
fn test_dump_entity_filter() {
    let dir = project();
    let output = run(dir.path(), &["dump", "polls", "choices", "--entity", "polls.choice"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let dumped: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        dumped,
        serde_json::json!([{"model": "polls.choice", "pk": 1, "fields": {"poll": 1, "text": "Not much"}}])
    );
}

#[test]
fn test_check_counts_records() {
    let dir = project();
    let output = run(dir.path(), &["check", "polls", "choices.fixture"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    polls: 2 records
    choices.fixture: 1 records
    ok: 3 records in 2 fixtures
    ");
}

#[test]
fn test_check_rejects_ambiguous_name() {
    let dir = project();
    write(dir.path(), "fixtures/polls.fixture", "[polls.poll 3]\n");
    let output = run(dir.path(), &["check", "polls"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("fixture name 'polls' is ambiguous"), "{err}");

    // Naming the format picks one.
    let output = run(dir.path(), &["check", "polls.fixture"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn test_fixture_dir_flag_takes_precedence() {
    let dir = project();
    write(dir.path(), "override/polls.json", r#"[{"model": "polls.poll", "pk": 9}]"#);
    let output = run(dir.path(), &["check", "polls", "--fixture-dir", "override"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("polls: 1 records\n"));
}

#[test]
fn test_unknown_field_fails_check() {
    let dir = project();
    write(dir.path(), "fixtures/bad.fixture", "[polls.poll 5]\ncolour = \"red\"\n");
    let output = run(dir.path(), &["check", "bad"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("colour"), "{err}");
}
