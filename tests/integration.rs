use std::path::Path;
use std::process::{Command, Output};

fn doclinks_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_doclinks"));
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A small documentation tree with a `.git` marker so the run has a base path.
fn docs_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    write(dir.path(), "README.md", "# Project\n\nSee [guide](guide.md#install) and [web](https://domain.tld/page).\n");
    write(dir.path(), "guide.md", "# Guide\n\n## Install\n\nBack to [top](#guide).\n");
    dir
}

#[test]
fn clean_run_exits_zero_and_prints_nothing() {
    let dir = docs_repo();
    let output = doclinks_cmd(dir.path()).args(["README.md", "guide.md"]).output().unwrap();
    assert!(output.status.success(), "check failed: {}", stderr(&output));
    assert!(output.stderr.is_empty(), "unexpected output: {}", stderr(&output));
    assert!(output.stdout.is_empty());
}

#[test]
fn broken_link_exits_one_with_diagnostic_line() {
    let dir = docs_repo();
    write(dir.path(), "broken.md", "[text](missing.md)\n");

    let output = doclinks_cmd(dir.path()).arg("broken.md").output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let err = stderr(&output);
    let lines: Vec<&str> = err.lines().collect();
    assert_eq!(lines.len(), 1, "stderr: {err}");
    assert!(
        lines[0].starts_with("broken.md@1:1-1:19 ('missing.md') target file 'missing.md' not found"),
        "line: {}",
        lines[0]
    );
}

#[test]
fn missing_anchor_is_reported() {
    let dir = docs_repo();
    write(dir.path(), "anchor.md", "[text](guide.md#uninstall)\n");

    let output = doclinks_cmd(dir.path()).arg("anchor.md").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("('guide.md#uninstall') anchor '#uninstall' not found in target file 'guide.md'"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn every_broken_link_is_reported_before_exiting() {
    let dir = docs_repo();
    write(dir.path(), "many.md", "[a](one.md)\n[b](two.md)\n[c](guide.md)\n[d](three.md)\n");

    let output = doclinks_cmd(dir.path()).arg("many.md").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    let targets: Vec<&str> = err
        .lines()
        .filter_map(|l| l.split_once("('").and_then(|(_, rest)| rest.split_once("')")))
        .map(|(target, _)| target)
        .collect();
    assert_eq!(targets, ["one.md", "two.md", "three.md"]);
}

#[test]
fn broken_target_behind_task_marker_label_is_reported() {
    let dir = docs_repo();
    write(dir.path(), "refs.md", "See [the page][x].\n\n[x]: gone.md\n");

    let output = doclinks_cmd(dir.path()).arg("refs.md").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert_eq!(err.lines().count(), 1, "stderr: {err}");
    assert!(err.starts_with("refs.md@1:5-1:18 ('gone.md') "), "stderr: {err}");
}

#[test]
fn no_files_is_fatal() {
    let dir = docs_repo();
    let output = doclinks_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("No Input Files"), "stderr: {}", stderr(&output));
}

#[test]
fn unreadable_document_is_fatal() {
    let dir = docs_repo();
    let output = doclinks_cmd(dir.path()).arg("absent.md").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn invalid_base_path_is_fatal() {
    let dir = docs_repo();
    let output = doclinks_cmd(dir.path())
        .args(["--base-path", "no-such-dir", "README.md"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Invalid Base Path"), "stderr: {}", stderr(&output));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let dir = docs_repo();
    let output = doclinks_cmd(dir.path()).args(["--bogus", "README.md"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn help_exits_zero_without_checking() {
    let dir = docs_repo();
    write(dir.path(), "broken.md", "[text](missing.md)\n");
    let output = doclinks_cmd(dir.path()).args(["--help", "broken.md"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--relative-links"));
}

#[test]
fn relative_links_need_the_flag() {
    let dir = docs_repo();
    write(dir.path(), "docs/setup.md", "# Setup\n");
    write(dir.path(), "index.md", "[setup](docs/setup.md#setup)\n");

    let refused = doclinks_cmd(dir.path()).arg("index.md").output().unwrap();
    assert_eq!(refused.status.code(), Some(1));
    assert!(stderr(&refused).contains("without --relative-links"), "stderr: {}", stderr(&refused));

    let allowed = doclinks_cmd(dir.path())
        .args(["--relative-links", "index.md"])
        .output()
        .unwrap();
    assert!(allowed.status.success(), "stderr: {}", stderr(&allowed));
}

#[test]
fn dropped_extension_is_appended() {
    let dir = docs_repo();
    write(dir.path(), "wiki.md", "[guide](guide#install)\n[self](#wiki)\n\n# Wiki\n");

    let without = doclinks_cmd(dir.path()).arg("wiki.md").output().unwrap();
    assert_eq!(without.status.code(), Some(1));

    let with = doclinks_cmd(dir.path())
        .args(["--dropped-extension", "md", "wiki.md"])
        .output()
        .unwrap();
    assert!(with.status.success(), "stderr: {}", stderr(&with));
}

#[test]
fn config_file_sets_defaults() {
    let dir = docs_repo();
    write(dir.path(), ".doclinks.toml", "dropped_extension = \"md\"\n");
    write(dir.path(), "wiki.md", "[guide](guide#install)\n");

    let output = doclinks_cmd(dir.path()).arg("wiki.md").output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn malformed_config_file_is_fatal() {
    let dir = docs_repo();
    write(dir.path(), ".doclinks.toml", "unknown_key = 1\n");

    let output = doclinks_cmd(dir.path()).arg("README.md").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains(".doclinks.toml"), "stderr: {}", stderr(&output));
}

#[test]
fn json_format_emits_one_object_per_line() {
    let dir = docs_repo();
    write(dir.path(), "broken.md", "[a](gone.md)\n[b](also-gone.md)\n");

    let output = doclinks_cmd(dir.path())
        .args(["--format", "json", "broken.md"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let err = stderr(&output);
    let values: Vec<serde_json::Value> = err.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0]["file"], "broken.md");
    assert_eq!(values[0]["position"], "@1:1-1:13");
    assert_eq!(values[1]["target"], "also-gone.md");
}

#[test]
fn directory_arguments_are_walked() {
    let dir = docs_repo();
    write(dir.path(), "docs/a.md", "[b](b.md)\n");
    write(dir.path(), "docs/b.md", "[gone](gone.md)\n");
    write(dir.path(), "docs/notes.txt", "[gone](gone.md)\n");

    let output = doclinks_cmd(dir.path()).arg("docs").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert_eq!(err.lines().count(), 1, "stderr: {err}");
    assert!(err.contains("b.md@1:1-1:16 ('gone.md')"), "stderr: {err}");
}

#[test]
fn config_exclude_skips_walked_files() {
    let dir = docs_repo();
    write(dir.path(), ".doclinks.toml", "exclude = [\"vendor/\"]\n");
    write(dir.path(), "docs/ok.md", "# Ok\n");
    write(dir.path(), "docs/vendor/third.md", "[gone](gone.md)\n");

    let output = doclinks_cmd(dir.path()).arg("docs").output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn parallel_jobs_report_every_document() {
    let dir = docs_repo();
    for i in 0..8 {
        write(dir.path(), &format!("docs/page{i}.md"), &format!("[x](missing{i}.md)\n"));
    }

    let output = doclinks_cmd(dir.path()).args(["--jobs", "4", "docs"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert_eq!(err.lines().count(), 8, "stderr: {err}");
    for i in 0..8 {
        assert!(err.contains(&format!("('missing{i}.md')")), "stderr: {err}");
    }
}
