use std::process::Command;

#[test]
fn test_quill_version() {
    let output = Command::new("cargo")
        .args(["run", "--bin", "quill", "--", "--version"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0.1.0"));
}

#[test]
fn test_quill_help() {
    let output = Command::new("cargo")
        .args(["run", "--bin", "quill", "--", "--help"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("search"));
    assert!(stdout.contains("ask"));
}

#[test]
fn test_quill_search_offline() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("note.md"),
        "# Planning\n\nquarterly goals and milestones",
    )
    .unwrap();

    let output = Command::new("cargo")
        .args([
            "run",
            "--bin",
            "quill",
            "--",
            "search",
            "milestones",
            "--vault",
        ])
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("note.md"));
}
