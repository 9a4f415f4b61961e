//! End-to-end tests for the pdfsync binary
//!
//! Commands that print data write it to stdout; log lines go to stderr so that
//! output can be redirected to a file.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const INDEX: &str = r#"<html><body>
    <div class="link-item"><a href="/docs/a.pdf">A</a></div>
    <div class="link-item"><a href="/docs/b.pdf">B</a></div>
</body></html>"#;

/// Binary run from an empty directory with console logging at info level
fn pdfsync(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pdfsync").unwrap();
    cmd.current_dir(workdir.path())
        .env("LOG_OUTPUT", "console")
        .env("LOG_LEVEL", "info")
        .env_remove("RUST_LOG")
        .env_remove("LOG_FILTER");
    cmd
}

#[tokio::test]
async fn test_discover_prints_only_urls_on_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
        .mount(&server)
        .await;

    let workdir = TempDir::new().unwrap();
    let expected = format!("{0}/docs/a.pdf\n{0}/docs/b.pdf\n", server.uri());

    pdfsync(&workdir)
        .arg("discover")
        .arg("--index-url")
        .arg(format!("{}/index", server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::diff(expected))
        .stderr(predicate::str::contains("Discovered source documents"));
}

#[cfg(unix)]
#[test]
fn test_extract_to_stdout_is_clean_csv() {
    use std::os::unix::fs::PermissionsExt;

    let workdir = TempDir::new().unwrap();
    let pdf = workdir.path().join("broken.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").unwrap();

    // Stands in for camelot: `--format csv --output <dir>/tables.csv ...`
    let detector = workdir.path().join("fake-detector");
    std::fs::write(
        &detector,
        "#!/bin/sh\n\
         dir=$(dirname \"$4\")\n\
         printf 'Title,,,\\nNumb er,Entity,Notes,Extra\\n1,A,x,y\\n' > \"$dir/tables-page-1-table-1.csv\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&detector, std::fs::Permissions::from_mode(0o755)).unwrap();

    pdfsync(&workdir)
        .arg("extract")
        .arg(&pdf)
        .arg("--detector")
        .arg(&detector)
        .assert()
        .success()
        .stdout(predicate::str::diff("Number,Entity,Notes,Extra\n1,A,x,y\n"))
        .stderr(predicate::str::contains("applied repair"));
}
