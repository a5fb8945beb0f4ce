use anyhow::Result;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn perfsheriff_command(home: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("perfsheriff")?;
    cmd.env("PERFSHERIFF_HOME", home)
        .env_remove("PERFSHERIFF_BASE_URL")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

async fn dashboard_with_alerts() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "anomalies": [{
                "key": "k1",
                "start_revision": 10,
                "end_revision": 12,
                "median_before_anomaly": 1.0,
                "median_after_anomaly": 2.0,
                "descriptor": {"testSuite": "octane"},
            }],
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn new_bug_files_and_remembers_the_bug() -> Result<()> {
    let server = dashboard_with_alerts().await;
    Mock::given(method("POST"))
        .and(path("/api/new_bug"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bug_id": 555})))
        .expect(1)
        .mount(&server)
        .await;
    let home = TempDir::new()?;

    perfsheriff_command(home.path())?
        .args([
            "--base-url",
            &server.uri(),
            "new-bug",
            "--summary",
            "100% regression in octane",
            "--sheriff",
            "V8 Perf",
            "k1",
        ])
        .assert()
        .success()
        .stdout(contains("Filed bug 555"));

    let stored: JsonValue =
        serde_json::from_slice(&std::fs::read(home.path().join("recent_bugs.json"))?)?;
    assert_eq!(
        stored,
        json!([{"id": 555, "summary": "100% regression in octane"}])
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ignore_sends_the_ignored_sentinel() -> Result<()> {
    let server = dashboard_with_alerts().await;
    Mock::given(method("POST"))
        .and(path("/api/existing_bug"))
        .and(body_json(json!({"keys": ["k1"], "bug_id": -2})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let home = TempDir::new()?;

    perfsheriff_command(home.path())?
        .args(["--base-url", &server.uri(), "ignore", "--sheriff", "V8 Perf", "k1"])
        .assert()
        .success()
        .stdout(contains("Ignored 1 alert"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_keys_are_rejected_before_any_mutation() -> Result<()> {
    let server = dashboard_with_alerts().await;
    Mock::given(method("POST"))
        .and(path("/api/existing_bug"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let home = TempDir::new()?;

    perfsheriff_command(home.path())?
        .args([
            "--base-url",
            &server.uri(),
            "assign",
            "--bug-id",
            "7",
            "--sheriff",
            "V8 Perf",
            "k1",
            "nope",
        ])
        .assert()
        .failure()
        .stderr(contains("nope"));

    Ok(())
}
