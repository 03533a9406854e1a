use common::{TestServer, sh};
use hook_config::ExecStep;
use hookd::cli::Mode;
use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn test_sync_job_streams_prefixed_output() {
    let step = ExecStep::new("build", "echo", vec!["hello"]);
    let server = TestServer::start(Mode::Sync, &[step]).await;

    let response = server.post("build").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OUT: hello\n");
}

#[tokio::test]
async fn test_sync_job_streams_stderr_and_every_step() {
    let server = TestServer::start(
        Mode::Sync,
        &[
            sh("deploy", "echo step one"),
            sh("deploy", "echo careful >&2"),
            sh("other", "echo not me"),
        ],
    )
    .await;

    let body = server.submit("deploy").await;

    assert_eq!(body, "OUT: step one\nERR: careful\n");
}

#[tokio::test]
async fn test_sync_job_stops_after_failed_step() {
    let server = TestServer::start(
        Mode::Sync,
        &[sh("fail", "echo first; exit 1"), sh("fail", "echo second")],
    )
    .await;

    let body = server.submit("fail").await;

    assert_eq!(body, "OUT: first\n");
}

#[tokio::test]
async fn test_request_env_reaches_every_step() {
    let server = TestServer::start(
        Mode::Sync,
        &[
            sh("env", "echo one $GREETING"),
            sh("env", "echo two $GREETING"),
        ],
    )
    .await;

    let body = server
        .post("env")
        .body(r#"{"ENV": {"GREETING": "hi"}}"#)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "OUT: one hi\nOUT: two hi\n");
}

#[tokio::test]
async fn test_parent_environment_is_not_inherited() {
    let server = TestServer::start(Mode::Sync, &[sh("env", "echo \"[$HOME]\"")]).await;

    let body = server.submit("env").await;

    assert_eq!(body, "OUT: []\n");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let server = TestServer::start(Mode::Sync, &[sh("build", "echo hello")]).await;

    let response = server.post("missing").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.post("").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = TestServer::start(Mode::Sync, &[sh("build", "echo hello")]).await;

    let response = server.post("build").body("{not json").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_broken_configuration_is_internal_error() {
    let server = TestServer::start(Mode::Sync, &[sh("build", "echo hello")]).await;
    std::fs::write(server.config_file(), "[{").unwrap();

    let response = server.post("build").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_configuration_edits_apply_without_restart() {
    let server = TestServer::start(Mode::Sync, &[sh("build", "echo old")]).await;
    std::fs::write(
        server.config_file(),
        serde_json::to_string(&[sh("build", "echo new")]).unwrap(),
    )
    .unwrap();

    let body = server.submit("build").await;

    assert_eq!(body, "OUT: new\n");
}

#[tokio::test]
async fn test_step_runs_in_its_directory_under_scripts_root() {
    let mut step = ExecStep::new("where", "pwd", Vec::<String>::new());
    step.dir = Some("app".to_string());
    let server = TestServer::start(Mode::Sync, &[step]).await;
    let app_dir = server.scripts.path().join("app");
    std::fs::create_dir(&app_dir).unwrap();

    let body = server.submit("where").await;

    let expected = std::fs::canonicalize(&app_dir).unwrap();
    let printed = body.strip_prefix("OUT: ").unwrap().trim_end();
    assert_eq!(std::fs::canonicalize(printed).unwrap(), expected);
}
